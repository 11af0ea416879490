//! Input primitives shared by the page controllers.

use serde::{Deserialize, Serialize};

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Keys the page grid reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavKey {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Escape,
    /// The "A" key (select all with the command modifier).
    A,
}

impl NavKey {
    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn from_key_name(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(NavKey::Left),
            "ArrowRight" => Some(NavKey::Right),
            "ArrowUp" => Some(NavKey::Up),
            "ArrowDown" => Some(NavKey::Down),
            "Home" => Some(NavKey::Home),
            "End" => Some(NavKey::End),
            "Escape" | "Esc" => Some(NavKey::Escape),
            "a" | "A" => Some(NavKey::A),
            _ => None,
        }
    }

    /// Step direction for arrow keys (-1 towards page 1, +1 towards the end).
    pub fn step(self) -> Option<i64> {
        match self {
            NavKey::Left | NavKey::Up => Some(-1),
            NavKey::Right | NavKey::Down => Some(1),
            NavKey::Home | NavKey::End | NavKey::Escape | NavKey::A => None,
        }
    }
}
