//! Editor configuration.

use crate::backend::{ExportQuality, PageFormat};
use crate::history::MAX_UNDO_HISTORY;
use crate::reorder::DEFAULT_DRAG_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time an error message stays visible, in seconds.
pub const DEFAULT_ERROR_DISMISS_SECS: u64 = 5;

/// What to do with an optimistic reorder the backend refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderFailurePolicy {
    /// Put the pages back in their previous order.
    #[default]
    Rollback,
    /// Keep the local order even though the backend did not apply it.
    KeepLocal,
}

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo entries.
    pub history_limit: usize,
    /// Pointer travel before a page press becomes a drag, in pixels.
    pub drag_threshold: f64,
    /// Seconds before an error message is dismissed automatically.
    pub error_dismiss_secs: u64,
    pub export_quality: ExportQuality,
    pub reorder_failure: ReorderFailurePolicy,
    /// Size of pages added with "insert blank page".
    pub blank_page_format: PageFormat,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: MAX_UNDO_HISTORY,
            drag_threshold: DEFAULT_DRAG_THRESHOLD,
            error_dismiss_secs: DEFAULT_ERROR_DISMISS_SECS,
            export_quality: ExportQuality::High,
            reorder_failure: ReorderFailurePolicy::Rollback,
            blank_page_format: PageFormat::A4,
        }
    }
}

impl EditorConfig {
    /// Parse a configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn error_dismiss_after(&self) -> Duration {
        Duration::from_secs(self.error_dismiss_secs)
    }
}
