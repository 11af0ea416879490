//! Keeps a [`DrawingSurface`] in step with the [`DocumentStore`].
//!
//! The surface is rebuilt from the committed annotations of the open page
//! whenever the store's annotation revision moves. Surface events that
//! create or change committed content are turned into store mutations; the
//! rebuild that follows redraws them. The only in-progress state that lives
//! here is the provisional text box being typed, which reaches the store
//! once when editing ends.

use super::{
    path_points, polyline, Drawable, DrawableContent, DrawableHandle, DrawableTag,
    DrawingSurface, InteractionMode, SurfaceEvent,
};
use crate::annotation::{Annotation, AnnotationId, Stroke, TextBox};
use crate::document::{PageNumber, ThumbnailRef};
use crate::error::EditorResult;
use crate::settings::{Brush, TextStyle, ToolKind};
use crate::store::DocumentStore;
use kurbo::Point;
use uuid::Uuid;

/// Text box created on the surface and not yet committed.
#[derive(Debug, Clone)]
struct ProvisionalText {
    handle: DrawableHandle,
    id: AnnotationId,
    position: Point,
    text: String,
    style: TextStyle,
}

/// Synchronizer between the store and one live surface.
#[derive(Debug, Default)]
pub struct CanvasSync {
    page: Option<PageNumber>,
    annotation_revision: Option<u64>,
    tool_revision: Option<u64>,
    tool: ToolKind,
    provisional: Option<ProvisionalText>,
}

impl CanvasSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page currently shown on the surface.
    pub fn page(&self) -> Option<PageNumber> {
        self.page
    }

    pub fn has_provisional_text(&self) -> bool {
        self.provisional.is_some()
    }

    /// Show `page` on the surface. Any text being typed on the previous page
    /// is committed first.
    pub fn open_page<S: DrawingSurface>(
        &mut self,
        store: &mut DocumentStore,
        surface: &mut S,
        page: PageNumber,
    ) -> EditorResult<()> {
        self.finish_provisional(store, surface);
        store.open_page(page)?;
        self.page = None;
        self.annotation_revision = None;
        self.tool_revision = None;
        self.refresh(store, surface);
        Ok(())
    }

    /// Leave the annotation view. Any text being typed is committed first.
    pub fn close_page<S: DrawingSurface>(&mut self, store: &mut DocumentStore, surface: &mut S) {
        self.finish_provisional(store, surface);
        store.close_page();
        surface.clear_drawables();
        self.page = None;
        self.annotation_revision = None;
        log::debug!("Closed annotation surface");
    }

    /// Bring the surface up to date with the store.
    ///
    /// Call after any store change that did not go through [`handle_event`]
    /// (undo, redo, reorder, tool switches from a toolbar).
    ///
    /// [`handle_event`]: Self::handle_event
    pub fn refresh<S: DrawingSurface>(&mut self, store: &mut DocumentStore, surface: &mut S) {
        let current = store.current_page();
        if current != self.page {
            if self.page.is_some() && current.is_none() {
                // The open page went away underneath us.
                self.provisional = None;
                surface.clear_drawables();
                self.page = None;
                self.annotation_revision = None;
                return;
            }
            self.page = current;
            if let Some(page) = current {
                self.load_background(store, surface, page);
            }
            self.annotation_revision = None;
        }
        let Some(page) = self.page else {
            return;
        };

        if self.tool_revision != Some(store.tool_revision()) {
            let tool = store.tool();
            if tool != ToolKind::Text && self.tool == ToolKind::Text {
                self.finish_provisional(store, surface);
            }
            self.tool = tool;
            self.configure_tool(store, surface);
            self.tool_revision = Some(store.tool_revision());
            self.annotation_revision = None;
        }

        if self.annotation_revision != Some(store.annotation_revision()) {
            self.rebuild(store, surface, page);
        }
    }

    /// React to one surface event.
    pub fn handle_event<S: DrawingSurface>(
        &mut self,
        store: &mut DocumentStore,
        surface: &mut S,
        event: SurfaceEvent,
    ) -> EditorResult<()> {
        self.refresh(store, surface);
        let Some(page) = self.page else {
            log::debug!("Surface event with no open page: {:?}", event);
            return Ok(());
        };
        match event {
            SurfaceEvent::PathFinished { handle, path } => {
                surface.remove_drawable(handle);
                let Some(kind) = store.tool().stroke_kind() else {
                    return Ok(());
                };
                let points = path_points(&path);
                if points.len() < 2 {
                    log::debug!("Discarding stroke with {} point(s)", points.len());
                    return Ok(());
                }
                let (color, width, opacity) = store.settings().stroke_style(kind);
                let stroke = Stroke::new(kind, points, color, width, opacity);
                store.add_annotation(page, Annotation::Stroke(stroke))?;
            }
            SurfaceEvent::Click { position, target } => {
                if store.tool() != ToolKind::Text {
                    return Ok(());
                }
                if let Some(handle) = target {
                    let editable = surface.drawable(handle).is_some_and(|d| {
                        matches!(d.content, DrawableContent::Text { .. })
                    });
                    if editable {
                        surface.begin_text_editing(handle);
                        return Ok(());
                    }
                }
                self.finish_provisional(store, surface);
                self.start_provisional(store, surface, position);
            }
            SurfaceEvent::TextInput { handle, text } => {
                if let Some(provisional) = self.provisional.as_mut().filter(|p| p.handle == handle) {
                    provisional.text = text;
                }
            }
            SurfaceEvent::TextEditEnded { handle, text } => {
                if self.provisional.as_ref().is_some_and(|p| p.handle == handle) {
                    if let Some(provisional) = self.provisional.as_mut() {
                        provisional.text = text;
                    }
                    self.finish_provisional(store, surface);
                } else if let Some(id) = self.committed_id(surface, handle) {
                    self.edit_committed_text(store, page, id, text)?;
                }
            }
            SurfaceEvent::ObjectMoved { handle, offset } => {
                if let Some(provisional) = self.provisional.as_mut().filter(|p| p.handle == handle) {
                    provisional.position += offset;
                } else if let Some(id) = self.committed_id(surface, handle) {
                    if let Some(moved) = store.find_annotation(page, id).map(|a| a.translated(offset)) {
                        store.replace_annotation(page, id, moved)?;
                    }
                }
            }
            SurfaceEvent::EraserDown { target } => {
                if store.tool() != ToolKind::Eraser {
                    return Ok(());
                }
                if let Some(id) = target.and_then(|h| self.committed_id(surface, h)) {
                    store.remove_annotation(page, id);
                }
            }
        }
        self.refresh(store, surface);
        Ok(())
    }

    fn committed_id<S: DrawingSurface>(&self, surface: &S, handle: DrawableHandle) -> Option<AnnotationId> {
        surface.drawable(handle).and_then(|d| d.tag.committed_id())
    }

    fn edit_committed_text(
        &self,
        store: &mut DocumentStore,
        page: PageNumber,
        id: AnnotationId,
        text: String,
    ) -> EditorResult<()> {
        let Some(existing) = store.find_annotation(page, id).and_then(Annotation::as_text) else {
            return Ok(());
        };
        if existing.text == text {
            return Ok(());
        }
        if text.trim().is_empty() {
            store.remove_annotation(page, id);
            return Ok(());
        }
        let edited = TextBox {
            text,
            ..existing.clone()
        };
        store.replace_annotation(page, id, Annotation::Text(edited))?;
        Ok(())
    }

    fn start_provisional<S: DrawingSurface>(
        &mut self,
        store: &DocumentStore,
        surface: &mut S,
        position: Point,
    ) {
        let id = Uuid::new_v4();
        let style = store.settings().text_style();
        let handle = surface.add_drawable(Drawable {
            tag: DrawableTag::Provisional {
                id,
                style: style.clone(),
            },
            content: DrawableContent::Text {
                text: String::new(),
                position,
                style: style.clone(),
            },
        });
        surface.begin_text_editing(handle);
        log::debug!("Started text box {} at {:?}", id, position);
        self.provisional = Some(ProvisionalText {
            handle,
            id,
            position,
            text: String::new(),
            style,
        });
    }

    /// Commit the provisional text box, or drop it if it is blank.
    fn finish_provisional<S: DrawingSurface>(&mut self, store: &mut DocumentStore, surface: &mut S) {
        let Some(provisional) = self.provisional.take() else {
            return;
        };
        surface.remove_drawable(provisional.handle);
        if provisional.text.trim().is_empty() {
            log::debug!("Discarding empty text box {}", provisional.id);
            return;
        }
        let Some(page) = self.page else {
            return;
        };
        let ProvisionalText {
            id,
            position,
            text,
            style,
            ..
        } = provisional;
        let text_box = TextBox {
            id,
            text,
            position,
            font_size: style.font_size,
            font_family: style.font_family,
            color: style.color,
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
        };
        if let Err(err) = store.add_annotation(page, Annotation::Text(text_box)) {
            log::warn!("Could not commit text box: {}", err);
        }
    }

    fn load_background<S: DrawingSurface>(&self, store: &DocumentStore, surface: &mut S, page: PageNumber) {
        let (raster, size) = store
            .document()
            .and_then(|d| d.page(page))
            .map(|p| (p.thumbnail.clone(), p.size))
            .unwrap_or_else(|| (ThumbnailRef::default(), Default::default()));
        surface.set_background(page, &raster, size);
    }

    fn configure_tool<S: DrawingSurface>(&self, store: &DocumentStore, surface: &mut S) {
        let tool = store.tool();
        let mode = match tool {
            ToolKind::Select => InteractionMode::Manipulate,
            ToolKind::Pen | ToolKind::Highlighter => InteractionMode::FreeDraw,
            ToolKind::Text | ToolKind::Eraser => InteractionMode::Default,
        };
        surface.set_mode(mode);
        surface.set_brush(store.settings().brush(tool));
        log::debug!("Surface configured for {:?}", tool);
    }

    /// Clear the surface and redraw committed annotations of `page`, then put
    /// back the provisional text box if one is being typed.
    fn rebuild<S: DrawingSurface>(&mut self, store: &DocumentStore, surface: &mut S, page: PageNumber) {
        surface.clear_drawables();
        for annotation in store.annotations_for(page).unwrap_or_default() {
            surface.add_drawable(drawable_for(annotation));
        }
        if let Some(provisional) = self.provisional.as_mut() {
            provisional.handle = surface.add_drawable(Drawable {
                tag: DrawableTag::Provisional {
                    id: provisional.id,
                    style: provisional.style.clone(),
                },
                content: DrawableContent::Text {
                    text: provisional.text.clone(),
                    position: provisional.position,
                    style: provisional.style.clone(),
                },
            });
            surface.begin_text_editing(provisional.handle);
        }
        self.annotation_revision = Some(store.annotation_revision());
    }
}

/// Surface representation of a committed annotation.
pub fn drawable_for(annotation: &Annotation) -> Drawable {
    let content = match annotation {
        Annotation::Stroke(stroke) => DrawableContent::Path {
            path: polyline(&stroke.points),
            brush: Brush {
                color: stroke.color.with_opacity(stroke.opacity),
                width: stroke.stroke_width,
            },
        },
        Annotation::Text(text) => DrawableContent::Text {
            text: text.text.clone(),
            position: text.position,
            style: TextStyle {
                font_family: text.font_family.clone(),
                font_size: text.font_size,
                color: text.color,
                bold: text.bold,
                italic: text.italic,
                underline: text.underline,
            },
        },
    };
    Drawable {
        tag: DrawableTag::Committed(annotation.id()),
        content,
    }
}
