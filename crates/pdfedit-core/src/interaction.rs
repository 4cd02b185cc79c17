//! Pointer and keyboard interaction
//!
//! One explicit state machine owns the single pointer. A drag or resize
//! exists only between its pointer-down and pointer-up; move and up events
//! that arrive with no session are ignored, which is the whole of what a
//! host needs to "unregister listeners" when a gesture ends.
//!
//! ```text
//!            pointer_down_text/image        pointer_up
//!   Idle ───────────────────────────▶ Dragging* ──────────▶ Idle
//!     │      pointer_down_resize          pointer_up
//!     ├───────────────────────────▶ ResizingImage ────────▶ Idle
//!     │      begin_edit / click_catcher / promote
//!     └───────────────────────────▶ EditingText ──blur/Enter/Esc──▶ Idle
//! ```
//!
//! Gestures start only from `Idle` or `EditingText`, so two can never overlap.
//! Positions are written back in page space.

use tracing::{debug, trace};

use crate::coords::{Point, ViewTransform};
use crate::overlay::{ImageId, ImagePatch, OverlayModel, OverlayRef, TextId, TextPatch};
use crate::text::ExtractedTextRegion;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// `offset` is pointer minus overlay origin, page space
    DraggingText { id: TextId, offset: Point },
    DraggingImage { id: ImageId, offset: Point },
    /// Size at gesture start; the ratio is kept for the whole gesture
    ResizingImage {
        id: ImageId,
        start_width: f64,
        start_height: f64,
    },
    EditingText(TextId),
}

impl InteractionState {
    fn involves(&self, target: OverlayRef) -> bool {
        match (*self, target) {
            (InteractionState::DraggingText { id, .. }, OverlayRef::Text(t)) => id == t,
            (InteractionState::EditingText(id), OverlayRef::Text(t)) => id == t,
            (InteractionState::DraggingImage { id, .. }, OverlayRef::Image(i)) => id == i,
            (InteractionState::ResizingImage { id, .. }, OverlayRef::Image(i)) => id == i,
            _ => false,
        }
    }

    fn accepts_new_gesture(&self) -> bool {
        matches!(self, InteractionState::Idle | InteractionState::EditingText(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Started(OverlayRef),
    Moved(OverlayRef),
    Finished(OverlayRef),
    Editing(TextId),
    EditEnded(TextId),
    Removed(OverlayRef),
    /// Event had no tracked session or target
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter { shift: bool },
    Escape,
    Delete,
}

/// Where keyboard focus is, or is going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    TextBox(TextId),
    FontPanel(TextId),
    Elsewhere,
}

#[derive(Debug, Clone, Copy)]
pub struct InteractionController {
    state: InteractionState,
    min_image_width: f64,
}

impl InteractionController {
    pub fn new(min_image_width: f64) -> Self {
        Self {
            state: InteractionState::Idle,
            min_image_width,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn editing(&self) -> Option<TextId> {
        match self.state {
            InteractionState::EditingText(id) => Some(id),
            _ => None,
        }
    }

    fn ignored(&self, event: &str) -> GestureOutcome {
        trace!(event, state = ?self.state, "ignoring event");
        GestureOutcome::Ignored
    }

    /// Leave `EditingText` (if in it) before another gesture takes the pointer.
    fn leave_editing(&mut self, model: &mut OverlayModel) {
        if let InteractionState::EditingText(id) = self.state {
            model.stop_editing();
            debug!(?id, "editing ended");
            self.state = InteractionState::Idle;
        }
    }

    pub fn pointer_down_text(
        &mut self,
        model: &mut OverlayModel,
        id: TextId,
        pointer: Point,
        view: ViewTransform,
    ) -> GestureOutcome {
        if !self.state.accepts_new_gesture() || self.editing() == Some(id) {
            return self.ignored("pointer_down_text");
        }
        let Some(overlay) = model.text(id) else {
            return self.ignored("pointer_down_text");
        };
        let offset = view.screen_to_page(pointer) - Point::new(overlay.x, overlay.y);
        self.leave_editing(model);
        self.state = InteractionState::DraggingText { id, offset };
        debug!(?id, "drag started");
        GestureOutcome::Started(OverlayRef::Text(id))
    }

    pub fn pointer_down_image(
        &mut self,
        model: &mut OverlayModel,
        id: ImageId,
        pointer: Point,
        view: ViewTransform,
    ) -> GestureOutcome {
        if !self.state.accepts_new_gesture() {
            return self.ignored("pointer_down_image");
        }
        let Some(overlay) = model.image(id) else {
            return self.ignored("pointer_down_image");
        };
        let offset = view.screen_to_page(pointer) - Point::new(overlay.x, overlay.y);
        self.leave_editing(model);
        self.state = InteractionState::DraggingImage { id, offset };
        debug!(?id, "drag started");
        GestureOutcome::Started(OverlayRef::Image(id))
    }

    /// Pointer-down on an image's resize handle.
    pub fn pointer_down_resize(&mut self, model: &mut OverlayModel, id: ImageId) -> GestureOutcome {
        if !self.state.accepts_new_gesture() {
            return self.ignored("pointer_down_resize");
        }
        let Some(overlay) = model.image(id) else {
            return self.ignored("pointer_down_resize");
        };
        let (start_width, start_height) = (overlay.width, overlay.height);
        self.leave_editing(model);
        self.state = InteractionState::ResizingImage {
            id,
            start_width,
            start_height,
        };
        debug!(?id, start_width, start_height, "resize started");
        GestureOutcome::Started(OverlayRef::Image(id))
    }

    /// Apply the pointer position to the active gesture.
    fn track(
        &self,
        model: &mut OverlayModel,
        pointer: Point,
        view: ViewTransform,
    ) -> Option<OverlayRef> {
        let page_point = view.screen_to_page(pointer);
        match self.state {
            InteractionState::DraggingText { id, offset } => {
                let p = page_point - offset;
                model.update_text(id, TextPatch::position(p.x, p.y));
                Some(OverlayRef::Text(id))
            }
            InteractionState::DraggingImage { id, offset } => {
                let p = page_point - offset;
                model.update_image(id, ImagePatch::position(p.x, p.y));
                Some(OverlayRef::Image(id))
            }
            InteractionState::ResizingImage {
                id,
                start_width,
                start_height,
            } => {
                let x = model.image(id)?.x;
                let width = (page_point.x - x).max(self.min_image_width);
                let height = if start_width > 0.0 {
                    width * start_height / start_width
                } else {
                    width
                };
                model.update_image(id, ImagePatch::size(width, height));
                Some(OverlayRef::Image(id))
            }
            InteractionState::Idle | InteractionState::EditingText(_) => None,
        }
    }

    pub fn pointer_move(
        &mut self,
        model: &mut OverlayModel,
        pointer: Point,
        view: ViewTransform,
    ) -> GestureOutcome {
        match self.track(model, pointer, view) {
            Some(target) => GestureOutcome::Moved(target),
            None => self.ignored("pointer_move"),
        }
    }

    /// End the gesture; the final position depends only on `pointer`.
    pub fn pointer_up(
        &mut self,
        model: &mut OverlayModel,
        pointer: Point,
        view: ViewTransform,
    ) -> GestureOutcome {
        match self.track(model, pointer, view) {
            Some(target) => {
                self.state = InteractionState::Idle;
                debug!(?target, "gesture finished");
                GestureOutcome::Finished(target)
            }
            None => self.ignored("pointer_up"),
        }
    }

    /// Click on the empty layer behind all overlays: add a text box there.
    pub fn click_catcher(
        &mut self,
        model: &mut OverlayModel,
        page: usize,
        pointer: Point,
        view: ViewTransform,
    ) -> GestureOutcome {
        if !self.state.accepts_new_gesture() {
            return self.ignored("click_catcher");
        }
        let p = view.screen_to_page(pointer);
        let id = model.add_text(page, p.x, p.y);
        self.state = InteractionState::EditingText(id);
        GestureOutcome::Editing(id)
    }

    /// Click on an extracted text region: edit a copy of it.
    pub fn promote(
        &mut self,
        model: &mut OverlayModel,
        region: &ExtractedTextRegion,
    ) -> GestureOutcome {
        if !self.state.accepts_new_gesture() {
            return self.ignored("promote");
        }
        let id = model.promote(region);
        self.state = InteractionState::EditingText(id);
        GestureOutcome::Editing(id)
    }

    /// Click or double-click on a text overlay.
    pub fn begin_edit(&mut self, model: &mut OverlayModel, id: TextId) -> GestureOutcome {
        if !self.state.accepts_new_gesture() || !model.begin_editing(id) {
            return self.ignored("begin_edit");
        }
        if let InteractionState::EditingText(previous) = self.state {
            if previous != id {
                debug!(?previous, ?id, "editing moved to another overlay");
            }
        }
        self.state = InteractionState::EditingText(id);
        GestureOutcome::Editing(id)
    }

    /// Content of the focused text box after a keystroke.
    pub fn type_text(&mut self, model: &mut OverlayModel, text: &str) -> GestureOutcome {
        match self.state {
            InteractionState::EditingText(id) if model.update_text(id, TextPatch::text(text)) => {
                GestureOutcome::Editing(id)
            }
            _ => self.ignored("type_text"),
        }
    }

    pub fn key(&mut self, model: &mut OverlayModel, key: Key, focus: FocusTarget) -> GestureOutcome {
        let InteractionState::EditingText(id) = self.state else {
            return self.ignored("key");
        };
        match key {
            Key::Enter { shift: false } | Key::Escape => {
                self.leave_editing(model);
                GestureOutcome::EditEnded(id)
            }
            // The input inserts the newline at its cursor and reports it via `type_text`
            Key::Enter { shift: true } => GestureOutcome::Editing(id),
            Key::Delete if focus == FocusTarget::FontPanel(id) => {
                self.delete(model, OverlayRef::Text(id))
            }
            Key::Delete => self.ignored("key"),
        }
    }

    /// Focus moved. Staying inside the text box or its font panel keeps editing.
    pub fn blur(&mut self, model: &mut OverlayModel, to: FocusTarget) -> GestureOutcome {
        let InteractionState::EditingText(id) = self.state else {
            return self.ignored("blur");
        };
        match to {
            FocusTarget::TextBox(t) | FocusTarget::FontPanel(t) if t == id => GestureOutcome::Editing(id),
            _ => {
                self.leave_editing(model);
                GestureOutcome::EditEnded(id)
            }
        }
    }

    /// Remove an overlay, dropping any gesture or edit that targets it.
    pub fn delete(&mut self, model: &mut OverlayModel, target: OverlayRef) -> GestureOutcome {
        if !model.remove(target) {
            return self.ignored("delete");
        }
        self.overlay_deleted(target);
        GestureOutcome::Removed(target)
    }

    /// Notify that `target` is gone; forces `Idle` if it was in use.
    pub fn overlay_deleted(&mut self, target: OverlayRef) {
        if self.state.involves(target) {
            debug!(?target, "active overlay deleted");
            self.state = InteractionState::Idle;
        }
    }

    /// Drop whatever is in progress, e.g. when the page changes.
    pub fn reset(&mut self, model: &mut OverlayModel) {
        self.leave_editing(model);
        self.state = InteractionState::Idle;
    }
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new(crate::config::EditorConfig::default().min_image_width)
    }
}
