//! Stateful editor session
//!
//! Wraps one [`Editor`]. Every method has an `_internal` twin returning
//! plain Rust types so the logic is testable without a JS runtime.

use pdfedit_core::{
    DocumentSource, Editor, EditorConfig, EditorError, FocusTarget, GestureOutcome, ImageId,
    ImagePatch, Key, OverlayRef, OverlaySnapshot, Point, TextId, TextPatch,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::view::PageView;

fn js_error(e: EditorError) -> JsValue {
    JsValue::from_str(&e.user_message())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn bytes_to_js(bytes: &[u8]) -> js_sys::Uint8Array {
    let array = js_sys::Uint8Array::new_with_length(bytes.len() as u32);
    array.copy_from(bytes);
    array
}

/// Gesture result for JS: what happened and to which overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureJs {
    pub outcome: &'static str,
    pub text_id: Option<u64>,
    pub image_id: Option<u64>,
}

impl From<GestureOutcome> for GestureJs {
    fn from(outcome: GestureOutcome) -> Self {
        let (name, target) = match outcome {
            GestureOutcome::Started(t) => ("started", Some(t)),
            GestureOutcome::Moved(t) => ("moved", Some(t)),
            GestureOutcome::Finished(t) => ("finished", Some(t)),
            GestureOutcome::Removed(t) => ("removed", Some(t)),
            GestureOutcome::Editing(id) => ("editing", Some(OverlayRef::Text(id))),
            GestureOutcome::EditEnded(id) => ("editEnded", Some(OverlayRef::Text(id))),
            GestureOutcome::Ignored => ("ignored", None),
        };
        let (text_id, image_id) = match target {
            Some(OverlayRef::Text(id)) => (Some(id.0), None),
            Some(OverlayRef::Image(id)) => (None, Some(id.0)),
            None => (None, None),
        };
        Self {
            outcome: name,
            text_id,
            image_id,
        }
    }
}

fn parse_key(key: &str, shift: bool) -> Option<Key> {
    match key {
        "Enter" => Some(Key::Enter { shift }),
        "Escape" => Some(Key::Escape),
        // Backspace belongs to whichever text input has focus
        "Delete" => Some(Key::Delete),
        _ => None,
    }
}

/// `kind` is "textBox", "fontPanel" or anything else for outside the editor.
fn parse_focus(kind: &str, id: Option<u64>) -> FocusTarget {
    match (kind, id) {
        ("textBox", Some(id)) => FocusTarget::TextBox(TextId(id)),
        ("fontPanel", Some(id)) => FocusTarget::FontPanel(TextId(id)),
        _ => FocusTarget::Elsewhere,
    }
}

#[wasm_bindgen]
pub struct EditorSession {
    editor: Editor,
}

#[wasm_bindgen]
impl EditorSession {
    /// Create a session; `config_json` overrides any `EditorConfig` field
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<EditorSession, JsValue> {
        Self::new_internal(config_json.as_deref()).map_err(js_error)
    }

    /// Open the editor on a document and render its first page
    pub fn open(&mut self, name: &str, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let view = self.open_internal(name, bytes).map_err(js_error)?;
        to_js(&view)
    }

    /// Close the editor frame
    pub fn close(&mut self) {
        self.editor.close();
    }

    #[wasm_bindgen(getter, js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.editor.modal().is_open()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> usize {
        self.editor.page_count()
    }

    #[wasm_bindgen(getter)]
    pub fn page(&self) -> usize {
        self.editor.page()
    }

    #[wasm_bindgen(getter)]
    pub fn zoom(&self) -> f64 {
        self.editor.zoom()
    }

    /// Current page and overlays in screen space
    pub fn view(&self) -> Result<JsValue, JsValue> {
        to_js(&PageView::of(&self.editor))
    }

    /// RGBA pixels of the rendered page, `view().width` by `view().height`
    #[wasm_bindgen(js_name = bitmapRgba)]
    pub fn bitmap_rgba(&self) -> Option<js_sys::Uint8ClampedArray> {
        let rendered = self.editor.rendered()?;
        Some(js_sys::Uint8ClampedArray::from(rendered.bitmap.as_raw().as_slice()))
    }

    #[wasm_bindgen(js_name = documentInfo)]
    pub fn document_info(&self) -> Result<JsValue, JsValue> {
        let info = self.editor.document_info().map_err(js_error)?;
        to_js(&info)
    }

    // ---- navigation and zoom ----

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&mut self) -> Result<JsValue, JsValue> {
        self.editor.next_page().map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = prevPage)]
    pub fn prev_page(&mut self) -> Result<JsValue, JsValue> {
        self.editor.prev_page().map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = goToPage)]
    pub fn go_to_page(&mut self, index: usize) -> Result<JsValue, JsValue> {
        self.editor.go_to_page(index).map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = setZoom)]
    pub fn set_zoom(&mut self, zoom: f64) -> Result<JsValue, JsValue> {
        self.editor.set_zoom(zoom).map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&mut self) -> Result<JsValue, JsValue> {
        self.editor.zoom_in().map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&mut self) -> Result<JsValue, JsValue> {
        self.editor.zoom_out().map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = resetZoom)]
    pub fn reset_zoom(&mut self) -> Result<JsValue, JsValue> {
        self.editor.reset_zoom().map_err(js_error)?;
        self.view()
    }

    // ---- document operations ----

    /// Append every page of another document
    pub fn merge(&mut self, bytes: &[u8]) -> Result<JsValue, JsValue> {
        self.editor.merge(bytes).map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = deletePage)]
    pub fn delete_page(&mut self, index: usize) -> Result<JsValue, JsValue> {
        self.editor.delete_page(index).map_err(js_error)?;
        self.view()
    }

    #[wasm_bindgen(js_name = rotatePage)]
    pub fn rotate_page(&mut self, index: usize) -> Result<JsValue, JsValue> {
        self.editor.rotate_page(index).map_err(js_error)?;
        self.view()
    }

    /// Single-page copy as `{ fileName, bytes }`
    #[wasm_bindgen(js_name = exportPage)]
    pub fn export_page(&self, index: usize) -> Result<JsValue, JsValue> {
        let exported = self.editor.export_page(index).map_err(js_error)?;
        let result = js_sys::Object::new();
        js_sys::Reflect::set(&result, &"fileName".into(), &exported.file_name.into())?;
        js_sys::Reflect::set(&result, &"bytes".into(), &bytes_to_js(&exported.bytes))?;
        Ok(result.into())
    }

    /// Current document with structural edits, overlays not applied
    #[wasm_bindgen(js_name = documentBytes)]
    pub fn document_bytes(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = self
            .editor
            .bytes()
            .map_err(|e| js_error(EditorError::from(e)))?;
        Ok(bytes_to_js(&bytes))
    }

    /// Document with every overlay drawn into its pages
    pub fn flatten(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let bytes = self.editor.flatten().map_err(js_error)?;
        Ok(bytes_to_js(&bytes))
    }

    // ---- gestures ----

    #[wasm_bindgen(js_name = clickEmpty)]
    pub fn click_empty(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.click_empty(Point::new(x, y))))
    }

    #[wasm_bindgen(js_name = clickText)]
    pub fn click_text(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.click_text(Point::new(x, y))))
    }

    #[wasm_bindgen(js_name = pointerDownText)]
    pub fn pointer_down_text(&mut self, id: u64, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let outcome = self.editor.pointer_down_text(TextId(id), Point::new(x, y));
        to_js(&GestureJs::from(outcome))
    }

    #[wasm_bindgen(js_name = pointerDownImage)]
    pub fn pointer_down_image(&mut self, id: u64, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let outcome = self.editor.pointer_down_image(ImageId(id), Point::new(x, y));
        to_js(&GestureJs::from(outcome))
    }

    #[wasm_bindgen(js_name = pointerDownResize)]
    pub fn pointer_down_resize(&mut self, id: u64) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.pointer_down_resize(ImageId(id))))
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.pointer_move(Point::new(x, y))))
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.pointer_up(Point::new(x, y))))
    }

    #[wasm_bindgen(js_name = beginEdit)]
    pub fn begin_edit(&mut self, id: u64) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.begin_edit(TextId(id))))
    }

    /// Replace the edited overlay's text; called on every keystroke
    #[wasm_bindgen(js_name = typeText)]
    pub fn type_text(&mut self, text: &str) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.type_text(text)))
    }

    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(
        &mut self,
        key: &str,
        shift: bool,
        focus: &str,
        focus_id: Option<u64>,
    ) -> Result<JsValue, JsValue> {
        to_js(&self.key_internal(key, shift, focus, focus_id))
    }

    /// Focus left the text box; `to` names where it went
    pub fn blur(&mut self, to: &str, to_id: Option<u64>) -> Result<JsValue, JsValue> {
        to_js(&GestureJs::from(self.editor.blur(parse_focus(to, to_id))))
    }

    #[wasm_bindgen(js_name = removeText)]
    pub fn remove_text(&mut self, id: u64) -> Result<JsValue, JsValue> {
        let outcome = self.editor.remove_overlay(OverlayRef::Text(TextId(id)));
        to_js(&GestureJs::from(outcome))
    }

    #[wasm_bindgen(js_name = removeImage)]
    pub fn remove_image(&mut self, id: u64) -> Result<JsValue, JsValue> {
        let outcome = self.editor.remove_overlay(OverlayRef::Image(ImageId(id)));
        to_js(&GestureJs::from(outcome))
    }

    /// Font controls: `patch` is a partial text overlay, e.g. `{ font_size: 18, opacity: 0.5 }`
    #[wasm_bindgen(js_name = updateText)]
    pub fn update_text(&mut self, id: u64, patch: JsValue) -> Result<bool, JsValue> {
        let patch: TextPatch = serde_wasm_bindgen::from_value(patch)
            .map_err(|e| JsValue::from_str(&format!("Invalid patch: {}", e)))?;
        Ok(self.editor.update_text(TextId(id), patch))
    }

    #[wasm_bindgen(js_name = updateImage)]
    pub fn update_image(&mut self, id: u64, patch: JsValue) -> Result<bool, JsValue> {
        let patch: ImagePatch = serde_wasm_bindgen::from_value(patch)
            .map_err(|e| JsValue::from_str(&format!("Invalid patch: {}", e)))?;
        Ok(self.editor.update_image(ImageId(id), patch))
    }

    /// Place an image at a screen point; returns its id
    #[wasm_bindgen(js_name = addImage)]
    pub fn add_image(&mut self, bytes: &[u8], x: f64, y: f64) -> Result<u64, JsValue> {
        self.add_image_internal(bytes, x, y).map_err(js_error)
    }

    // ---- persistence ----

    /// Overlays as JSON, for storing the session elsewhere
    #[wasm_bindgen(js_name = overlaysJson)]
    pub fn overlays_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.editor.overlays().snapshot())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    #[wasm_bindgen(js_name = restoreOverlays)]
    pub fn restore_overlays(&mut self, json: &str) -> Result<(), JsValue> {
        self.restore_internal(json).map_err(|e| JsValue::from_str(&e))
    }

    // ---- editor frame ----

    #[wasm_bindgen(js_name = frameResizeStart)]
    pub fn frame_resize_start(&mut self, x: f64, y: f64) -> bool {
        self.editor.modal_mut().begin_resize(Point::new(x, y))
    }

    #[wasm_bindgen(js_name = frameResizeMove)]
    pub fn frame_resize_move(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&self.editor.modal_mut().resize_to(Point::new(x, y)))
    }

    /// Finish the resize and re-centre the page in the new frame
    #[wasm_bindgen(js_name = frameResizeEnd)]
    pub fn frame_resize_end(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        if self.frame_resize_end_internal(x, y).map_err(js_error)? {
            self.view()
        } else {
            Ok(JsValue::NULL)
        }
    }

    #[wasm_bindgen(js_name = frameMoveStart)]
    pub fn frame_move_start(&mut self, x: f64, y: f64) -> bool {
        self.editor.modal_mut().begin_move(Point::new(x, y))
    }

    #[wasm_bindgen(js_name = frameMoveTo)]
    pub fn frame_move_to(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&self.editor.modal_mut().move_to(Point::new(x, y)))
    }

    #[wasm_bindgen(js_name = frameMoveEnd)]
    pub fn frame_move_end(&mut self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        to_js(&self.editor.modal_mut().end_move(Point::new(x, y)))
    }

    #[wasm_bindgen(js_name = frameSize)]
    pub fn frame_size(&self) -> Result<JsValue, JsValue> {
        to_js(&self.editor.modal().size())
    }
}

impl EditorSession {
    fn new_internal(config_json: Option<&str>) -> Result<Self, EditorError> {
        let config = match config_json {
            Some(json) => EditorConfig::from_json(json)?,
            None => EditorConfig::default(),
        };
        Ok(Self {
            editor: Editor::new(config),
        })
    }

    fn open_internal(&mut self, name: &str, bytes: &[u8]) -> Result<PageView, EditorError> {
        self.editor
            .open_local(DocumentSource::bytes(name, bytes.to_vec()))?;
        Ok(PageView::of(&self.editor))
    }

    fn key_internal(
        &mut self,
        key: &str,
        shift: bool,
        focus: &str,
        focus_id: Option<u64>,
    ) -> GestureJs {
        match parse_key(key, shift) {
            Some(key) => GestureJs::from(self.editor.key(key, parse_focus(focus, focus_id))),
            None => GestureJs::from(GestureOutcome::Ignored),
        }
    }

    fn add_image_internal(&mut self, bytes: &[u8], x: f64, y: f64) -> Result<u64, EditorError> {
        Ok(self.editor.add_image(bytes, Point::new(x, y))?.0)
    }

    fn restore_internal(&mut self, json: &str) -> Result<(), String> {
        let snapshot: OverlaySnapshot =
            serde_json::from_str(json).map_err(|e| format!("Invalid overlays: {}", e))?;
        self.editor.restore_overlays(snapshot);
        Ok(())
    }

    /// Returns whether a resize was in progress.
    fn frame_resize_end_internal(&mut self, x: f64, y: f64) -> Result<bool, EditorError> {
        if self.editor.modal_mut().end_resize(Point::new(x, y)).is_none() {
            return Ok(false);
        }
        if self.editor.is_loaded() {
            self.editor.render()?;
        }
        Ok(true)
    }
}
