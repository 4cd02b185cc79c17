//! WASM bindings for the PDF page editor
//!
//! All editor state lives in Rust inside an `EditorSession`; JavaScript
//! forwards DOM events and paints what the session describes.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { EditorSession, fetchDocument } from './pkg/pdfedit_wasm.js';
//!
//! await init();
//!
//! const session = new EditorSession();
//! const bytes = await fetchDocument(url);
//! let view = session.open("resume.pdf", bytes);
//! paint(view, session.bitmapRgba());
//!
//! canvasLayer.onclick = (e) => { view = session.clickEmpty(e.offsetX, e.offsetY); };
//! saveButton.onclick = () => download(session.flatten(), "resume.pdf");
//! ```

pub mod fetch;
pub mod session;
pub mod view;

use wasm_bindgen::prelude::*;

pub use fetch::{fetch_document, WebFetcher};
pub use session::EditorSession;
pub use view::PageView;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Header/trailer check that needs no parse
#[wasm_bindgen(js_name = quickValidate)]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    pdfedit_core::quick_validate(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Page count, version and per-page geometry, before opening an editor
#[wasm_bindgen(js_name = getPdfInfo)]
pub fn get_pdf_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = pdfedit_core::document_info(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Format bytes as human-readable string
#[wasm_bindgen(js_name = formatBytes)]
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
