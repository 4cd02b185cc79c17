//! Remote documents through the browser's fetch API

use js_sys::Uint8Array;
use pdfedit_core::{Fetcher, LoadError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

/// [`Fetcher`] backed by `window.fetch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebFetcher;

impl Fetcher for WebFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        fetch_bytes(url).await.map_err(|e| LoadError::Fetch {
            url: url.to_string(),
            reason: e.as_string().unwrap_or_else(|| format!("{:?}", e)),
        })
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;

    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(url, &opts)?;

    let response = JsFuture::from(window.fetch_with_request(&request)).await?;
    let response: Response = response.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "Fetch failed: {} {}",
            response.status(),
            response.status_text()
        )));
    }

    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

/// Download a document for [`EditorSession::open`](crate::EditorSession::open).
#[wasm_bindgen(js_name = fetchDocument)]
pub async fn fetch_document(url: String) -> Result<Uint8Array, JsValue> {
    let bytes = WebFetcher
        .fetch(&url)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(Uint8Array::from(bytes.as_slice()))
}
