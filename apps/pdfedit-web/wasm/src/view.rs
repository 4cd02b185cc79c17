//! What JavaScript paints: the active page with every overlay projected to screen space.

use pdfedit_core::{Editor, Fetcher, Point, Rasterizer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextView {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub text: String,
    /// Already scaled by zoom
    pub font_size: f64,
    /// CSS `font-family` value
    pub font_family: String,
    pub color: String,
    pub opacity: f64,
    pub editing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub src: String,
}

/// Click target over existing page text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionView {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: String,
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    pub page: usize,
    pub page_count: usize,
    pub zoom: f64,
    /// Bitmap size in pixels; zero when nothing is rendered
    pub width: u32,
    pub height: u32,
    pub origin_x: f64,
    pub origin_y: f64,
    /// Message for the empty canvas after a failed load or render
    pub error: Option<String>,
    pub texts: Vec<TextView>,
    pub images: Vec<ImageView>,
    pub regions: Vec<RegionView>,
}

impl PageView {
    pub fn of<F: Fetcher, R: Rasterizer>(editor: &Editor<F, R>) -> Self {
        let view = editor.view();
        let zoom = view.zoom;
        let page = editor.page();
        let overlays = editor.overlays();
        let editing = overlays.editing_id();
        let (width, height) = editor
            .rendered()
            .map(|r| r.bitmap.dimensions())
            .unwrap_or((0, 0));

        let texts = overlays
            .texts_on_page(page)
            .map(|t| {
                let at = view.page_to_screen(Point::new(t.x, t.y));
                TextView {
                    id: t.id.0,
                    x: at.x,
                    y: at.y,
                    text: t.text.clone(),
                    font_size: t.font_size * zoom,
                    font_family: t.font_family.css_family().to_string(),
                    color: t.font_color.to_hex(),
                    opacity: t.opacity.get(),
                    editing: editing == Some(t.id),
                }
            })
            .collect();

        let images = overlays
            .images_on_page(page)
            .map(|i| {
                let at = view.page_to_screen(Point::new(i.x, i.y));
                ImageView {
                    id: i.id.0,
                    x: at.x,
                    y: at.y,
                    width: i.width * zoom,
                    height: i.height * zoom,
                    src: i.src.clone(),
                }
            })
            .collect();

        let regions = overlays
            .regions_on_page(page)
            .map(|r| {
                let rect = view.rect_to_screen(r.rect());
                RegionView {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width,
                    height: rect.height,
                    text: r.text.clone(),
                    font_size: r.display_font_size(zoom),
                }
            })
            .collect();

        Self {
            page,
            page_count: editor.page_count(),
            zoom,
            width,
            height,
            origin_x: view.origin.x,
            origin_y: view.origin.y,
            error: editor
                .render_state()
                .error()
                .map(|e| pdfedit_core::EditorError::from(e.clone()).user_message()),
            texts,
            images,
            regions,
        }
    }
}
