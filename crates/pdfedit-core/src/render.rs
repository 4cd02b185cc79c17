//! Page rendering
//!
//! A render turns the authoritative bytes plus a page index and zoom into a
//! bitmap and the page's text regions, as one unit. Renders are tagged with a
//! generation from [`RenderGate`]; only the newest generation may commit, so a
//! slow render for a page the user already left never clobbers a later one.

use image::{Rgba, RgbaImage};
use lopdf::{Document, ObjectId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_CANVAS_PIXELS;
use crate::error::LoadError;
use crate::geometry::{page_id_at, PageGeometry};
use crate::text::{extract_regions, ExtractedTextRegion};

/// Turns one page into pixels.
///
/// The browser host draws with PDF.js and only needs the geometry; native
/// hosts can plug in a full rasterizer here.
pub trait Rasterizer {
    fn rasterize(
        &self,
        doc: &Document,
        page_id: ObjectId,
        geometry: &PageGeometry,
        regions: &[ExtractedTextRegion],
        zoom: f64,
    ) -> Result<RgbaImage, LoadError>;
}

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BORDER: Rgba<u8> = Rgba([220, 220, 220, 255]);
const TEXT_BAR: Rgba<u8> = Rgba([200, 205, 215, 255]);

/// Blank page with a border and a bar where each text run sits.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineRasterizer;

impl Rasterizer for OutlineRasterizer {
    fn rasterize(
        &self,
        _doc: &Document,
        _page_id: ObjectId,
        geometry: &PageGeometry,
        regions: &[ExtractedTextRegion],
        zoom: f64,
    ) -> Result<RgbaImage, LoadError> {
        let (width, height) = geometry.scaled(zoom);
        let mut image = RgbaImage::from_pixel(width, height, PAPER);

        for region in regions {
            let x0 = (region.x * zoom).floor().max(0.0) as u32;
            let y0 = (region.y * zoom).floor().max(0.0) as u32;
            let x1 = ((region.x + region.width) * zoom).ceil().min(width as f64) as u32;
            let y1 = ((region.y + region.height) * zoom).ceil().min(height as f64) as u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    image.put_pixel(x, y, TEXT_BAR);
                }
            }
        }

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, BORDER);
                image.put_pixel(x, height - 1, BORDER);
            }
            for y in 0..height {
                image.put_pixel(0, y, BORDER);
                image.put_pixel(width - 1, y, BORDER);
            }
        }

        Ok(image)
    }
}

/// Everything derived from one render of one page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page: usize,
    pub page_count: usize,
    pub zoom: f64,
    pub geometry: PageGeometry,
    pub bitmap: RgbaImage,
    pub regions: Vec<ExtractedTextRegion>,
}

/// Parse bytes into a document the editor can work with.
pub fn load_document(bytes: &[u8]) -> Result<Document, LoadError> {
    let doc = Document::load_mem(bytes).map_err(|e| LoadError::Parse(e.to_string()))?;
    if doc.is_encrypted() {
        return Err(LoadError::Encrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(LoadError::NoPages);
    }
    Ok(doc)
}

#[derive(Debug, Clone)]
pub struct PageRenderer<R = OutlineRasterizer> {
    rasterizer: R,
    max_canvas_pixels: u64,
}

impl PageRenderer<OutlineRasterizer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: Rasterizer + Default> Default for PageRenderer<R> {
    fn default() -> Self {
        Self::with_rasterizer(R::default())
    }
}

impl<R: Rasterizer> PageRenderer<R> {
    pub fn with_rasterizer(rasterizer: R) -> Self {
        Self {
            rasterizer,
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }

    /// Refuse renders whose bitmap would cover more than `max_pixels`.
    pub fn with_max_canvas_pixels(mut self, max_pixels: u64) -> Self {
        self.max_canvas_pixels = max_pixels;
        self
    }

    pub fn render(&self, bytes: &[u8], page: usize, zoom: f64) -> Result<RenderedPage, LoadError> {
        let doc = load_document(bytes)?;
        self.render_document(&doc, page, zoom)
    }

    pub fn render_document(
        &self,
        doc: &Document,
        page: usize,
        zoom: f64,
    ) -> Result<RenderedPage, LoadError> {
        let page_id = page_id_at(doc, page)?;
        let geometry = PageGeometry::from_page(doc, page_id)?;
        geometry.checked_scaled(zoom, self.max_canvas_pixels)?;
        let regions = extract_regions(doc, page_id, page, geometry)?;
        let bitmap = self
            .rasterizer
            .rasterize(doc, page_id, &geometry, &regions, zoom)?;

        debug!(
            page,
            zoom,
            width = bitmap.width(),
            height = bitmap.height(),
            regions = regions.len(),
            "rendered page"
        );

        Ok(RenderedPage {
            page,
            page_count: doc.get_pages().len(),
            zoom,
            geometry,
            bitmap,
            regions,
        })
    }
}

/// Hands out render generations; the newest one is the only one current.
#[derive(Debug, Default)]
pub struct RenderGate {
    generation: u64,
}

impl RenderGate {
    /// Start a new render, superseding every earlier one.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Supersede whatever is in flight without starting anything new.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }
}

/// A render request detached from the editor so it can run elsewhere.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub bytes: Arc<[u8]>,
    pub page: usize,
    pub zoom: f64,
    pub generation: u64,
}

impl RenderJob {
    pub fn run<R: Rasterizer>(&self, renderer: &PageRenderer<R>) -> RenderOutcome {
        RenderOutcome {
            generation: self.generation,
            page: self.page,
            result: renderer.render(&self.bytes, self.page, self.zoom),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub generation: u64,
    pub page: usize,
    pub result: Result<RenderedPage, LoadError>,
}

/// What the canvas currently shows.
#[derive(Debug, Clone, Default)]
pub enum RenderState {
    #[default]
    Empty,
    Ready(RenderedPage),
    /// Render failed; nothing derived from an earlier page is kept
    Failed(LoadError),
}

impl RenderState {
    pub fn page(&self) -> Option<&RenderedPage> {
        match self {
            RenderState::Ready(page) => Some(page),
            _ => None,
        }
    }

    pub fn regions(&self) -> &[ExtractedTextRegion] {
        self.page().map(|p| p.regions.as_slice()).unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            RenderState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Apply a finished render. Returns `false` if it was superseded.
    pub fn commit(&mut self, gate: &RenderGate, outcome: RenderOutcome) -> bool {
        if !gate.is_current(outcome.generation) {
            debug!(
                generation = outcome.generation,
                page = outcome.page,
                "discarding stale render"
            );
            return false;
        }
        *self = match outcome.result {
            Ok(page) => RenderState::Ready(page),
            Err(e) => {
                warn!(page = outcome.page, error = %e, "render failed");
                RenderState::Failed(e)
            }
        };
        true
    }
}
