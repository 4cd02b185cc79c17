//! Overlay model
//!
//! Owns the user's text boxes and images plus the text regions extracted from
//! the current render. Overlays are addressed by ids handed out from
//! monotonic counters, so an id is never reused after deletion and stays
//! valid while other overlays come and go.
//!
//! All positions are page space. Nothing here knows about zoom.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::EditorConfig;
use crate::style::{FontColor, FontFamily, Opacity};
use crate::text::ExtractedTextRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(pub u64);

/// Either kind of overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayRef {
    Text(TextId),
    Image(ImageId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub id: TextId,
    page: usize,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub font_size: f64,
    pub font_family: FontFamily,
    pub font_color: FontColor,
    pub opacity: Opacity,
}

impl TextOverlay {
    /// Page the overlay was created on; fixed for its lifetime.
    pub fn page(&self) -> usize {
        self.page
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    pub id: ImageId,
    page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// `data:` URL of the image as the user supplied it
    pub src: String,
}

impl ImageOverlay {
    pub fn page(&self) -> usize {
        self.page
    }

    /// Height over width.
    pub fn aspect(&self) -> f64 {
        if self.width > 0.0 {
            self.height / self.width
        } else {
            1.0
        }
    }
}

/// Partial update for a text overlay; `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub font_family: Option<FontFamily>,
    pub font_color: Option<FontColor>,
    pub opacity: Option<Opacity>,
}

impl TextPatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl ImagePatch {
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }
}

/// Serialisable copy of every user overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    pub texts: Vec<TextOverlay>,
    pub images: Vec<ImageOverlay>,
}

#[derive(Debug, Clone)]
pub struct OverlayModel {
    texts: Vec<TextOverlay>,
    images: Vec<ImageOverlay>,
    regions: Vec<ExtractedTextRegion>,
    editing: Option<TextId>,
    next_text: u64,
    next_image: u64,
    config: EditorConfig,
}

impl Default for OverlayModel {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl OverlayModel {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            texts: Vec::new(),
            images: Vec::new(),
            regions: Vec::new(),
            editing: None,
            next_text: 0,
            next_image: 0,
            config,
        }
    }

    fn push_text(&mut self, mut overlay: TextOverlay) -> TextId {
        let id = TextId(self.next_text);
        self.next_text += 1;
        overlay.id = id;
        self.texts.push(overlay);
        self.editing = Some(id);
        id
    }

    /// Default-styled text box at a page-space point, selected for editing.
    pub fn add_text(&mut self, page: usize, x: f64, y: f64) -> TextId {
        let overlay = TextOverlay {
            id: TextId(0),
            page,
            x,
            y,
            text: self.config.default_text.clone(),
            font_size: self.config.default_font_size,
            font_family: self.config.default_font_family,
            font_color: self.config.default_color,
            opacity: Opacity::default(),
        };
        let id = self.push_text(overlay);
        debug!(?id, page, x, y, "added text overlay");
        id
    }

    /// Editable copy of an extracted region. The region itself is untouched.
    pub fn promote(&mut self, region: &ExtractedTextRegion) -> TextId {
        let overlay = TextOverlay {
            id: TextId(0),
            page: region.page,
            x: region.x,
            y: region.y,
            text: region.text.clone(),
            font_size: region.font_size,
            font_family: region.font_family,
            font_color: self.config.default_color,
            opacity: Opacity::default(),
        };
        let id = self.push_text(overlay);
        debug!(?id, page = region.page, text = %region.text, "promoted text region");
        id
    }

    /// Image at a page-space point, `default_image_width` wide.
    ///
    /// `aspect` is the intrinsic height over width of the bitmap.
    pub fn add_image(
        &mut self,
        page: usize,
        x: f64,
        y: f64,
        src: impl Into<String>,
        aspect: f64,
    ) -> ImageId {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        let id = ImageId(self.next_image);
        self.next_image += 1;
        let width = self.config.default_image_width;
        self.images.push(ImageOverlay {
            id,
            page,
            x,
            y,
            width,
            height: width * aspect,
            src: src.into(),
        });
        debug!(?id, page, x, y, "added image overlay");
        id
    }

    /// Merge `patch` into the text overlay. Returns `false` if it no longer exists.
    pub fn update_text(&mut self, id: TextId, patch: TextPatch) -> bool {
        let font_size = patch
            .font_size
            .filter(|size| !size.is_nan())
            .map(|size| self.config.clamp_font_size(size));
        let Some(overlay) = self.texts.iter_mut().find(|t| t.id == id) else {
            trace!(?id, "update for missing text overlay");
            return false;
        };
        if let Some(x) = patch.x {
            overlay.x = x;
        }
        if let Some(y) = patch.y {
            overlay.y = y;
        }
        if let Some(text) = patch.text {
            overlay.text = text;
        }
        if let Some(size) = font_size {
            overlay.font_size = size;
        }
        if let Some(family) = patch.font_family {
            overlay.font_family = family;
        }
        if let Some(color) = patch.font_color {
            overlay.font_color = color;
        }
        if let Some(opacity) = patch.opacity {
            overlay.opacity = opacity;
        }
        true
    }

    pub fn update_image(&mut self, id: ImageId, patch: ImagePatch) -> bool {
        let Some(overlay) = self.images.iter_mut().find(|i| i.id == id) else {
            trace!(?id, "update for missing image overlay");
            return false;
        };
        if let Some(x) = patch.x {
            overlay.x = x;
        }
        if let Some(y) = patch.y {
            overlay.y = y;
        }
        if let Some(width) = patch.width {
            overlay.width = width;
        }
        if let Some(height) = patch.height {
            overlay.height = height;
        }
        true
    }

    /// Delete an overlay, clearing the edit marker if it pointed at it.
    pub fn remove(&mut self, target: OverlayRef) -> bool {
        let removed = match target {
            OverlayRef::Text(id) => {
                let before = self.texts.len();
                self.texts.retain(|t| t.id != id);
                if self.editing == Some(id) {
                    self.editing = None;
                }
                self.texts.len() != before
            }
            OverlayRef::Image(id) => {
                let before = self.images.len();
                self.images.retain(|i| i.id != id);
                self.images.len() != before
            }
        };
        if removed {
            debug!(?target, "removed overlay");
        }
        removed
    }

    pub fn editing_id(&self) -> Option<TextId> {
        self.editing
    }

    /// Focus `id` for editing; any previous focus is dropped.
    pub fn begin_editing(&mut self, id: TextId) -> bool {
        if self.text(id).is_none() {
            return false;
        }
        self.editing = Some(id);
        true
    }

    pub fn stop_editing(&mut self) {
        self.editing = None;
    }

    pub fn text(&self, id: TextId) -> Option<&TextOverlay> {
        self.texts.iter().find(|t| t.id == id)
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageOverlay> {
        self.images.iter().find(|i| i.id == id)
    }

    pub fn texts(&self) -> &[TextOverlay] {
        &self.texts
    }

    pub fn images(&self) -> &[ImageOverlay] {
        &self.images
    }

    pub fn texts_on_page(&self, page: usize) -> impl Iterator<Item = &TextOverlay> {
        self.texts.iter().filter(move |t| t.page == page)
    }

    pub fn images_on_page(&self, page: usize) -> impl Iterator<Item = &ImageOverlay> {
        self.images.iter().filter(move |i| i.page == page)
    }

    pub fn regions_on_page(&self, page: usize) -> impl Iterator<Item = &ExtractedTextRegion> {
        self.regions.iter().filter(move |r| r.page == page)
    }

    /// Install the regions of a fresh render.
    pub fn replace_regions(&mut self, regions: Vec<ExtractedTextRegion>) {
        self.regions = regions;
    }

    pub fn clear_regions(&mut self) {
        self.regions.clear();
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            texts: self.texts.clone(),
            images: self.images.clone(),
        }
    }

    /// Replace all overlays with a snapshot; ids continue after the highest restored.
    pub fn restore(&mut self, snapshot: OverlaySnapshot) {
        self.next_text = snapshot
            .texts
            .iter()
            .map(|t| t.id.0 + 1)
            .max()
            .unwrap_or(0)
            .max(self.next_text);
        self.next_image = snapshot
            .images
            .iter()
            .map(|i| i.id.0 + 1)
            .max()
            .unwrap_or(0)
            .max(self.next_image);
        self.texts = snapshot.texts;
        self.images = snapshot.images;
        self.editing = None;
    }
}
