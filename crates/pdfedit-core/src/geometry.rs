//! Page geometry extraction
//!
//! Reads the page box and `/Rotate` of a page, inheriting both from the page
//! tree when the page itself does not carry them.

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Longest canvas side Chromium and Firefox will allocate.
pub const MAX_CANVAS_SIDE: u32 = 32_767;

/// Page rotation as stored in `/Rotate`, clockwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    /// Normalise any multiple of 90 (negative values included).
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Rotation::Quarter,
            180 => Rotation::Half,
            270 => Rotation::ThreeQuarter,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    /// Advance a quarter turn clockwise.
    pub fn turned(self) -> Self {
        Rotation::from_degrees(self.degrees() + 90)
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Quarter | Rotation::ThreeQuarter)
    }
}

/// Size of a page as displayed, plus what is needed to map back to PDF space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Displayed width in points (after rotation)
    pub width: f64,
    /// Displayed height in points (after rotation)
    pub height: f64,
    pub rotation: Rotation,
    /// `[x0, y0, x1, y1]` of the visible box in PDF user space
    pub media_box: [f64; 4],
}

impl PageGeometry {
    /// Width of the page before `/Rotate` is applied.
    pub fn unrotated_width(&self) -> f64 {
        self.media_box[2] - self.media_box[0]
    }

    pub fn unrotated_height(&self) -> f64 {
        self.media_box[3] - self.media_box[1]
    }

    /// Bitmap size for this page at `zoom`, never smaller than one pixel.
    pub fn scaled(&self, zoom: f64) -> (u32, u32) {
        let w = (self.width * zoom).round().max(1.0) as u32;
        let h = (self.height * zoom).round().max(1.0) as u32;
        (w, h)
    }

    /// [`scaled`](Self::scaled), refused when the bitmap would be wider or
    /// taller than a canvas allows or cover more than `max_pixels`.
    pub fn checked_scaled(&self, zoom: f64, max_pixels: u64) -> Result<(u32, u32), LoadError> {
        let w = (self.width * zoom).round().max(1.0);
        let h = (self.height * zoom).round().max(1.0);
        let side = f64::from(MAX_CANVAS_SIDE);
        if !w.is_finite() || !h.is_finite() || w > side || h > side || w * h > max_pixels as f64 {
            return Err(LoadError::PageTooLarge {
                width: w,
                height: h,
                max_pixels,
            });
        }
        Ok((w as u32, h as u32))
    }

    pub fn from_page(doc: &Document, page_id: ObjectId) -> Result<Self, LoadError> {
        let page_dict = doc
            .get_dictionary(page_id)
            .map_err(|e| LoadError::Parse(format!("Page object is not a dictionary: {}", e)))?;

        // CropBox is what viewers show; fall back to the MediaBox
        let media_box = inherited(doc, page_dict, b"CropBox")
            .and_then(|obj| parse_box(doc, obj))
            .or_else(|| inherited(doc, page_dict, b"MediaBox").and_then(|obj| parse_box(doc, obj)))
            .unwrap_or([0.0, 0.0, 612.0, 792.0]);

        let rotation = inherited(doc, page_dict, b"Rotate")
            .and_then(|obj| resolve(doc, obj).as_i64().ok())
            .map(Rotation::from_degrees)
            .unwrap_or_default();

        let w = media_box[2] - media_box[0];
        let h = media_box[3] - media_box[1];
        let (width, height) = if rotation.swaps_axes() { (h, w) } else { (w, h) };

        Ok(Self {
            width,
            height,
            rotation,
            media_box,
        })
    }
}

/// Page object ids in document order (0-indexed position = page index).
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Look up a page by 0-based index.
pub fn page_id_at(doc: &Document, index: usize) -> Result<ObjectId, LoadError> {
    let ids = page_ids(doc);
    if ids.is_empty() {
        return Err(LoadError::NoPages);
    }
    ids.get(index).copied().ok_or(LoadError::PageOutOfRange {
        page: index,
        page_count: ids.len(),
    })
}

/// Follow a reference to its target; non-references are returned as-is.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).as_dict().ok()
}

pub(crate) fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Find `key` on the page or the nearest ancestor in the page tree.
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_dict;
    // Bounded walk guards against cyclic Parent chains
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve_dict(doc, parent)?;
    }
    None
}

fn parse_box(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let array = resolve(doc, obj).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = object_to_f64(resolve(doc, item))?;
    }
    // Normalise so x0 < x1 and y0 < y1
    let [a, b, c, d] = values;
    let normalised = [a.min(c), b.min(d), a.max(c), b.max(d)];
    if normalised[2] - normalised[0] <= 0.0 || normalised[3] - normalised[1] <= 0.0 {
        return None;
    }
    Some(normalised)
}
