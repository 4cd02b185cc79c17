//! Text geometry extraction
//!
//! Walks a page's content stream, tracking the graphics and text state just
//! far enough to know where each text-showing operator puts its glyphs. Each
//! `Tj`, `TJ`, `'` or `"` becomes one [`ExtractedTextRegion`] in page space
//! (top-left origin, unzoomed). The Y axis is flipped exactly once, here.
//!
//! Widths come from the font's `/Widths` array when present; otherwise an
//! average advance of half an em is assumed.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::coords::{flip_baseline, rotate_rect, PageRect, Point};
use crate::error::LoadError;
use crate::geometry::{inherited, object_to_f64, resolve, resolve_dict, PageGeometry};
use crate::style::FontFamily;

/// Existing text on the page, used as a click target to seed a text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTextRegion {
    pub page: usize,
    #[serde(rename = "str")]
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Font size in page units; see [`ExtractedTextRegion::display_font_size`]
    pub font_size: f64,
    /// Closest editable family to the font the text was set in
    pub font_family: FontFamily,
}

impl ExtractedTextRegion {
    pub fn rect(&self) -> PageRect {
        PageRect::new(self.x, self.y, self.width, self.height)
    }

    /// Font size as drawn on a canvas rendered at `zoom`.
    pub fn display_font_size(&self, zoom: f64) -> f64 {
        self.font_size * zoom
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f64, ty: f64) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    fn from_operands(ops: &[Object]) -> Option<Self> {
        if ops.len() != 6 {
            return None;
        }
        let v: Vec<f64> = ops.iter().filter_map(object_to_f64).collect();
        if v.len() != 6 {
            return None;
        }
        Some(Matrix {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// `self x other` in the row-vector convention used by PDF.
    fn then(self, other: Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn horizontal_scale(self) -> f64 {
        self.a.hypot(self.b)
    }

    fn vertical_scale(self) -> f64 {
        self.c.hypot(self.d)
    }
}

#[derive(Debug, Clone)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f64>,
    default_width: f64,
    two_byte: bool,
    family: FontFamily,
}

impl FontMetrics {
    fn fallback() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            default_width: 500.0,
            two_byte: false,
            family: FontFamily::Helvetica,
        }
    }

    fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| resolve(doc, o).as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let two_byte = font
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .is_some_and(|n| n == b"Type0");

        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| resolve(doc, o).as_i64().ok())
            .unwrap_or(0);
        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|w| object_to_f64(resolve(doc, w)).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();

        let default_width = if two_byte {
            // Type0 fonts: the descendant's /DW, 1000 when absent
            font.get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|d| d.get(b"DW").ok())
                .and_then(object_to_f64)
                .unwrap_or(1000.0)
        } else {
            font.get(b"FontDescriptor")
                .ok()
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|d| d.get(b"MissingWidth").ok())
                .and_then(object_to_f64)
                .filter(|w| *w > 0.0)
                .unwrap_or(500.0)
        };

        Self {
            first_char,
            widths,
            default_width,
            two_byte,
            family: FontFamily::from_pdf_font_name(&base_font),
        }
    }

    /// Glyph width in thousandths of an em.
    fn width(&self, code: u32) -> f64 {
        let index = code as i64 - self.first_char;
        if index >= 0 {
            if let Some(w) = self.widths.get(index as usize) {
                return *w;
            }
        }
        self.default_width
    }

    fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(*hi) << 8 | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        }
    }
}

/// Best-effort decoding of a PDF string for display and editing.
fn decode_text(bytes: &[u8], two_byte: bool) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) || two_byte {
        let body = bytes.strip_prefix(&[0xFE, 0xFF]).unwrap_or(bytes);
        let units: Vec<u16> = body
            .chunks(2)
            .map(|pair| match pair {
                [hi, lo] => u16::from(*hi) << 8 | u16::from(*lo),
                [single] => u16::from(*single),
                _ => 0,
            })
            .collect();
        return String::from_utf16_lossy(&units);
    }
    // Simple fonts: treat as Latin-1, close enough to WinAnsi for editing
    bytes.iter().map(|b| char::from(*b)).collect()
}

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f64,
    leading: f64,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            rise: 0.0,
        }
    }
}

enum RunPart<'a> {
    Glyphs(&'a [u8]),
    Adjust(f64),
}

struct Walker<'a> {
    doc: &'a Document,
    fonts: HashMap<Vec<u8>, FontMetrics>,
    font_dicts: Option<&'a Dictionary>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text: TextState,
    page: usize,
    geometry: PageGeometry,
    regions: Vec<ExtractedTextRegion>,
}

impl<'a> Walker<'a> {
    fn metrics(&mut self) -> FontMetrics {
        let Some(name) = self.text.font.clone() else {
            return FontMetrics::fallback();
        };
        if let Some(found) = self.fonts.get(&name) {
            return found.clone();
        }
        let metrics = self
            .font_dicts
            .and_then(|fonts| fonts.get(&name).ok())
            .and_then(|o| resolve_dict(self.doc, o))
            .map(|d| FontMetrics::from_dict(self.doc, d))
            .unwrap_or_else(FontMetrics::fallback);
        self.fonts.insert(name, metrics.clone());
        metrics
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.text.tlm = Matrix::translate(tx, ty).then(self.text.tlm);
        self.text.tm = self.text.tlm;
    }

    fn show(&mut self, parts: &[RunPart<'_>]) {
        let metrics = self.metrics();
        let start = self.text.tm.then(self.ctm);
        let fs = self.text.font_size;
        let h = self.text.h_scale;

        let mut advance = 0.0;
        let mut decoded = String::new();
        for part in parts {
            match part {
                RunPart::Glyphs(bytes) => {
                    for code in metrics.codes(bytes) {
                        let mut tx = metrics.width(code) / 1000.0 * fs + self.text.char_spacing;
                        if code == 32 && !metrics.two_byte {
                            tx += self.text.word_spacing;
                        }
                        advance += tx * h;
                    }
                    decoded.push_str(&decode_text(bytes, metrics.two_byte));
                }
                RunPart::Adjust(n) => advance -= n / 1000.0 * fs * h,
            }
        }
        self.text.tm = Matrix::translate(advance, 0.0).then(self.text.tm);

        let size = (fs * start.vertical_scale()).abs();
        let width = (advance * start.horizontal_scale()).abs();
        if decoded.trim().is_empty() || size <= 0.0 {
            return;
        }

        let (ux, uy) = start.apply(0.0, self.text.rise);
        let mb = self.geometry.media_box;
        let unrotated_h = self.geometry.unrotated_height();
        let baseline_top = flip_baseline(unrotated_h, uy - mb[1]);
        let unrotated = PageRect::new(ux - mb[0], baseline_top - size, width, size);
        let rect = rotate_rect(
            unrotated,
            self.geometry.unrotated_width(),
            unrotated_h,
            self.geometry.rotation,
        );

        trace!(text = %decoded, x = rect.x, y = rect.y, "text run");
        self.regions.push(ExtractedTextRegion {
            page: self.page,
            text: decoded,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            font_size: size,
            font_family: metrics.family,
        });
    }

    fn run(&mut self, content: &Content) {
        for op in &content.operations {
            let operands = &op.operands;
            let num = |i: usize| operands.get(i).and_then(object_to_f64);
            match op.operator.as_str() {
                "q" => self.ctm_stack.push(self.ctm),
                "Q" => {
                    if let Some(m) = self.ctm_stack.pop() {
                        self.ctm = m;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.ctm = m.then(self.ctm);
                    }
                }
                "BT" => {
                    self.text.tm = Matrix::IDENTITY;
                    self.text.tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    self.text.font = operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .map(|n| n.to_vec());
                    self.text.font_size = num(1).unwrap_or(0.0);
                }
                "TL" => self.text.leading = num(0).unwrap_or(0.0),
                "Tc" => self.text.char_spacing = num(0).unwrap_or(0.0),
                "Tw" => self.text.word_spacing = num(0).unwrap_or(0.0),
                "Tz" => self.text.h_scale = num(0).unwrap_or(100.0) / 100.0,
                "Ts" => self.text.rise = num(0).unwrap_or(0.0),
                "Td" => self.next_line(num(0).unwrap_or(0.0), num(1).unwrap_or(0.0)),
                "TD" => {
                    let ty = num(1).unwrap_or(0.0);
                    self.text.leading = -ty;
                    self.next_line(num(0).unwrap_or(0.0), ty);
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.text.tm = m;
                        self.text.tlm = m;
                    }
                }
                "T*" => self.next_line(0.0, -self.text.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&[RunPart::Glyphs(bytes)]);
                    }
                }
                "'" => {
                    self.next_line(0.0, -self.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&[RunPart::Glyphs(bytes)]);
                    }
                }
                "\"" => {
                    self.text.word_spacing = num(0).unwrap_or(self.text.word_spacing);
                    self.text.char_spacing = num(1).unwrap_or(self.text.char_spacing);
                    self.next_line(0.0, -self.text.leading);
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(&[RunPart::Glyphs(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let parts: Vec<RunPart<'_>> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(RunPart::Glyphs(bytes)),
                                other => object_to_f64(other).map(RunPart::Adjust),
                            })
                            .collect();
                        self.show(&parts);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Extract text regions of one page.
///
/// `page` is the 0-based index recorded on each region; `geometry` must be
/// the geometry of `page_id` so the Y flip and rotation match the render.
pub fn extract_regions(
    doc: &Document,
    page_id: ObjectId,
    page: usize,
    geometry: PageGeometry,
) -> Result<Vec<ExtractedTextRegion>, LoadError> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| LoadError::Parse(format!("Failed to read page content: {}", e)))?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let content = Content::decode(&data)
        .map_err(|e| LoadError::Parse(format!("Failed to decode page content: {}", e)))?;

    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| LoadError::Parse(e.to_string()))?;
    let font_dicts = inherited(doc, page_dict, b"Resources")
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|o| resolve_dict(doc, o));

    let mut walker = Walker {
        doc,
        fonts: HashMap::new(),
        font_dicts,
        ctm: Matrix::IDENTITY,
        ctm_stack: Vec::new(),
        text: TextState::default(),
        page,
        geometry,
        regions: Vec::new(),
    };
    walker.run(&content);

    debug!(page, regions = walker.regions.len(), "extracted text regions");
    Ok(walker.regions)
}

/// Topmost region containing the page-space point `p`.
pub fn region_at(regions: &[ExtractedTextRegion], p: Point) -> Option<&ExtractedTextRegion> {
    regions.iter().rev().find(|r| r.rect().contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{page_id_at, Rotation};
    use lopdf::{dictionary, Stream};

    fn page_with_content(content: &[u8], rotate: i64, with_widths: bool) -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
        };
        if with_widths {
            // Every code from 32 to 126 is 600 units wide
            font.set("FirstChar", 32);
            font.set(
                "Widths",
                Object::Array((32..=126).map(|_| Object::Integer(600)).collect()),
            );
        }
        let font_id = doc.add_object(font);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Rotate" => rotate,
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    fn extract(doc: &Document) -> Vec<ExtractedTextRegion> {
        let page_id = page_id_at(doc, 0).unwrap();
        let geometry = PageGeometry::from_page(doc, page_id).unwrap();
        extract_regions(doc, page_id, 0, geometry).unwrap()
    }

    #[test]
    fn test_single_run_is_flipped_to_top_left() {
        let doc = page_with_content(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", 0, true);
        let regions = extract(&doc);

        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.text, "Hello");
        assert_eq!(r.x, 72.0);
        // Baseline 700 from the bottom is 92 from the top; box starts one em higher
        assert_eq!(r.y, 92.0 - 12.0);
        assert_eq!(r.font_size, 12.0);
        assert_eq!(r.height, 12.0);
        // 5 glyphs * 600/1000 * 12
        assert!((r.width - 36.0).abs() < 1e-9);
        assert_eq!(r.font_family, FontFamily::TimesRoman);
    }

    #[test]
    fn test_font_size_follows_text_matrix_scale() {
        let doc = page_with_content(b"BT /F1 1 Tf 2 0 0 2 100 500 Tm (Big) Tj ET", 0, true);
        let regions = extract(&doc);
        assert_eq!(regions[0].font_size, 2.0);
        assert_eq!(regions[0].x, 100.0);
    }

    #[test]
    fn test_ctm_scale_applies() {
        let doc = page_with_content(b"q 2 0 0 2 0 0 cm BT /F1 10 Tf 10 10 Td (A) Tj ET Q", 0, true);
        let regions = extract(&doc);
        assert_eq!(regions[0].font_size, 20.0);
        assert_eq!(regions[0].x, 20.0);
    }

    #[test]
    fn test_successive_lines_via_t_star() {
        let doc = page_with_content(
            b"BT /F1 10 Tf 14 TL 50 700 Td (One) Tj T* (Two) Tj ET",
            0,
            true,
        );
        let regions = extract(&doc);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].y - regions[0].y, 14.0);
    }

    #[test]
    fn test_tj_array_is_one_region() {
        let doc = page_with_content(b"BT /F1 10 Tf 50 700 Td [(Hel) -500 (lo)] TJ ET", 0, true);
        let regions = extract(&doc);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].text, "Hello");
        // 5 glyphs * 6 + 5 (kerning of -500 widens)
        assert!((regions[0].width - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_widths_use_average_advance() {
        let doc = page_with_content(b"BT /F1 10 Tf 0 0 Td (abcd) Tj ET", 0, false);
        let regions = extract(&doc);
        assert!((regions[0].width - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_whitespace_runs_are_skipped() {
        let doc = page_with_content(b"BT /F1 10 Tf 0 0 Td (   ) Tj ET", 0, true);
        assert!(extract(&doc).is_empty());
    }

    #[test]
    fn test_rotated_page_regions_follow_display() {
        let doc = page_with_content(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", 90, true);
        let page_id = page_id_at(&doc, 0).unwrap();
        let geometry = PageGeometry::from_page(&doc, page_id).unwrap();
        assert_eq!(geometry.rotation, Rotation::Quarter);

        let regions = extract(&doc);
        let r = &regions[0];
        // The run now reads top-to-bottom near the right edge of a 792-wide page
        assert_eq!(r.width, 12.0);
        assert!((r.height - 36.0).abs() < 1e-9);
        assert_eq!(r.x, 792.0 - 92.0);
        assert_eq!(r.y, 72.0);
    }

    #[test]
    fn test_region_at_hit_test() {
        let doc = page_with_content(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", 0, true);
        let regions = extract(&doc);
        assert!(region_at(&regions, Point::new(80.0, 85.0)).is_some());
        assert!(region_at(&regions, Point::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn test_display_font_size_scales_with_zoom() {
        let doc = page_with_content(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", 0, true);
        let regions = extract(&doc);
        assert_eq!(regions[0].display_font_size(1.5), 18.0);
    }

    #[test]
    fn test_utf16_string_decoding() {
        assert_eq!(decode_text(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69], false), "Hi");
        assert_eq!(decode_text(b"caf\xe9", false), "café");
    }
}
