//! Flatten overlays into the document
//!
//! Overlays are drawn into each page's content stream rather than added as
//! annotations, so the saved file looks the same in every viewer. The page's
//! existing content is wrapped in `q`/`Q` so whatever graphics state it
//! leaves behind cannot leak into the overlay drawing.
//!
//! Overlay coordinates are displayed page space (top-left origin, after
//! `/Rotate`). Each point is taken back through the rotation and the Y flip
//! to PDF user space here, and text and images are drawn with a matrix that
//! counter-rotates them so they appear upright in the rotated view.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::coords::{unrotate_point, Point};
use crate::error::{EditorError, LoadError};
use crate::geometry::{inherited, page_ids, resolve_dict, PageGeometry, Rotation};
use crate::image_input::pdf_image_data;
use crate::overlay::{ImageOverlay, OverlaySnapshot, TextOverlay};
use crate::render::load_document;
use crate::style::FontFamily;

/// Baseline-to-baseline distance as a multiple of the font size.
const LINE_HEIGHT: f64 = 1.2;

/// Burn every overlay of `snapshot` into a copy of `bytes`.
///
/// Overlays whose page no longer exists are skipped.
pub fn flatten_document(bytes: &[u8], snapshot: &OverlaySnapshot) -> Result<Vec<u8>, EditorError> {
    let mut doc = load_document(bytes)?;
    let pages = page_ids(&doc);

    let mut by_page: BTreeMap<usize, (Vec<&TextOverlay>, Vec<&ImageOverlay>)> = BTreeMap::new();
    for text in &snapshot.texts {
        by_page.entry(text.page()).or_default().0.push(text);
    }
    for image in &snapshot.images {
        by_page.entry(image.page()).or_default().1.push(image);
    }

    let mut fonts = HashMap::new();
    for (page, (texts, images)) in by_page {
        let Some(&page_id) = pages.get(page) else {
            debug!(page, "skipping overlays on a page that no longer exists");
            continue;
        };
        flatten_page(&mut doc, page_id, &texts, &images, &mut fonts)?;
    }

    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| EditorError::Flatten(e.to_string()))?;
    info!(
        texts = snapshot.texts.len(),
        images = snapshot.images.len(),
        "flattened overlays"
    );
    Ok(buffer)
}

fn flatten_page(
    doc: &mut Document,
    page_id: ObjectId,
    texts: &[&TextOverlay],
    images: &[&ImageOverlay],
    fonts: &mut HashMap<FontFamily, ObjectId>,
) -> Result<(), EditorError> {
    let geometry = PageGeometry::from_page(doc, page_id)?;
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| LoadError::Parse(e.to_string()))?
        .clone();

    let mut resources = inherited(doc, &page_dict, b"Resources")
        .and_then(|o| resolve_dict(doc, o))
        .cloned()
        .unwrap_or_default();
    let mut font_res = sub_dictionary(doc, &resources, b"Font");
    let mut xobjects = sub_dictionary(doc, &resources, b"XObject");
    let mut states = sub_dictionary(doc, &resources, b"ExtGState");

    let existing = existing_contents(doc, &page_dict);
    let mut ops = Vec::new();
    if !existing.is_empty() {
        ops.push(Operation::new("Q", vec![]));
    }

    for text in texts {
        let family = text.font_family;
        let font_id = *fonts
            .entry(family)
            .or_insert_with(|| doc.add_object(standard_font(family)));
        let font_name = font_resource_name(family);
        font_res.set(font_name, Object::Reference(font_id));

        ops.push(Operation::new("q", vec![]));
        if !text.opacity.is_opaque() {
            let name = opacity_state(&mut states, text.opacity.get());
            ops.push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
        }
        let (r, g, b) = text.font_color.to_pdf_rgb();
        ops.push(Operation::new(
            "rg",
            vec![Object::Real(r), Object::Real(g), Object::Real(b)],
        ));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(font_name.as_bytes().to_vec()),
                Object::Real(text.font_size as f32),
            ],
        ));
        let (cos, sin) = direction(geometry.rotation);
        for (i, line) in text.text.split('\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let baseline = Point::new(
                text.x,
                text.y + text.font_size + i as f64 * text.font_size * LINE_HEIGHT,
            );
            let (px, py) = to_pdf(&geometry, baseline);
            ops.push(Operation::new("Tm", reals(&[cos, sin, -sin, cos, px, py])));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(line), StringFormat::Literal)],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    for image in images {
        let data = pdf_image_data(&image.src)?;
        let smask = data.alpha.map(|alpha| {
            doc.add_object(
                Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => data.width as i64,
                        "Height" => data.height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                        "Filter" => "FlateDecode",
                    },
                    alpha,
                )
                .with_compression(false),
            )
        });
        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => data.width as i64,
            "Height" => data.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        if let Some(smask_id) = smask {
            image_dict.set("SMask", Object::Reference(smask_id));
        }
        let image_id = doc.add_object(Stream::new(image_dict, data.rgb).with_compression(false));
        let name = format!("PdfEditIm{}", image.id.0);
        xobjects.set(name.as_str(), Object::Reference(image_id));

        // Image space is the unit square; map it onto the displayed box
        let (cos, sin) = direction(geometry.rotation);
        let (px, py) = to_pdf(&geometry, Point::new(image.x, image.y + image.height));
        let (w, h) = (image.width, image.height);
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            reals(&[w * cos, w * sin, -h * sin, h * cos, px, py]),
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        ops.push(Operation::new("Q", vec![]));
    }

    resources.set("Font", Object::Dictionary(font_res));
    if !xobjects.is_empty() {
        resources.set("XObject", Object::Dictionary(xobjects));
    }
    if !states.is_empty() {
        resources.set("ExtGState", Object::Dictionary(states));
    }

    // Streams are concatenated as-is, so keep the first operator off the
    // previous stream's last token
    let mut encoded = b"\n".to_vec();
    encoded.extend(
        Content { operations: ops }
            .encode()
            .map_err(|e| EditorError::Flatten(e.to_string()))?,
    );
    let mut contents = Vec::new();
    if !existing.is_empty() {
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(save_id));
        contents.extend(existing);
    }
    contents.push(Object::Reference(
        doc.add_object(Stream::new(Dictionary::new(), encoded)),
    ));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| LoadError::Parse(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));

    debug!(
        ?page_id,
        texts = texts.len(),
        images = images.len(),
        "flattened page"
    );
    Ok(())
}

/// Resolved copy of `resources[key]`, empty when absent.
fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .cloned()
        .unwrap_or_default()
}

/// References to the page's current content streams, in order.
fn existing_contents(doc: &mut Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Stream(stream)) => vec![Object::Reference(doc.add_object(stream.clone()))],
        _ => Vec::new(),
    }
}

fn standard_font(family: FontFamily) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => family.pdf_base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn font_resource_name(family: FontFamily) -> &'static str {
    match family {
        FontFamily::Helvetica => "PdfEditHelvetica",
        FontFamily::TimesRoman => "PdfEditTimesRoman",
        FontFamily::Courier => "PdfEditCourier",
    }
}

/// Register (or reuse) an `ExtGState` for `opacity`; returns its name.
fn opacity_state(states: &mut Dictionary, opacity: f64) -> String {
    let percent = (opacity * 100.0).round() as i64;
    let name = format!("PdfEditGS{}", percent);
    if states.get(name.as_bytes()).is_err() {
        let alpha = Object::Real(percent as f32 / 100.0);
        states.set(
            name.as_str(),
            dictionary! {
                "Type" => "ExtGState",
                "ca" => alpha.clone(),
                "CA" => alpha,
            },
        );
    }
    name
}

/// Unit vector, in PDF space, of the displayed page's +x axis.
fn direction(rotation: Rotation) -> (f64, f64) {
    match rotation {
        Rotation::None => (1.0, 0.0),
        Rotation::Quarter => (0.0, 1.0),
        Rotation::Half => (-1.0, 0.0),
        Rotation::ThreeQuarter => (0.0, -1.0),
    }
}

/// Displayed page-space point to PDF user space.
fn to_pdf(geometry: &PageGeometry, p: Point) -> (f64, f64) {
    let height = geometry.unrotated_height();
    let u = unrotate_point(p, geometry.unrotated_width(), height, geometry.rotation);
    (
        geometry.media_box[0] + u.x,
        geometry.media_box[1] + height - u.y,
    )
}

fn reals(values: &[f64]) -> Vec<Object> {
    values.iter().map(|&v| Object::Real(v as f32)).collect()
}

/// Encode for the standard fonts' WinAnsiEncoding; unmappable characters become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_input::{decode_image, fixtures::png};
    use crate::overlay::{ImagePatch, OverlayModel, TextPatch};
    use crate::render::fixtures::pdf_bytes;
    use crate::render::PageRenderer;
    use crate::style::{FontColor, Opacity};

    fn last_content_ops(bytes: &[u8], index: usize) -> Vec<Operation> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = page_ids(&doc)[index];
        let contents = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        let last = contents.last().unwrap().as_reference().unwrap();
        let stream = doc.get_object(last).unwrap().as_stream().unwrap();
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        Content::decode(&data).unwrap().operations
    }

    fn floats(op: &Operation) -> Vec<f32> {
        op.operands.iter().map(|o| o.as_float().unwrap()).collect()
    }

    #[test]
    fn test_text_lands_where_it_was_placed() {
        let bytes = pdf_bytes(&["Original"]);
        let mut model = OverlayModel::default();
        let id = model.add_text(0, 100.0, 200.0);
        model.update_text(
            id,
            TextPatch {
                text: Some("Added".into()),
                font_size: Some(20.0),
                ..TextPatch::default()
            },
        );

        let flat = flatten_document(&bytes, &model.snapshot()).unwrap();
        let page = PageRenderer::new().render(&flat, 0, 1.0).unwrap();

        let texts: Vec<&str> = page.regions.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Original", "Added"]);
        let added = &page.regions[1];
        assert!((added.x - 100.0).abs() < 1e-3);
        assert!((added.y - 200.0).abs() < 1e-3);
        assert!((added.font_size - 20.0).abs() < 1e-3);
        assert_eq!(added.font_family, FontFamily::Helvetica);
    }

    #[test]
    fn test_multiline_text_draws_each_line() {
        let bytes = pdf_bytes(&["Body"]);
        let mut model = OverlayModel::default();
        let id = model.add_text(0, 50.0, 50.0);
        model.update_text(id, TextPatch::text("one\ntwo"));

        let flat = flatten_document(&bytes, &model.snapshot()).unwrap();
        let page = PageRenderer::new().render(&flat, 0, 1.0).unwrap();
        let two = page.regions.iter().find(|r| r.text == "two").unwrap();
        let one = page.regions.iter().find(|r| r.text == "one").unwrap();
        assert!((two.y - one.y - 16.0 * LINE_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn test_rotated_page_counter_rotates_text() {
        let rotated = crate::mutator::rotate_page(&pdf_bytes(&["R"]), 0).unwrap();
        let mut model = OverlayModel::default();
        let id = model.add_text(0, 100.0, 200.0);
        model.update_text(
            id,
            TextPatch {
                font_size: Some(10.0),
                ..TextPatch::default()
            },
        );

        let flat = flatten_document(&rotated, &model.snapshot()).unwrap();
        let ops = last_content_ops(&flat, 0);
        let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
        // Baseline (100, 210) on the 792x612 view is (210, 100) in PDF space
        assert_eq!(floats(tm), vec![0.0, 1.0, -1.0, 0.0, 210.0, 100.0]);
    }

    #[test]
    fn test_opacity_and_color_use_graphics_state() {
        let bytes = pdf_bytes(&["Body"]);
        let mut model = OverlayModel::default();
        let id = model.add_text(0, 10.0, 10.0);
        model.update_text(
            id,
            TextPatch {
                opacity: Some(Opacity::new(0.5)),
                font_color: Some(FontColor { r: 255, g: 0, b: 0 }),
                ..TextPatch::default()
            },
        );

        let flat = flatten_document(&bytes, &model.snapshot()).unwrap();
        let ops = last_content_ops(&flat, 0);
        assert_eq!(ops[0].operator, "Q");
        let gs = ops.iter().find(|op| op.operator == "gs").unwrap();
        assert_eq!(gs.operands[0].as_name().unwrap(), b"PdfEditGS50");
        let rg = ops.iter().find(|op| op.operator == "rg").unwrap();
        assert_eq!(floats(rg), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_image_becomes_xobject_with_smask() {
        let bytes = pdf_bytes(&["Body"]);
        let decoded = decode_image(&png(4, 2, true)).unwrap();
        let mut model = OverlayModel::default();
        let id = model.add_image(0, 20.0, 30.0, decoded.data_url, decoded.aspect);
        model.update_image(id, ImagePatch::size(100.0, 50.0));

        let flat = flatten_document(&bytes, &model.snapshot()).unwrap();
        let doc = Document::load_mem(&flat).unwrap();
        let page = doc.get_dictionary(page_ids(&doc)[0]).unwrap();
        let xobjects = page
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"XObject")
            .unwrap()
            .as_dict()
            .unwrap();
        let image_id = xobjects
            .get(format!("PdfEditIm{}", id.0).as_bytes())
            .unwrap()
            .as_reference()
            .unwrap();
        let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert!(image.dict.get(b"SMask").is_ok());

        let ops = last_content_ops(&flat, 0);
        let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
        // Bottom-left of the box is y = 80 from the top, so 792 - 80 in PDF space
        assert_eq!(floats(cm), vec![100.0, 0.0, 0.0, 50.0, 20.0, 712.0]);
    }

    #[test]
    fn test_overlays_on_missing_pages_are_skipped() {
        let bytes = pdf_bytes(&["Only"]);
        let mut model = OverlayModel::default();
        model.add_text(4, 0.0, 0.0);

        let flat = flatten_document(&bytes, &model.snapshot()).unwrap();
        let page = PageRenderer::new().render(&flat, 0, 1.0).unwrap();
        assert_eq!(page.page_count, 1);
        assert_eq!(page.regions.len(), 1);
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(win_ansi("a€é—☃"), vec![b'a', 0x80, 0xE9, 0x97, b'?']);
    }
}
