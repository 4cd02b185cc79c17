//! End-to-end editor flow: load, render, edit, mutate, flatten.

use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;

use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdfedit_core::{
    DocumentSource, Editor, EditorConfig, EditorError, Fetcher, FocusTarget, GestureOutcome, Key,
    LoadError, PageRenderer, Point, StructuralOperationError,
};
use pretty_assertions::assert_eq;

// ============================================================
// Fixtures
// ============================================================

fn letter_pdf(texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let mut kids = Vec::new();
    for text in texts {
        let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Serves one document for one URL and counts requests.
struct FakeFetcher {
    url: &'static str,
    bytes: Vec<u8>,
    calls: Rc<Cell<usize>>,
}

impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        self.calls.set(self.calls.get() + 1);
        if url == self.url {
            Ok(self.bytes.clone())
        } else {
            Err(LoadError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
        }
    }
}

// ============================================================
// Flow
// ============================================================

#[tokio::test]
async fn test_edit_and_save_round_trip() {
    init_tracing();
    let mut editor = Editor::new(EditorConfig::default());
    editor
        .open(DocumentSource::bytes("resume.pdf", letter_pdf(&["Header", "Body"])))
        .await
        .unwrap();
    assert_eq!(editor.page_count(), 2);

    // Frame is 900 wide, page 612: bitmap starts at x = 144.
    let view = editor.view();
    let at = |x: f64, y: f64| view.page_to_screen(Point::new(x, y));

    let GestureOutcome::Editing(id) = editor.click_empty(at(100.0, 100.0)) else {
        panic!("click on empty canvas should start editing");
    };
    editor.type_text("Signed");
    editor.key(Key::Escape, FocusTarget::Elsewhere);

    editor.pointer_down_text(id, at(100.0, 100.0));
    editor.pointer_move(at(120.0, 130.0));
    editor.pointer_up(at(150.0, 150.0));

    let image = editor.add_image(&png(8, 4), at(300.0, 400.0)).unwrap();
    editor.pointer_down_resize(image);
    editor.pointer_up(at(500.0, 0.0));
    let placed = editor.overlays().image(image).unwrap();
    assert_eq!((placed.width, placed.height), (200.0, 100.0));

    // Zoom changes the projection only.
    editor.zoom_in().unwrap();
    let text = editor.overlays().text(id).unwrap();
    assert_eq!((text.x, text.y), (150.0, 150.0));
    assert_eq!(text.text, "Signed");

    let saved = editor.flatten().unwrap();
    let page = PageRenderer::new().render(&saved, 0, 1.0).unwrap();
    let signed = page
        .regions
        .iter()
        .find(|r| r.text == "Signed")
        .expect("flattened text should be extractable");
    assert!((signed.x - 150.0).abs() < 1e-3);
    assert!((signed.y - 150.0).abs() < 1e-3);
    assert_eq!(page.page_count, 2);
}

#[tokio::test]
async fn test_structural_edits_keep_overlays_on_their_page() {
    init_tracing();
    let mut editor = Editor::new(EditorConfig::default());
    editor
        .load(DocumentSource::bytes("a.pdf", letter_pdf(&["one", "two"])))
        .await
        .unwrap();
    editor.go_to_page(1).unwrap();
    assert!(matches!(
        editor.click_empty(Point::new(200.0, 60.0)),
        GestureOutcome::Editing(_)
    ));
    editor.key(Key::Escape, FocusTarget::Elsewhere);

    editor.delete_page(0).unwrap();
    assert_eq!(editor.page_count(), 1);
    assert_eq!(editor.page(), 0);

    // Page 1 no longer exists: its overlay is kept but not drawn.
    assert_eq!(editor.overlays().texts().len(), 1);
    assert_eq!(editor.overlays().texts_on_page(0).count(), 0);
    let saved = editor.flatten().unwrap();
    let page = PageRenderer::new().render(&saved, 0, 1.0).unwrap();
    assert_eq!(page.regions.len(), 1);
    assert_eq!(page.regions[0].text, "two");

    assert!(matches!(
        editor.delete_page(0),
        Err(EditorError::Structural(StructuralOperationError::LastPage))
    ));

    editor.merge(&letter_pdf(&["three"])).unwrap();
    assert_eq!(editor.page_count(), 2);
    assert_eq!(editor.overlays().texts_on_page(1).count(), 1);

    let exported = editor.export_page(1).unwrap();
    assert_eq!(exported.file_name, "split_page_2.pdf");
    let single = PageRenderer::new().render(&exported.bytes, 0, 1.0).unwrap();
    assert_eq!(single.page_count, 1);
    assert_eq!(single.regions[0].text, "three");
}

#[tokio::test]
async fn test_remote_source_is_fetched_once() {
    init_tracing();
    let calls = Rc::new(Cell::new(0));
    let fetcher = FakeFetcher {
        url: "https://files.example/cv.pdf",
        bytes: letter_pdf(&["remote"]),
        calls: Rc::clone(&calls),
    };
    let mut editor = Editor::with_parts(EditorConfig::default(), fetcher, PageRenderer::new());
    let source = DocumentSource::Url("https://files.example/cv.pdf".to_string());

    editor.load(source.clone()).await.unwrap();
    editor.load(source).await.unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(editor.rendered().unwrap().regions[0].text, "remote");

    let missing = editor
        .load(DocumentSource::Url("https://files.example/gone.pdf".to_string()))
        .await;
    assert!(matches!(
        missing,
        Err(EditorError::Load(LoadError::Fetch { .. }))
    ));
    assert_eq!(calls.get(), 2);
    assert!(editor.rendered().is_none());
    assert!(editor.is_loaded());
}
