//! The editor as a whole
//!
//! [`Editor`] wires the components together: the modal frame hands a
//! document source to the authoritative buffer, the renderer turns the
//! active page into a bitmap plus text regions, the overlay model and
//! interaction controller handle the user's edits, and structural
//! mutations replace the buffer and trigger a fresh render.
//!
//! Rendering can be driven two ways. [`Editor::render`] does everything
//! inline. Hosts that rasterize off the main loop call
//! [`Editor::begin_render`], run the returned [`RenderJob`] wherever they
//! like, and hand the outcome to [`Editor::commit_render`]; anything
//! started before the newest request is dropped at commit.

use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::config::EditorConfig;
use crate::coords::{CanvasOrigin, Point, ViewTransform};
use crate::error::{EditorError, LoadError};
use crate::flatten::flatten_document;
use crate::image_input::decode_image;
use crate::info::{document_info, DocumentInfo};
use crate::interaction::{FocusTarget, GestureOutcome, InteractionController, Key};
use crate::modal::{FileRef, ModalHost};
use crate::mutator::{self, ExportedPage, MutationGate};
use crate::overlay::{
    ImageId, ImagePatch, OverlayModel, OverlayRef, OverlaySnapshot, TextId, TextPatch,
};
use crate::render::{
    load_document, OutlineRasterizer, PageRenderer, Rasterizer, RenderGate, RenderJob,
    RenderOutcome, RenderState, RenderedPage,
};
use crate::source::{read_source, AuthoritativeBuffer, DocumentSource, Fetcher, NoFetcher};
use crate::text::region_at;

fn check_document(bytes: &[u8]) -> Result<(), LoadError> {
    load_document(bytes).map(|_| ())
}

pub struct Editor<F = NoFetcher, R = OutlineRasterizer> {
    config: EditorConfig,
    fetcher: F,
    renderer: PageRenderer<R>,
    buffer: AuthoritativeBuffer,
    page: usize,
    page_count: usize,
    zoom: f64,
    origin: CanvasOrigin,
    render_gate: RenderGate,
    render_state: RenderState,
    mutations: MutationGate,
    overlays: OverlayModel,
    interaction: InteractionController,
    modal: ModalHost,
}

impl Editor<NoFetcher, OutlineRasterizer> {
    /// Editor for in-memory and local sources only.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_parts(config, NoFetcher, PageRenderer::new())
    }
}

#[cfg(feature = "http")]
impl Editor<crate::source::HttpFetcher, OutlineRasterizer> {
    pub fn with_http(config: EditorConfig) -> Self {
        Self::with_parts(config, crate::source::HttpFetcher::new(), PageRenderer::new())
    }
}

impl Default for Editor<NoFetcher, OutlineRasterizer> {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl<F: Fetcher, R: Rasterizer> Editor<F, R> {
    /// Assemble an editor from its parts.
    ///
    /// A config that fails [`EditorConfig::validate`] is replaced by the
    /// defaults; every clamp downstream assumes ordered, finite bounds.
    pub fn with_parts(config: EditorConfig, fetcher: F, renderer: PageRenderer<R>) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "invalid editor config, using defaults");
                EditorConfig::default()
            }
        };
        let renderer = renderer.with_max_canvas_pixels(config.max_canvas_pixels);
        Self {
            zoom: config.default_zoom,
            overlays: OverlayModel::new(config.clone()),
            interaction: InteractionController::new(config.min_image_width),
            modal: ModalHost::new(&config),
            config,
            fetcher,
            renderer,
            buffer: AuthoritativeBuffer::new(),
            page: 0,
            page_count: 0,
            origin: CanvasOrigin::ZERO,
            render_gate: RenderGate::default(),
            render_state: RenderState::Empty,
            mutations: MutationGate::default(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ---- document lifecycle ----

    /// Open the editor frame for `source` and show its first page.
    pub async fn open(&mut self, source: DocumentSource) -> Result<&RenderedPage, EditorError> {
        self.modal.open(FileRef::new(source.clone()));
        self.load(source).await
    }

    /// [`open`](Self::open) for in-memory and local file sources.
    pub fn open_local(&mut self, source: DocumentSource) -> Result<&RenderedPage, EditorError> {
        self.modal.open(FileRef::new(source.clone()));
        self.load_local(source)
    }

    /// Close the frame. The document and overlays stay until the next load.
    pub fn close(&mut self) -> Option<FileRef> {
        self.interaction.reset(&mut self.overlays);
        self.modal.close()
    }

    /// Make `source` the authoritative document and render its first page.
    ///
    /// Bytes are fetched only when the source identity changed. A source
    /// that fails to load clears the render state and keeps every overlay.
    pub async fn load(&mut self, source: DocumentSource) -> Result<&RenderedPage, EditorError> {
        info!(source = %source.display_name(), "loading document");
        let resolved = self
            .buffer
            .resolve_with(&source, &self.fetcher, check_document)
            .await;
        self.after_load(resolved)
    }

    /// [`load`](Self::load) without a fetch; URL sources are refused.
    pub fn load_local(&mut self, source: DocumentSource) -> Result<&RenderedPage, EditorError> {
        info!(source = %source.display_name(), "loading document");
        let resolved = self.buffer.resolve_local_with(&source, check_document);
        self.after_load(resolved)
    }

    fn after_load(
        &mut self,
        resolved: Result<Arc<[u8]>, LoadError>,
    ) -> Result<&RenderedPage, EditorError> {
        if let Err(e) = resolved {
            self.fail_render(e.clone());
            return Err(e.into());
        }
        self.page = 0;
        self.zoom = self.config.default_zoom;
        self.interaction.reset(&mut self.overlays);
        self.render()
    }

    /// Current authoritative bytes, structural edits included.
    pub fn bytes(&self) -> Result<Arc<[u8]>, LoadError> {
        self.buffer.current()
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_loaded()
    }

    pub fn document_info(&self) -> Result<DocumentInfo, EditorError> {
        Ok(document_info(&self.buffer.current()?)?)
    }

    // ---- rendering ----

    /// Request a render of the active page at the current zoom.
    pub fn begin_render(&mut self) -> Result<RenderJob, LoadError> {
        let bytes = self.buffer.current()?;
        let generation = self.render_gate.begin();
        debug!(generation, page = self.page, zoom = self.zoom, "render requested");
        Ok(RenderJob {
            bytes,
            page: self.page,
            zoom: self.zoom,
            generation,
        })
    }

    /// Apply a finished render. Returns `false` if a newer request superseded it.
    pub fn commit_render(&mut self, outcome: RenderOutcome) -> bool {
        if !self.render_state.commit(&self.render_gate, outcome) {
            return false;
        }
        match &self.render_state {
            RenderState::Ready(rendered) => {
                self.page_count = rendered.page_count;
                self.origin = CanvasOrigin::centered(
                    self.modal.content_size(),
                    rendered.bitmap.dimensions(),
                );
                self.overlays.replace_regions(rendered.regions.clone());
            }
            _ => self.overlays.clear_regions(),
        }
        true
    }

    /// Render the active page inline and commit it.
    pub fn render(&mut self) -> Result<&RenderedPage, EditorError> {
        let job = match self.begin_render() {
            Ok(job) => job,
            Err(e) => {
                self.fail_render(e.clone());
                return Err(e.into());
            }
        };
        let outcome = job.run(&self.renderer);
        self.commit_render(outcome);
        match &self.render_state {
            RenderState::Ready(rendered) => Ok(rendered),
            RenderState::Failed(e) => Err(e.clone().into()),
            RenderState::Empty => Err(LoadError::NotLoaded.into()),
        }
    }

    fn fail_render(&mut self, error: LoadError) {
        warn!(error = %error, "document unavailable");
        self.render_gate.invalidate();
        self.render_state = RenderState::Failed(error);
        self.overlays.clear_regions();
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    pub fn rendered(&self) -> Option<&RenderedPage> {
        self.render_state.page()
    }

    /// Projection for the bitmap currently shown.
    pub fn view(&self) -> ViewTransform {
        ViewTransform::new(self.zoom, self.origin)
    }

    // ---- navigation and zoom ----

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Move to `index`, clamped to the document. Returns the page shown.
    pub fn go_to_page(&mut self, index: usize) -> Result<usize, EditorError> {
        let target = index.min(self.page_count.saturating_sub(1));
        if target != self.page {
            debug!(from = self.page, to = target, "changing page");
            self.interaction.reset(&mut self.overlays);
            self.page = target;
        }
        self.render()?;
        Ok(self.page)
    }

    pub fn next_page(&mut self) -> Result<usize, EditorError> {
        self.go_to_page(self.page + 1)
    }

    pub fn prev_page(&mut self) -> Result<usize, EditorError> {
        self.go_to_page(self.page.saturating_sub(1))
    }

    /// Set the zoom, clamped to the configured range, and re-render.
    /// Stored overlay coordinates are untouched.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<f64, EditorError> {
        let zoom = self.config.clamp_zoom(zoom);
        if zoom != self.zoom {
            debug!(from = self.zoom, to = zoom, "zoom changed");
            self.zoom = zoom;
        }
        self.render()?;
        Ok(self.zoom)
    }

    pub fn zoom_in(&mut self) -> Result<f64, EditorError> {
        self.set_zoom(self.zoom + self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> Result<f64, EditorError> {
        self.set_zoom(self.zoom - self.config.zoom_step)
    }

    pub fn reset_zoom(&mut self) -> Result<f64, EditorError> {
        self.set_zoom(self.config.default_zoom)
    }

    // ---- structural mutations ----

    /// Run `op` on the current bytes under the mutation gate and install
    /// its output. Nothing changes unless `op` succeeds.
    fn mutate<Op>(&mut self, name: &str, op: Op) -> Result<Arc<[u8]>, EditorError>
    where
        Op: FnOnce(&[u8]) -> Result<Vec<u8>, crate::error::StructuralOperationError>,
    {
        let _permit = self.mutations.try_begin()?;
        let current = self.buffer.current()?;
        info!(operation = name, "mutating document");
        let next = op(&current).inspect_err(|e| warn!(operation = name, error = %e, "mutation refused"))?;
        let installed = self.buffer.replace(next);
        self.render_gate.invalidate();
        Ok(installed)
    }

    /// Append every page of `other` and show the first page.
    pub fn merge(&mut self, other: &[u8]) -> Result<usize, EditorError> {
        let merged = self.mutate("merge", |current| mutator::merge(current, other))?;
        self.page_count = mutator::page_count(&merged)?;
        self.page = 0;
        self.interaction.reset(&mut self.overlays);
        self.render()?;
        Ok(self.page_count)
    }

    /// Like [`merge`](Self::merge), reading the other document from `source`.
    pub async fn merge_source(&mut self, source: &DocumentSource) -> Result<usize, EditorError> {
        let other = {
            // Held across the fetch so no other mutation starts meanwhile.
            let _permit = self.mutations.try_begin()?;
            read_source(source, &self.fetcher).await?
        };
        self.merge(&other)
    }

    /// Remove the page at `index`. Refused for a one-page document.
    pub fn delete_page(&mut self, index: usize) -> Result<usize, EditorError> {
        let remaining = self.mutate("delete_page", |current| mutator::delete_page(current, index))?;
        self.page_count = mutator::page_count(&remaining)?;
        if self.page >= self.page_count {
            self.interaction.reset(&mut self.overlays);
            self.page = self.page_count - 1;
        }
        self.render()?;
        Ok(self.page_count)
    }

    /// Turn the page at `index` a quarter clockwise.
    pub fn rotate_page(&mut self, index: usize) -> Result<(), EditorError> {
        self.mutate("rotate_page", |current| mutator::rotate_page(current, index))?;
        self.render()?;
        Ok(())
    }

    /// Copy the page at `index` into a standalone document. The current
    /// document is left as it is.
    pub fn export_page(&self, index: usize) -> Result<ExportedPage, EditorError> {
        let current = self.buffer.current()?;
        Ok(mutator::export_page(
            &current,
            index,
            &self.config.export_extension,
        )?)
    }

    pub fn is_mutating(&self) -> bool {
        self.mutations.is_busy()
    }

    /// The current document with every overlay drawn into its pages.
    pub fn flatten(&self) -> Result<Vec<u8>, EditorError> {
        let current = self.buffer.current()?;
        flatten_document(&current, &self.overlays.snapshot())
    }

    // ---- overlays and gestures ----

    pub fn overlays(&self) -> &OverlayModel {
        &self.overlays
    }

    // Crate-only: editing focus is shared with the interaction controller,
    // so outside callers go through the methods below.
    pub(crate) fn overlays_mut(&mut self) -> &mut OverlayModel {
        &mut self.overlays
    }

    /// Replace every overlay with `snapshot`, ending any gesture or edit.
    pub fn restore_overlays(&mut self, snapshot: OverlaySnapshot) {
        self.interaction.reset(&mut self.overlays);
        self.overlays.restore(snapshot);
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn modal(&self) -> &ModalHost {
        &self.modal
    }

    pub fn modal_mut(&mut self) -> &mut ModalHost {
        &mut self.modal
    }

    /// Place an image from raw bytes at a screen point on the active page.
    pub fn add_image(&mut self, bytes: &[u8], at: Point) -> Result<ImageId, EditorError> {
        let decoded = decode_image(bytes)?;
        let p = self.view().screen_to_page(at);
        Ok(self
            .overlays
            .add_image(self.page, p.x, p.y, decoded.data_url, decoded.aspect))
    }

    /// A click on the empty catcher layer adds a text box there.
    /// Ignored while no page is shown.
    pub fn click_empty(&mut self, pointer: Point) -> GestureOutcome {
        if self.rendered().is_none() {
            trace!("click with no page shown");
            return GestureOutcome::Ignored;
        }
        let view = self.view();
        self.interaction
            .click_catcher(&mut self.overlays, self.page, pointer, view)
    }

    /// A click on existing page text copies it into an editable overlay.
    /// Falls through to [`click_empty`](Self::click_empty) when no region is hit.
    pub fn click_text(&mut self, pointer: Point) -> GestureOutcome {
        let view = self.view();
        let hit = region_at(self.render_state.regions(), view.screen_to_page(pointer)).cloned();
        match hit {
            Some(region) => self.interaction.promote(&mut self.overlays, &region),
            None => self.click_empty(pointer),
        }
    }

    pub fn pointer_down_text(&mut self, id: TextId, pointer: Point) -> GestureOutcome {
        let view = self.view();
        self.interaction
            .pointer_down_text(&mut self.overlays, id, pointer, view)
    }

    pub fn pointer_down_image(&mut self, id: ImageId, pointer: Point) -> GestureOutcome {
        let view = self.view();
        self.interaction
            .pointer_down_image(&mut self.overlays, id, pointer, view)
    }

    pub fn pointer_down_resize(&mut self, id: ImageId) -> GestureOutcome {
        self.interaction.pointer_down_resize(&mut self.overlays, id)
    }

    pub fn pointer_move(&mut self, pointer: Point) -> GestureOutcome {
        let view = self.view();
        self.interaction.pointer_move(&mut self.overlays, pointer, view)
    }

    pub fn pointer_up(&mut self, pointer: Point) -> GestureOutcome {
        let view = self.view();
        self.interaction.pointer_up(&mut self.overlays, pointer, view)
    }

    pub fn begin_edit(&mut self, id: TextId) -> GestureOutcome {
        self.interaction.begin_edit(&mut self.overlays, id)
    }

    pub fn type_text(&mut self, text: &str) -> GestureOutcome {
        self.interaction.type_text(&mut self.overlays, text)
    }

    pub fn key(&mut self, key: Key, focus: FocusTarget) -> GestureOutcome {
        self.interaction.key(&mut self.overlays, key, focus)
    }

    pub fn blur(&mut self, to: FocusTarget) -> GestureOutcome {
        self.interaction.blur(&mut self.overlays, to)
    }

    pub fn update_text(&mut self, id: TextId, patch: TextPatch) -> bool {
        self.overlays.update_text(id, patch)
    }

    pub fn update_image(&mut self, id: ImageId, patch: ImagePatch) -> bool {
        self.overlays.update_image(id, patch)
    }

    pub fn remove_overlay(&mut self, target: OverlayRef) -> GestureOutcome {
        self.interaction.delete(&mut self.overlays, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructuralOperationError;
    use crate::geometry::Rotation;
    use crate::interaction::InteractionState;
    use crate::render::fixtures::{pdf_bytes, sized_pdf};
    use pretty_assertions::assert_eq;

    fn source(texts: &[&str]) -> DocumentSource {
        DocumentSource::bytes("fixture.pdf", pdf_bytes(texts))
    }

    async fn loaded(texts: &[&str]) -> Editor {
        let mut editor = Editor::new(EditorConfig::default());
        editor.load(source(texts)).await.unwrap();
        editor
    }

    #[tokio::test]
    async fn test_load_renders_first_page() {
        let editor = loaded(&["one", "two"]).await;
        let rendered = editor.rendered().unwrap();
        assert_eq!(rendered.page, 0);
        assert_eq!(editor.page_count(), 2);
        assert_eq!(rendered.bitmap.dimensions(), (612, 792));
        assert_eq!(editor.overlays().regions_on_page(0).count(), 1);
    }

    #[tokio::test]
    async fn test_bad_bytes_keep_previous_document() {
        let mut editor = loaded(&["one"]).await;
        let before = editor.bytes().unwrap();
        editor.overlays_mut().add_text(0, 10.0, 10.0);

        let result = editor
            .load(DocumentSource::bytes("broken.pdf", b"not a pdf".to_vec()))
            .await;

        assert!(matches!(result, Err(EditorError::Load(LoadError::Parse(_)))));
        assert_eq!(editor.bytes().unwrap(), before);
        assert!(editor.rendered().is_none());
        assert_eq!(editor.overlays().regions_on_page(0).count(), 0);
        assert_eq!(editor.overlays().texts().len(), 1);
    }

    #[test]
    fn test_render_before_load_fails() {
        let mut editor = Editor::new(EditorConfig::default());
        assert!(matches!(
            editor.render(),
            Err(EditorError::Load(LoadError::NotLoaded))
        ));
    }

    #[test]
    fn test_local_load_refuses_urls() {
        let mut editor = Editor::new(EditorConfig::default());
        let result = editor.load_local(DocumentSource::Url("https://example.com/a.pdf".into()));
        assert!(matches!(result, Err(EditorError::Load(LoadError::Fetch { .. }))));
        assert!(editor.open_local(source(&["a"])).is_ok());
        assert_eq!(editor.page_count(), 1);
    }

    #[tokio::test]
    async fn test_navigation_is_clamped() {
        let mut editor = loaded(&["a", "b", "c"]).await;
        assert_eq!(editor.prev_page().unwrap(), 0);
        assert_eq!(editor.next_page().unwrap(), 1);
        assert_eq!(editor.go_to_page(99).unwrap(), 2);
        assert_eq!(editor.next_page().unwrap(), 2);
        assert_eq!(editor.rendered().unwrap().regions[0].text, "c");
    }

    #[tokio::test]
    async fn test_zoom_is_clamped_and_keeps_overlays() {
        let mut editor = loaded(&["a"]).await;
        let id = editor.overlays_mut().add_text(0, 50.0, 60.0);

        assert_eq!(editor.set_zoom(10.0).unwrap(), 3.0);
        assert_eq!(editor.zoom_in().unwrap(), 3.0);
        assert_eq!(editor.zoom_out().unwrap(), 2.75);
        assert_eq!(editor.set_zoom(0.0).unwrap(), 0.5);
        assert_eq!(editor.reset_zoom().unwrap(), 1.0);

        let text = editor.overlays().text(id).unwrap();
        assert_eq!((text.x, text.y), (50.0, 60.0));
    }

    #[tokio::test]
    async fn test_stale_render_is_not_committed() {
        let mut editor = loaded(&["a", "b"]).await;
        let stale = editor.begin_render().unwrap();
        editor.go_to_page(1).unwrap();

        let outcome = stale.run(&PageRenderer::new());
        assert!(!editor.commit_render(outcome));
        assert_eq!(editor.rendered().unwrap().page, 1);
    }

    #[tokio::test]
    async fn test_delete_last_page_refused() {
        let mut editor = loaded(&["only"]).await;
        let before = editor.bytes().unwrap();
        assert!(matches!(
            editor.delete_page(0),
            Err(EditorError::Structural(StructuralOperationError::LastPage))
        ));
        assert_eq!(editor.bytes().unwrap(), before);
        assert_eq!(editor.page_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_shown_last_page_moves_back() {
        let mut editor = loaded(&["a", "b"]).await;
        editor.go_to_page(1).unwrap();
        assert_eq!(editor.delete_page(1).unwrap(), 1);
        assert_eq!(editor.page(), 0);
        assert_eq!(editor.rendered().unwrap().regions[0].text, "a");
    }

    #[tokio::test]
    async fn test_merge_resets_to_first_page() {
        let mut editor = loaded(&["a", "b"]).await;
        editor.go_to_page(1).unwrap();
        assert_eq!(editor.merge(&pdf_bytes(&["c"])).unwrap(), 3);
        assert_eq!(editor.page(), 0);
        editor.go_to_page(2).unwrap();
        assert_eq!(editor.rendered().unwrap().regions[0].text, "c");
    }

    #[tokio::test]
    async fn test_merge_from_source() {
        let mut editor = loaded(&["a"]).await;
        let count = editor.merge_source(&source(&["b", "c"])).await.unwrap();
        assert_eq!(count, 3);
        assert!(!editor.is_mutating());
    }

    #[tokio::test]
    async fn test_four_rotations_restore_page() {
        let mut editor = loaded(&["a"]).await;
        editor.rotate_page(0).unwrap();
        assert_eq!(
            editor.rendered().unwrap().geometry.rotation,
            Rotation::Quarter
        );
        assert_eq!(editor.rendered().unwrap().bitmap.dimensions(), (792, 612));
        for _ in 0..3 {
            editor.rotate_page(0).unwrap();
        }
        assert_eq!(editor.rendered().unwrap().geometry.rotation, Rotation::None);
    }

    #[tokio::test]
    async fn test_export_leaves_document_alone() {
        let mut editor = loaded(&["a", "b"]).await;
        let before = editor.bytes().unwrap();
        let exported = editor.export_page(1).unwrap();
        assert_eq!(exported.file_name, "split_page_2.pdf");
        assert_eq!(mutator::page_count(&exported.bytes).unwrap(), 1);
        assert_eq!(editor.bytes().unwrap(), before);
        assert_eq!(editor.page_count(), 2);
    }

    #[tokio::test]
    async fn test_click_text_promotes_region() {
        let mut editor = loaded(&["Hello"]).await;
        let region = editor.rendered().unwrap().regions[0].clone();
        let inside = editor
            .view()
            .page_to_screen(Point::new(region.x + 1.0, region.y + 1.0));

        let first = editor.click_text(inside);
        editor.key(Key::Escape, FocusTarget::Elsewhere);
        let second = editor.click_text(inside);

        assert!(matches!(first, GestureOutcome::Editing(_)));
        assert!(matches!(second, GestureOutcome::Editing(_)));
        assert_eq!(editor.overlays().texts().len(), 2);
        assert_eq!(editor.overlays().regions_on_page(0).count(), 1);
    }

    #[tokio::test]
    async fn test_page_change_ends_editing() {
        let mut editor = loaded(&["a", "b"]).await;
        editor.click_empty(Point::new(100.0, 100.0));
        assert!(matches!(
            editor.interaction().state(),
            InteractionState::EditingText(_)
        ));
        editor.next_page().unwrap();
        assert_eq!(editor.interaction().state(), InteractionState::Idle);
        assert_eq!(editor.overlays().editing_id(), None);
    }

    #[test]
    fn test_click_before_load_is_ignored() {
        let mut editor = Editor::new(EditorConfig::default());
        assert_eq!(editor.click_empty(Point::new(10.0, 10.0)), GestureOutcome::Ignored);
        assert_eq!(editor.click_text(Point::new(10.0, 10.0)), GestureOutcome::Ignored);
        assert!(editor.overlays().texts().is_empty());
    }

    #[tokio::test]
    async fn test_restore_overlays_ends_editing() {
        let mut editor = loaded(&["a"]).await;
        let GestureOutcome::Editing(id) = editor.click_empty(Point::new(300.0, 300.0)) else {
            panic!("expected a new text box");
        };
        let snapshot = editor.overlays().snapshot();

        editor.restore_overlays(snapshot);

        assert_eq!(editor.interaction().editing(), None);
        assert_eq!(editor.overlays().editing_id(), None);
        assert_eq!(editor.type_text("typed after restore"), GestureOutcome::Ignored);
        assert_eq!(editor.overlays().text(id).unwrap().text, "New text");
        assert!(matches!(editor.begin_edit(id), GestureOutcome::Editing(_)));
    }

    #[tokio::test]
    async fn test_non_finite_config_falls_back_to_defaults() {
        let mut editor = Editor::new(EditorConfig {
            max_zoom: f64::NAN,
            max_font_size: f64::NAN,
            ..EditorConfig::default()
        });
        assert_eq!(editor.config(), &EditorConfig::default());

        editor.load(source(&["a"])).await.unwrap();
        assert_eq!(editor.set_zoom(2.0).unwrap(), 2.0);
        let id = editor.overlays_mut().add_text(0, 10.0, 10.0);
        assert!(editor.update_text(
            id,
            TextPatch {
                font_size: Some(12.0),
                ..TextPatch::default()
            }
        ));
        assert_eq!(editor.overlays().text(id).unwrap().font_size, 12.0);
    }

    #[tokio::test]
    async fn test_inverted_config_bounds_fall_back_to_defaults() {
        let mut editor = Editor::new(EditorConfig {
            min_zoom: 2.0,
            max_zoom: 1.0,
            ..EditorConfig::default()
        });
        assert_eq!(editor.config().max_zoom, 3.0);
        editor.load(source(&["a"])).await.unwrap();
        assert_eq!(editor.set_zoom(10.0).unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_oversized_page_fails_to_render() {
        let mut editor = Editor::new(EditorConfig::default());
        let result = editor
            .load(DocumentSource::bytes(
                "poster.pdf",
                sized_pdf(2_000_000_000, 2_000_000_000),
            ))
            .await;

        assert!(matches!(
            result,
            Err(EditorError::Load(LoadError::PageTooLarge { .. }))
        ));
        assert!(editor.rendered().is_none());
        assert!(matches!(
            editor.render_state().error(),
            Some(LoadError::PageTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_zoom_past_canvas_limit_fails_cleanly() {
        let mut editor = Editor::new(EditorConfig {
            max_canvas_pixels: 1_000_000,
            ..EditorConfig::default()
        });
        editor.load(source(&["a"])).await.unwrap();

        assert!(matches!(
            editor.set_zoom(2.0),
            Err(EditorError::Load(LoadError::PageTooLarge { .. }))
        ));
        assert!(editor.overlays().regions_on_page(0).next().is_none());
        assert_eq!(editor.set_zoom(1.0).unwrap(), 1.0);
        assert_eq!(editor.rendered().unwrap().bitmap.dimensions(), (612, 792));
    }

    #[tokio::test]
    async fn test_open_centers_page_in_frame() {
        let mut editor = Editor::new(EditorConfig::default());
        editor.open(source(&["a"])).await.unwrap();
        assert!(editor.modal().is_open());
        // 900x700 frame, 612x792 page at zoom 1
        assert_eq!(editor.view().origin, CanvasOrigin { x: 144.0, y: 0.0 });
    }
}
