//! Client-side PDF page editing
//!
//! Renders one page of a document at a time, keeps editable text and image
//! overlays on top of it in zoom-independent page space, and performs
//! whole-document structural edits (merge, delete, rotate, export a page)
//! that each produce a fresh byte buffer. Everything runs in memory on
//! top of lopdf.
//!
//! [`Editor`] ties the pieces together; each piece is usable on its own:
//! - [`render`]: page bitmap plus text geometry, with stale-render protection
//! - [`coords`]: page space to screen space and back
//! - [`overlay`] and [`interaction`]: the user's edits and the gestures that make them
//! - [`mutator`]: structural operations on the byte buffer
//! - [`flatten`]: burn overlays into the page content for saving

pub mod config;
pub mod coords;
pub mod editor;
pub mod error;
pub mod flatten;
pub mod geometry;
pub mod image_input;
pub mod info;
pub mod interaction;
pub mod modal;
pub mod mutator;
pub mod overlay;
pub mod render;
pub mod source;
pub mod style;
pub mod text;

pub use config::EditorConfig;
pub use coords::{CanvasOrigin, PageRect, Point, ViewTransform};
pub use editor::Editor;
pub use error::{ConfigError, EditorError, LoadError, StructuralOperationError};
pub use flatten::flatten_document;
pub use geometry::{PageGeometry, Rotation};
pub use image_input::{decode_image, DecodedImage};
pub use info::{document_info, quick_validate, DocumentInfo, PageInfo};
pub use interaction::{FocusTarget, GestureOutcome, InteractionController, InteractionState, Key};
pub use modal::{FileRef, ModalHost, ModalSize};
pub use mutator::{ExportedPage, MutationGate};
pub use overlay::{
    ImageId, ImageOverlay, ImagePatch, OverlayModel, OverlayRef, OverlaySnapshot, TextId,
    TextOverlay, TextPatch,
};
pub use render::{PageRenderer, Rasterizer, RenderGate, RenderJob, RenderState, RenderedPage};
pub use source::{AuthoritativeBuffer, DocumentSource, Fetcher, NoFetcher};
#[cfg(feature = "http")]
pub use source::HttpFetcher;
pub use style::{FontColor, FontFamily, Opacity};
pub use text::ExtractedTextRegion;
