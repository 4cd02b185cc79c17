use thiserror::Error;

/// The document (or one of its pages) could not be read.
///
/// Render state is cleared when one of these surfaces; overlays are kept.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Failed to fetch document from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("PDF has no pages")]
    NoPages,

    #[error("Encrypted PDFs are not supported")]
    Encrypted,

    #[error("Page is too large to display at this zoom ({width} x {height} px, limit {max_pixels} px)")]
    PageTooLarge {
        width: f64,
        height: f64,
        max_pixels: u64,
    },

    #[error("No document loaded")]
    NotLoaded,

    #[error("Failed to decode image: {0}")]
    Image(String),
}

/// A structural mutation was refused or failed; the authoritative buffer is unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralOperationError {
    #[error("Cannot delete the only page of a document")]
    LastPage,

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("Operation would leave the document without pages")]
    EmptyResult,

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Failed to save PDF: {0}")]
    Save(String),

    #[error("Another document operation is still in progress")]
    Busy,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config field {field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Structural(#[from] StructuralOperationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to flatten overlays: {0}")]
    Flatten(String),
}

impl EditorError {
    /// Message suitable for showing to the user in place of the page canvas.
    pub fn user_message(&self) -> String {
        match self {
            EditorError::Load(_) => format!("Could not display the document. {}", self),
            EditorError::Structural(StructuralOperationError::LastPage) => {
                "A document must keep at least one page.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
