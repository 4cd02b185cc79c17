//! Editor configuration
//!
//! Every field has a default, so hosts only override what they need. The
//! config can be loaded from TOML (desktop/CLI hosts) or JSON (the browser
//! host passes it across the wasm boundary as a string).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::style::{FontColor, FontFamily};

pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 4096 * 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom applied on load and by `reset_zoom`
    pub default_zoom: f64,
    /// Increment used by `zoom_in` / `zoom_out`
    pub zoom_step: f64,

    pub default_font_size: f64,
    pub min_font_size: f64,
    pub max_font_size: f64,
    /// Placeholder content of a freshly added text box
    pub default_text: String,
    pub default_font_family: FontFamily,
    pub default_color: FontColor,

    /// Width of a newly placed image overlay, in page units
    pub default_image_width: f64,
    /// Smallest width the resize gesture may produce
    pub min_image_width: f64,

    pub modal_min_width: f64,
    pub modal_min_height: f64,
    pub modal_default_width: f64,
    pub modal_default_height: f64,

    /// Extension of exported single-page artifacts
    pub export_extension: String,

    /// Largest bitmap (width × height) a render may allocate. The default
    /// is the smallest canvas area browsers accept (iOS Safari, 4096²).
    pub max_canvas_pixels: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 3.0,
            default_zoom: 1.0,
            zoom_step: 0.25,
            default_font_size: 16.0,
            min_font_size: 6.0,
            max_font_size: 96.0,
            default_text: "New text".to_string(),
            default_font_family: FontFamily::Helvetica,
            default_color: FontColor::BLACK,
            default_image_width: 150.0,
            min_image_width: 20.0,
            modal_min_width: 400.0,
            modal_min_height: 300.0,
            modal_default_width: 900.0,
            modal_default_height: 700.0,
            export_extension: "pdf".to_string(),
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

impl EditorConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// [`EditorConfig::validate`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        content.parse()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn numeric_fields(&self) -> [(&'static str, f64); 13] {
        [
            ("min_zoom", self.min_zoom),
            ("max_zoom", self.max_zoom),
            ("default_zoom", self.default_zoom),
            ("zoom_step", self.zoom_step),
            ("default_font_size", self.default_font_size),
            ("min_font_size", self.min_font_size),
            ("max_font_size", self.max_font_size),
            ("default_image_width", self.default_image_width),
            ("min_image_width", self.min_image_width),
            ("modal_min_width", self.modal_min_width),
            ("modal_min_height", self.modal_min_height),
            ("modal_default_width", self.modal_default_width),
            ("modal_default_height", self.modal_default_height),
        ]
    }

    /// Check every bound the editor relies on. Non-finite numbers are
    /// refused before any range check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((field, value)) = self
            .numeric_fields()
            .into_iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(ConfigError::NotFinite { field, value });
        }
        if self.min_zoom <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "min_zoom must be positive, got {}",
                self.min_zoom
            )));
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "min_zoom {} > max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.default_zoom < self.min_zoom || self.default_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "default_zoom {} outside [{}, {}]",
                self.default_zoom, self.min_zoom, self.max_zoom
            )));
        }
        if self.zoom_step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "zoom_step must be positive, got {}",
                self.zoom_step
            )));
        }
        if self.min_font_size <= 0.0 || self.min_font_size > self.max_font_size {
            return Err(ConfigError::Invalid(format!(
                "font size range [{}, {}] is empty",
                self.min_font_size, self.max_font_size
            )));
        }
        if self.default_font_size < self.min_font_size
            || self.default_font_size > self.max_font_size
        {
            return Err(ConfigError::Invalid(format!(
                "default_font_size {} outside [{}, {}]",
                self.default_font_size, self.min_font_size, self.max_font_size
            )));
        }
        if self.min_image_width <= 0.0 || self.default_image_width < self.min_image_width {
            return Err(ConfigError::Invalid(format!(
                "default_image_width {} below min_image_width {}",
                self.default_image_width, self.min_image_width
            )));
        }
        if self.export_extension.is_empty() || self.export_extension.contains(['/', '.']) {
            return Err(ConfigError::Invalid(format!(
                "export_extension {:?} is not a bare extension",
                self.export_extension
            )));
        }
        if self.max_canvas_pixels == 0 {
            return Err(ConfigError::Invalid(
                "max_canvas_pixels must be positive".to_string(),
            ));
        }
        Ok(())
    }

    // Must not panic on an unvalidated config, hence no `f64::clamp`.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.default_zoom;
        }
        zoom.max(self.min_zoom).min(self.max_zoom)
    }

    pub fn clamp_font_size(&self, size: f64) -> f64 {
        if size.is_nan() {
            return self.default_font_size;
        }
        size.max(self.min_font_size).min(self.max_font_size)
    }
}

impl FromStr for EditorConfig {
    type Err = ConfigError;

    /// Parse configuration from a TOML string
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: EditorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
