//! Font controls for text overlays
//!
//! Font families are a closed set mapped to the PDF standard 14 fonts, so
//! every value the editor can hold is renderable both on screen and when
//! flattened into the saved document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl FontFamily {
    pub const ALL: [FontFamily; 3] = [
        FontFamily::Helvetica,
        FontFamily::TimesRoman,
        FontFamily::Courier,
    ];

    /// Name shown in the font picker and used as the CSS family.
    pub fn label(self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::TimesRoman => "Times New Roman",
            FontFamily::Courier => "Courier",
        }
    }

    pub fn css_family(self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica, Arial, sans-serif",
            FontFamily::TimesRoman => "\"Times New Roman\", Times, serif",
            FontFamily::Courier => "\"Courier New\", Courier, monospace",
        }
    }

    /// PDF standard 14 `BaseFont` name.
    pub fn pdf_base_font(self) -> &'static str {
        match self {
            FontFamily::Helvetica => "Helvetica",
            FontFamily::TimesRoman => "Times-Roman",
            FontFamily::Courier => "Courier",
        }
    }

    /// Best match for a font name found in a PDF (e.g. "BCDEEE+ArialMT").
    pub fn from_pdf_font_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            FontFamily::TimesRoman
        } else if lower.contains("courier") || lower.contains("mono") || lower.contains("consolas")
        {
            FontFamily::Courier
        } else {
            FontFamily::Helvetica
        }
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FontFamily {
    type Err = String;

    /// Accepts picker labels and PDF base font names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FontFamily::ALL
            .into_iter()
            .find(|family| {
                family.label().eq_ignore_ascii_case(wanted)
                    || family.pdf_base_font().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("Unknown font family: {}", s))
    }
}

/// 24-bit RGB color, serialised as `#RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FontColor {
    pub const BLACK: FontColor = FontColor { r: 0, g: 0, b: 0 };

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Components in the 0-1 range used by the `rg` operator.
    pub fn to_pdf_rgb(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl FromStr for FontColor {
    type Err = String;

    /// Parse `#RRGGBB`, `RRGGBB` or the short `#RGB` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return Err(format!("Invalid color: {}", s));
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(format!("Invalid color: {}", s)),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| format!("Invalid color: {}", s))
        };
        Ok(FontColor {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl TryFrom<String> for FontColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontColor> for String {
    fn from(value: FontColor) -> Self {
        value.to_hex()
    }
}

/// Overlay opacity, always within `[0.1, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Opacity(f64);

impl Opacity {
    pub const MIN: f64 = 0.1;
    pub const MAX: f64 = 1.0;

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::MAX);
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_opaque(self) -> bool {
        self.0 >= Self::MAX
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl From<f64> for Opacity {
    fn from(value: f64) -> Self {
        Opacity::new(value)
    }
}

impl From<Opacity> for f64 {
    fn from(value: Opacity) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_family_default_is_helvetica() {
        assert_eq!(FontFamily::default(), FontFamily::Helvetica);
    }

    #[test]
    fn test_font_family_parses_labels_and_base_fonts() {
        assert_eq!("Times New Roman".parse(), Ok(FontFamily::TimesRoman));
        assert_eq!("times-roman".parse(), Ok(FontFamily::TimesRoman));
        assert_eq!("courier".parse(), Ok(FontFamily::Courier));
        assert!("Comic Sans".parse::<FontFamily>().is_err());
    }

    #[test]
    fn test_font_family_from_pdf_font_name() {
        assert_eq!(
            FontFamily::from_pdf_font_name("BCDEEE+TimesNewRomanPSMT"),
            FontFamily::TimesRoman
        );
        assert_eq!(
            FontFamily::from_pdf_font_name("CourierNewPS-BoldMT"),
            FontFamily::Courier
        );
        assert_eq!(
            FontFamily::from_pdf_font_name("g_d0_f1"),
            FontFamily::Helvetica
        );
        assert_eq!(
            FontFamily::from_pdf_font_name("DejaVuSans"),
            FontFamily::Helvetica
        );
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(
            "#FF8000".parse(),
            Ok(FontColor {
                r: 255,
                g: 128,
                b: 0
            })
        );
        assert_eq!("#fff".parse::<FontColor>().unwrap().to_hex(), "#FFFFFF");
        assert!("#12".parse::<FontColor>().is_err());
        assert!("#GG0000".parse::<FontColor>().is_err());
    }

    #[test]
    fn test_color_serde_as_hex_string() {
        let json = serde_json::to_string(&FontColor { r: 1, g: 2, b: 3 }).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: FontColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FontColor { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn test_opacity_is_clamped() {
        assert_eq!(Opacity::new(0.0).get(), 0.1);
        assert_eq!(Opacity::new(1.7).get(), 1.0);
        assert_eq!(Opacity::new(0.5).get(), 0.5);
        assert_eq!(Opacity::new(f64::NAN).get(), 1.0);
    }
}
