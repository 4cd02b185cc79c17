//! Image overlay input
//!
//! Images arrive as raw bytes in any common raster format. They are decoded
//! once to learn their intrinsic size and kept as a `data:` URL, which is
//! what an [`ImageOverlay`](crate::overlay::ImageOverlay) stores and what a
//! browser can draw directly.

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::GenericImageView;
use std::io::Write;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Height over width
    pub aspect: f64,
    pub data_url: String,
}

pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, LoadError> {
    let format = image::guess_format(bytes).map_err(|e| LoadError::Image(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| LoadError::Image(e.to_string()))?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::Image("image has no pixels".to_string()));
    }

    Ok(DecodedImage {
        width,
        height,
        aspect: height as f64 / width as f64,
        data_url: format!("data:{};base64,{}", format.to_mime_type(), STANDARD.encode(bytes)),
    })
}

/// Bytes behind a `data:` URL.
pub fn data_url_bytes(src: &str) -> Result<Vec<u8>, LoadError> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| LoadError::Image("not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| LoadError::Image("data URL has no payload".to_string()))?;
    if header.split(';').any(|part| part == "base64") {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| LoadError::Image(e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Pixel data ready to become PDF image XObjects.
#[derive(Debug, Clone)]
pub(crate) struct PdfImageData {
    pub width: u32,
    pub height: u32,
    /// Flate-compressed 8-bit RGB samples
    pub rgb: Vec<u8>,
    /// Flate-compressed 8-bit alpha, only when some pixel is not opaque
    pub alpha: Option<Vec<u8>>,
}

pub(crate) fn pdf_image_data(src: &str) -> Result<PdfImageData, LoadError> {
    let bytes = data_url_bytes(src)?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| LoadError::Image(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    let translucent = alpha.iter().any(|&a| a != 255);

    Ok(PdfImageData {
        width,
        height,
        rgb: flate_compress(&rgb)?,
        alpha: if translucent {
            Some(flate_compress(&alpha)?)
        } else {
            None
        },
    })
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, LoadError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| LoadError::Image(e.to_string()))?;
    encoder.finish().map_err(|e| LoadError::Image(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::fixtures::png;
    use super::*;
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    #[test]
    fn test_decode_png_reports_aspect() {
        let decoded = decode_image(&png(40, 10, false)).unwrap();
        assert_eq!((decoded.width, decoded.height), (40, 10));
        assert_eq!(decoded.aspect, 0.25);
        assert!(decoded.data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_data_url_round_trips_bytes() {
        let bytes = png(3, 3, false);
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(data_url_bytes(&decoded.data_url).unwrap(), bytes);
    }

    #[test]
    fn test_garbage_is_image_error() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(LoadError::Image(_))
        ));
        assert!(matches!(
            data_url_bytes("https://example.com/a.png"),
            Err(LoadError::Image(_))
        ));
    }

    #[test]
    fn test_plain_data_url() {
        assert_eq!(data_url_bytes("data:text/plain,hi").unwrap(), b"hi");
    }

    #[test]
    fn test_alpha_only_when_translucent() {
        let url = decode_image(&png(2, 2, false)).unwrap().data_url;
        assert!(pdf_image_data(&url).unwrap().alpha.is_none());

        let url = decode_image(&png(2, 2, true)).unwrap().data_url;
        let data = pdf_image_data(&url).unwrap();
        let mut alpha = Vec::new();
        ZlibDecoder::new(data.alpha.unwrap().as_slice())
            .read_to_end(&mut alpha)
            .unwrap();
        assert_eq!(alpha, vec![128, 255, 255, 255]);
    }
}
