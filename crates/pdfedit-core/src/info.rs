//! Document and page information
//!
//! Cheap metadata a host shows before (or alongside) the editor: page count,
//! version, per-page size and rotation.

use lopdf::Document;
use serde::Serialize;

use crate::error::LoadError;
use crate::geometry::{page_ids, PageGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    /// 0-based
    pub index: usize,
    /// Displayed width in points, rotation applied
    pub width: f64,
    pub height: f64,
    pub rotation: i64,
    pub orientation: PageOrientation,
}

impl PageInfo {
    fn from_geometry(index: usize, geometry: &PageGeometry) -> Self {
        let orientation = if (geometry.width - geometry.height).abs() < 1.0 {
            PageOrientation::Square
        } else if geometry.width > geometry.height {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        };
        Self {
            index,
            width: geometry.width,
            height: geometry.height,
            rotation: geometry.rotation.degrees(),
            orientation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Header version, e.g. "1.7"
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub pages: Vec<PageInfo>,
}

/// Header and trailer checks that need no parsing.
pub fn quick_validate(bytes: &[u8]) -> Result<(), LoadError> {
    if bytes.len() < 8 {
        return Err(LoadError::Parse("File too small to be a valid PDF".to_string()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(LoadError::Parse(
            "Not a valid PDF file (missing %PDF- header)".to_string(),
        ));
    }
    let tail = &bytes[bytes.len().saturating_sub(1024)..];
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(LoadError::Parse(
            "PDF appears truncated (missing %%EOF marker)".to_string(),
        ));
    }
    Ok(())
}

pub fn document_info(bytes: &[u8]) -> Result<DocumentInfo, LoadError> {
    quick_validate(bytes)?;
    let doc = Document::load_mem(bytes).map_err(|e| LoadError::Parse(e.to_string()))?;

    let ids = page_ids(&doc);
    if ids.is_empty() {
        return Err(LoadError::NoPages);
    }
    let pages = ids
        .iter()
        .enumerate()
        .map(|(index, &id)| {
            PageGeometry::from_page(&doc, id).map(|g| PageInfo::from_geometry(index, &g))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DocumentInfo {
        page_count: pages.len(),
        version: header_version(bytes),
        encrypted: doc.is_encrypted(),
        size_bytes: bytes.len(),
        title: info_string(&doc, b"Title"),
        author: info_string(&doc, b"Author"),
        pages,
    })
}

fn header_version(bytes: &[u8]) -> String {
    bytes
        .get(5..8)
        .and_then(|v| std::str::from_utf8(v).ok())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "1.4".to_string())
}

fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info_id = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let value = doc.get_dictionary(info_id).ok()?.get(key).ok()?.as_str().ok()?;
    let decoded = String::from_utf8_lossy(value).into_owned();
    (!decoded.is_empty()).then_some(decoded)
}
