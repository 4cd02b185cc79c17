//! Structural document operations
//!
//! Every operation takes the current bytes and returns brand-new bytes; the
//! input is never patched. Callers swap the result in only on `Ok`, so a
//! failure leaves the previous document authoritative.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StructuralOperationError;
use crate::geometry::{inherited, page_ids, resolve, Rotation};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A single page cut out of the document, ready to download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedPage {
    /// `split_page_<n>.<ext>` with `n` 1-based
    pub file_name: String,
    pub bytes: Vec<u8>,
}

fn load(bytes: &[u8]) -> Result<Document, StructuralOperationError> {
    let doc =
        Document::load_mem(bytes).map_err(|e| StructuralOperationError::Parse(e.to_string()))?;
    if doc.get_pages().is_empty() {
        return Err(StructuralOperationError::EmptyResult);
    }
    Ok(doc)
}

fn save(mut doc: Document) -> Result<Vec<u8>, StructuralOperationError> {
    if doc.get_pages().is_empty() {
        return Err(StructuralOperationError::EmptyResult);
    }
    doc.compress();
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| StructuralOperationError::Save(e.to_string()))?;
    Ok(buffer)
}

fn checked_page(doc: &Document, index: usize) -> Result<ObjectId, StructuralOperationError> {
    let ids = page_ids(doc);
    ids.get(index)
        .copied()
        .ok_or(StructuralOperationError::PageOutOfRange {
            page: index,
            page_count: ids.len(),
        })
}

pub fn page_count(bytes: &[u8]) -> Result<usize, StructuralOperationError> {
    Ok(load(bytes)?.get_pages().len())
}

/// Append every page of `other` after the last page of `current`.
///
/// Objects of `other` are renumbered past the highest id of `current`, then
/// its pages are hung directly under the root page tree node.
pub fn merge(current: &[u8], other: &[u8]) -> Result<Vec<u8>, StructuralOperationError> {
    let mut dest = load(current)?;
    let source = load(other)?;

    let mut page_refs = page_ids(&dest);
    let mut appended = Vec::new();
    for page_id in page_ids(&source) {
        appended.push((page_id, materialized_page(&source, page_id)?));
    }

    let offset = dest.max_id;
    let mut remapped = BTreeMap::new();
    for (old_id, object) in source.objects.into_iter() {
        remapped.insert((old_id.0 + offset, old_id.1), remap_object_refs(object, offset));
    }
    dest.objects.extend(remapped);
    dest.max_id = (source.max_id + offset).max(dest.max_id);

    // Pages carry their inherited attributes now, so the old parents can go
    for (old_id, page) in appended {
        let new_id = (old_id.0 + offset, old_id.1);
        if let Object::Dictionary(dict) = remap_object_refs(Object::Dictionary(page), offset) {
            dest.objects.insert(new_id, Object::Dictionary(dict));
        }
        page_refs.push(new_id);
    }

    let materialized: Vec<(ObjectId, Dictionary)> = page_refs
        .iter()
        .map(|&id| materialized_page(&dest, id).map(|dict| (id, dict)))
        .collect::<Result<_, _>>()?;
    for (id, dict) in materialized {
        dest.objects.insert(id, Object::Dictionary(dict));
    }
    update_page_tree(&mut dest, &page_refs)?;
    dest.prune_objects();

    info!(pages = page_refs.len(), "merged documents");
    save(dest)
}

/// Remove the page at `index`. A document never loses its last page.
pub fn delete_page(bytes: &[u8], index: usize) -> Result<Vec<u8>, StructuralOperationError> {
    let mut doc = load(bytes)?;
    let count = doc.get_pages().len();
    if count <= 1 {
        warn!(index, "refusing to delete the only page");
        return Err(StructuralOperationError::LastPage);
    }
    checked_page(&doc, index)?;

    doc.delete_pages(&[index as u32 + 1]);
    doc.prune_objects();

    debug!(index, remaining = count - 1, "deleted page");
    save(doc)
}

/// Advance the page's `/Rotate` a quarter turn clockwise.
pub fn rotate_page(bytes: &[u8], index: usize) -> Result<Vec<u8>, StructuralOperationError> {
    let mut doc = load(bytes)?;
    let page_id = checked_page(&doc, index)?;

    let current = {
        let dict = doc
            .get_dictionary(page_id)
            .map_err(|e| StructuralOperationError::Parse(e.to_string()))?;
        inherited(&doc, dict, b"Rotate")
            .and_then(|obj| resolve(&doc, obj).as_i64().ok())
            .map(Rotation::from_degrees)
            .unwrap_or_default()
    };
    let next = current.turned();

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| StructuralOperationError::Parse(e.to_string()))?
        .set("Rotate", Object::Integer(next.degrees()));

    debug!(index, from = current.degrees(), to = next.degrees(), "rotated page");
    save(doc)
}

/// A standalone copy of the page at `index`; `bytes` is left as it was.
pub fn export_page(
    bytes: &[u8],
    index: usize,
    extension: &str,
) -> Result<ExportedPage, StructuralOperationError> {
    let mut doc = load(bytes)?;
    let count = doc.get_pages().len();
    checked_page(&doc, index)?;

    // Delete from the back so earlier page numbers stay valid
    let keep = index as u32 + 1;
    let doomed: Vec<u32> = (1..=count as u32).rev().filter(|&n| n != keep).collect();
    doc.delete_pages(&doomed);
    doc.prune_objects();

    let exported = ExportedPage {
        file_name: format!("split_page_{}.{}", index + 1, extension),
        bytes: save(doc)?,
    };
    debug!(index, file_name = %exported.file_name, "exported page");
    Ok(exported)
}

/// Page dictionary with every inheritable attribute copied onto it.
fn materialized_page(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Dictionary, StructuralOperationError> {
    let dict = doc
        .get_dictionary(page_id)
        .map_err(|e| StructuralOperationError::Parse(e.to_string()))?;
    let mut page = dict.clone();
    for key in INHERITABLE {
        if page.get(key).is_err() {
            if let Some(value) = inherited(doc, dict, key) {
                page.set(key.to_vec(), value.clone());
            }
        }
    }
    Ok(page)
}

fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the root page tree node at exactly `page_refs`, in order.
fn update_page_tree(
    doc: &mut Document,
    page_refs: &[ObjectId],
) -> Result<(), StructuralOperationError> {
    let fail = |what: &str| StructuralOperationError::Parse(what.to_string());

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| fail("No Root in trailer"))?;
    let pages_id = doc
        .get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| fail("No Pages in catalog"))?;

    for &page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(&page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages)) => {
            let kids = page_refs.iter().map(|&id| Object::Reference(id)).collect();
            pages.set("Kids", Object::Array(kids));
            pages.set("Count", Object::Integer(page_refs.len() as i64));
            Ok(())
        }
        _ => Err(fail("Invalid pages dictionary")),
    }
}

/// Admits one structural mutation at a time.
///
/// Clones share the same flag, so a host that runs mutations on spawned
/// tasks can hand each task a clone.
#[derive(Debug, Clone, Default)]
pub struct MutationGate {
    busy: Arc<AtomicBool>,
}

impl MutationGate {
    pub fn try_begin(&self) -> Result<MutationPermit, StructuralOperationError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StructuralOperationError::Busy)?;
        Ok(MutationPermit {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the duration of one mutation; releases the gate on drop.
#[derive(Debug)]
pub struct MutationPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for MutationPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
