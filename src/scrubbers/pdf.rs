//! PDF document sanitizer
//!
//! Walks the document's indirect-object graph from the catalog and every
//! page, deleting metadata-bearing keys wherever they occur. The traversal
//! is keyed by object id, so reference cycles terminate and each object is
//! visited at most once per pass. Individual deletions are best-effort; only
//! the final rebuild and save can fail the file.

use std::collections::HashSet;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::config::ScrubOptions;
use crate::error::Result;
use crate::scrubbers::{has_extension, Scrubber};

/// Keys deleted from every reachable dictionary.
const STRIP_KEYS: &[&[u8]] = &[
    b"Metadata",
    b"PieceInfo",
    b"LastModified",
    b"Author",
    b"Creator",
    b"Producer",
    b"CreationDate",
    b"ModDate",
    b"Title",
    b"Subject",
    b"Keywords",
];

/// Interactive-action keys additionally deleted everywhere in aggressive mode.
const AGGRESSIVE_STRIP_KEYS: &[&[u8]] = &[b"Annots", b"AA", b"OpenAction"];

/// Catalog keys always removed.
const ROOT_STRIP_KEYS: &[&[u8]] = &[b"Metadata", b"PieceInfo", b"OpenAction", b"AA"];

/// Catalog keys removed only in aggressive mode.
const ROOT_AGGRESSIVE_STRIP_KEYS: &[&[u8]] = &[
    b"AcroForm",
    b"Outlines",
    b"StructTreeRoot",
    b"PageLabels",
    b"ViewerPreferences",
    b"Threads",
    b"Dests",
];

pub struct PdfScrubber;

impl Scrubber for PdfScrubber {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }

    fn scrub(&self, src: &Path, dst: &Path, options: &ScrubOptions) -> Result<()> {
        let mut doc = Document::load(src)?;
        sanitize_document(&mut doc, options.pdf_aggressive);
        // Rebuilding without unreachable objects and writing the result are
        // the only fatal steps.
        prune_unreachable(&mut doc);
        doc.save(dst)?;
        Ok(())
    }
}

/// Strips metadata from a parsed document in place.
///
/// Root-level structures are detached once, then the object graph is walked
/// from the catalog and each page. Every deletion is independently
/// best-effort: a key that is absent or an id that does not resolve is
/// skipped, never aborts the pass.
pub fn sanitize_document(doc: &mut Document, aggressive: bool) {
    strip_document_info(doc, aggressive);
    strip_root(doc, aggressive);
    strip_graph(doc, aggressive);
}

/// Drops the document information dictionary and, in aggressive mode, the
/// trailer's file identifier.
fn strip_document_info(doc: &mut Document, aggressive: bool) {
    if let Some(info) = doc.trailer.remove(b"Info") {
        if let Ok(id) = info.as_reference() {
            doc.objects.remove(&id);
        }
        debug!("removed document information dictionary");
    }
    if aggressive {
        doc.trailer.remove(b"ID");
    }
}

/// Removes the fixed catalog-level structures and prunes the name tree.
fn strip_root(doc: &mut Document, aggressive: bool) {
    let Some(root_id) = trailer_root_id(doc) else {
        warn!("document has no catalog; skipping root-level strip");
        return;
    };

    let names = {
        let Ok(catalog) = doc
            .get_object_mut(root_id)
            .and_then(Object::as_dict_mut)
        else {
            return;
        };

        for key in ROOT_STRIP_KEYS {
            catalog.remove(key);
        }
        if aggressive {
            for key in ROOT_AGGRESSIVE_STRIP_KEYS {
                catalog.remove(key);
            }
        }

        catalog.get(b"Names").ok().cloned()
    };

    if let Some(names) = names {
        strip_name_tree(doc, root_id, names, aggressive);
    }
}

/// Removes embedded-file and script entries from the catalog's name tree.
/// The tree itself goes away when emptied and aggressive mode is on.
fn strip_name_tree(doc: &mut Document, root_id: ObjectId, names: Object, aggressive: bool) {
    let names_dict = match names {
        Object::Reference(id) => match doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            Ok(dict) => dict,
            Err(_) => return,
        },
        _ => {
            // Direct dictionary: edit the copy held by the catalog.
            let Ok(catalog) = doc
                .get_object_mut(root_id)
                .and_then(Object::as_dict_mut)
            else {
                return;
            };
            match catalog.get_mut(b"Names").and_then(Object::as_dict_mut) {
                Ok(dict) => dict,
                Err(_) => return,
            }
        }
    };

    names_dict.remove(b"EmbeddedFiles");
    names_dict.remove(b"JavaScript");
    let emptied = names_dict.is_empty();

    if emptied && aggressive {
        if let Ok(catalog) = doc.get_object_mut(root_id).and_then(Object::as_dict_mut) {
            catalog.remove(b"Names");
        }
    }
}

/// Depth-first sweep over every object reachable from the catalog and the
/// page list, deleting the configured key set from each dictionary.
fn strip_graph(doc: &mut Document, aggressive: bool) {
    let mut pending: Vec<ObjectId> = Vec::new();
    if let Some(root_id) = trailer_root_id(doc) {
        pending.push(root_id);
    }
    pending.extend(doc.get_pages().values().copied());

    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut stripped = 0usize;

    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Ok(object) = doc.get_object_mut(id) else {
            // Dangling reference; nothing to sanitize.
            continue;
        };
        strip_object(object, aggressive, &mut pending, &mut stripped);
    }

    debug!(objects = visited.len(), keys = stripped, "object graph sweep finished");
}

/// Strips one object in place, queueing any indirect references found in the
/// values that survive.
fn strip_object(
    object: &mut Object,
    aggressive: bool,
    pending: &mut Vec<ObjectId>,
    stripped: &mut usize,
) {
    match object {
        Object::Dictionary(dict) => strip_dictionary(dict, aggressive, pending, stripped),
        Object::Stream(stream) => strip_dictionary(&mut stream.dict, aggressive, pending, stripped),
        Object::Array(array) => {
            for item in array.iter_mut() {
                strip_object(item, aggressive, pending, stripped);
            }
        }
        Object::Reference(id) => pending.push(*id),
        _ => {}
    }
}

fn strip_dictionary(
    dict: &mut Dictionary,
    aggressive: bool,
    pending: &mut Vec<ObjectId>,
    stripped: &mut usize,
) {
    for key in STRIP_KEYS {
        if dict.remove(key).is_some() {
            *stripped += 1;
        }
    }
    if aggressive {
        for key in AGGRESSIVE_STRIP_KEYS {
            if dict.remove(key).is_some() {
                *stripped += 1;
            }
        }
    }

    for (_, value) in dict.iter_mut() {
        strip_object(value, aggressive, pending, stripped);
    }
}

/// Rebuilds the object table to contain only objects reachable from the
/// trailer, dropping everything the strip detached.
fn prune_unreachable(doc: &mut Document) {
    let mut pending: Vec<ObjectId> = Vec::new();
    for (_, value) in doc.trailer.iter() {
        collect_references(value, &mut pending);
    }

    let mut reachable: HashSet<ObjectId> = HashSet::new();
    while let Some(id) = pending.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Ok(object) = doc.get_object(id) {
            collect_references(object, &mut pending);
        }
    }

    let before = doc.objects.len();
    doc.objects.retain(|id, _| reachable.contains(id));
    let dropped = before - doc.objects.len();
    if dropped > 0 {
        debug!(dropped, "pruned unreachable objects");
    }
}

fn collect_references(object: &Object, pending: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => pending.push(*id),
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, pending);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, pending);
            }
        }
        Object::Array(array) => {
            for item in array.iter() {
                collect_references(item, pending);
            }
        }
        _ => {}
    }
}

fn trailer_root_id(doc: &Document) -> Option<ObjectId> {
    doc.trailer
        .get(b"Root")
        .ok()
        .and_then(|root| root.as_reference().ok())
}
