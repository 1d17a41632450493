//! Read-only verification pass
//!
//! Scans files for metadata the scrubbers would have removed, without
//! modifying anything. Independent of the pipeline; only the discovery
//! helper is shared.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lopdf::{Document, Object};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;
use zip::read::ZipArchive;
use zip::DateTime;

use crate::error::Result;
use crate::scrubbers::has_extension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Clean,
    MetadataFound,
    Unsupported,
    Error,
}

impl VerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyStatus::Clean => "clean",
            VerifyStatus::MetadataFound => "metadata_found",
            VerifyStatus::Unsupported => "unsupported",
            VerifyStatus::Error => "error",
        }
    }
}

/// Findings for one file
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub path: PathBuf,
    pub status: VerifyStatus,
    pub kind: Option<&'static str>,
    pub details: BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
}

impl VerifyResult {
    fn unsupported(path: PathBuf) -> Self {
        Self {
            path,
            status: VerifyStatus::Unsupported,
            kind: None,
            details: BTreeMap::new(),
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    pub recursive: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// Verifies every regular file under the given roots.
pub fn verify_paths(roots: &[PathBuf], options: VerifyOptions) -> Result<Vec<VerifyResult>> {
    let mut results = Vec::new();
    for root in roots {
        for path in iter_files(root, options.recursive)? {
            results.push(verify_file(&path));
        }
    }
    Ok(results)
}

/// Verifies a single file; any failure becomes an `Error` result.
pub fn verify_file(path: &Path) -> VerifyResult {
    let outcome = if has_extension(path, &["pdf"]) {
        verify_pdf(path)
    } else if has_extension(path, &["docx", "xlsx", "pptx"]) {
        verify_openxml(path)
    } else {
        return VerifyResult::unsupported(path.to_path_buf());
    };

    match outcome {
        Ok(result) => result,
        Err(err) => VerifyResult {
            path: path.to_path_buf(),
            status: VerifyStatus::Error,
            kind: None,
            details: BTreeMap::new(),
            message: Some(err.to_string()),
        },
    }
}

fn verify_pdf(path: &Path) -> Result<VerifyResult> {
    let doc = Document::load(path)?;

    let info_keys: Vec<String> = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| match info {
            Object::Reference(id) => doc.get_object(*id).ok(),
            direct => Some(direct),
        })
        .and_then(|obj| obj.as_dict().ok())
        .map(|dict| {
            dict.iter()
                .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                .collect()
        })
        .unwrap_or_default();

    let mut has_root_metadata = false;
    let mut names_keys: Vec<String> = Vec::new();
    if let Ok(catalog) = doc.catalog() {
        for key in [b"Metadata".as_slice(), b"PieceInfo", b"OpenAction", b"AA"] {
            if catalog.has(key) {
                has_root_metadata = true;
            }
        }

        let names = catalog.get(b"Names").ok().and_then(|names| match names {
            Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
            direct => direct.as_dict().ok(),
        });
        if let Some(names) = names {
            names_keys = names
                .iter()
                .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
                .collect();
            if names.has(b"EmbeddedFiles") || names.has(b"JavaScript") {
                has_root_metadata = true;
            }
        }
    }

    let mut page_pieceinfo = 0usize;
    let mut page_annots = 0usize;
    for (_, page_id) in doc.get_pages() {
        if let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) {
            if page.has(b"PieceInfo") {
                page_pieceinfo += 1;
            }
            if page.has(b"Annots") {
                page_annots += 1;
            }
        }
    }

    let found = !info_keys.is_empty() || has_root_metadata || page_pieceinfo > 0;

    let mut details = BTreeMap::new();
    details.insert("docinfo_keys".into(), serde_json::json!(info_keys));
    details.insert("has_root_metadata".into(), serde_json::json!(has_root_metadata));
    details.insert("names_keys".into(), serde_json::json!(names_keys));
    details.insert("page_pieceinfo_count".into(), serde_json::json!(page_pieceinfo));
    details.insert("page_annots_count".into(), serde_json::json!(page_annots));

    Ok(VerifyResult {
        path: path.to_path_buf(),
        status: if found {
            VerifyStatus::MetadataFound
        } else {
            VerifyStatus::Clean
        },
        kind: Some("pdf"),
        details,
        message: None,
    })
}

fn verify_openxml(path: &Path) -> Result<VerifyResult> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let names: Vec<String> = archive.file_names().map(String::from).collect();

    let docprops: Vec<&str> = ["docProps/core.xml", "docProps/app.xml", "docProps/custom.xml"]
        .into_iter()
        .filter(|p| names.iter().any(|n| n == p))
        .collect();

    // Entry timestamps can carry metadata; scrubbed packages pin them to the
    // ZIP epoch.
    let epoch = DateTime::default();
    let mut non_normalized = 0usize;
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        match entry.last_modified() {
            Some(stamp) if stamp != epoch => non_normalized += 1,
            _ => {}
        }
    }

    let found = !docprops.is_empty() || non_normalized > 0;

    let mut details = BTreeMap::new();
    details.insert("docprops_present".into(), serde_json::json!(docprops));
    details.insert(
        "non_normalized_zip_timestamps".into(),
        serde_json::json!(non_normalized),
    );

    Ok(VerifyResult {
        path: path.to_path_buf(),
        status: if found {
            VerifyStatus::MetadataFound
        } else {
            VerifyStatus::Clean
        },
        kind: Some("openxml"),
        details,
        message: None,
    })
}

/// Same discovery rules as the pipeline: regular files only, no symlinks.
fn iter_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let meta = std::fs::symlink_metadata(root)?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !meta.is_dir() {
        return Ok(Vec::new());
    }

    let walker = if recursive {
        WalkDir::new(root).follow_links(false)
    } else {
        WalkDir::new(root).follow_links(false).max_depth(1)
    };

    let skipped = |entry: &walkdir::DirEntry| {
        entry.file_type().is_dir()
            && matches!(
                entry.file_name().to_str(),
                Some(".git") | Some(".venv") | Some("__pycache__")
            )
    };

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !skipped(e)) {
        let entry = entry?;
        if entry.file_type().is_file() && !entry.path_is_symlink() {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}
