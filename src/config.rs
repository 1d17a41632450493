//! Configuration types for a scrubbing run
//!
//! A [`RunOptions`] is built once per CLI invocation and never mutated.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where scrubbed output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Write sanitized copies under an output directory, namespaced per root.
    Copy { out_dir: PathBuf },
    /// Replace each source file with its sanitized version.
    InPlace,
}

/// Immutable configuration snapshot for one pipeline invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output: OutputMode,
    pub dry_run: bool,
    pub overwrite: bool,
    pub copy_unknown: bool,
    pub recursive: bool,

    pub preserve_times: bool,
    pub preserve_perms: bool,
    pub strip_xattrs: bool,

    /// Backup suffix for in-place mode; empty string disables backups.
    pub backup_suffix: String,

    pub scrub: ScrubOptions,
}

impl RunOptions {
    pub fn in_place(&self) -> bool {
        self.output == OutputMode::InPlace
    }

    pub fn out_dir(&self) -> Option<&PathBuf> {
        match &self.output {
            OutputMode::Copy { out_dir } => Some(out_dir),
            OutputMode::InPlace => None,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output: OutputMode::Copy {
                out_dir: PathBuf::from("scrubbed"),
            },
            dry_run: false,
            overwrite: false,
            copy_unknown: false,
            recursive: true,
            preserve_times: true,
            preserve_perms: true,
            strip_xattrs: true,
            backup_suffix: ".bak".to_string(),
            scrub: ScrubOptions::default(),
        }
    }
}

/// Per-format knobs handed to each scrubber
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScrubOptions {
    /// Force OpenXML archive entry timestamps to the ZIP epoch.
    pub normalize_zip_timestamps: bool,
    /// Remove interactive structures (forms, outlines, annotations) from PDFs
    /// in addition to the base metadata key set.
    pub pdf_aggressive: bool,
}

impl Default for ScrubOptions {
    fn default() -> Self {
        Self {
            normalize_zip_timestamps: true,
            pdf_aggressive: false,
        }
    }
}
