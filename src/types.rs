//! Outcome types produced by the scrubbing pipeline
//!
//! Every discovered file yields exactly one [`ScrubOutcome`]; the status set
//! is closed and the reporting layer depends on it staying that way.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Terminal status of a single file run through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubStatus {
    Scrubbed,
    CopiedUnknown,
    SkippedUnsupported,
    SkippedNotAFile,
    SkippedExists,
    DryRun,
    Error,
}

impl ScrubStatus {
    /// All statuses, in reporting order.
    pub const ALL: [ScrubStatus; 7] = [
        ScrubStatus::Scrubbed,
        ScrubStatus::CopiedUnknown,
        ScrubStatus::SkippedUnsupported,
        ScrubStatus::SkippedNotAFile,
        ScrubStatus::SkippedExists,
        ScrubStatus::DryRun,
        ScrubStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrubStatus::Scrubbed => "scrubbed",
            ScrubStatus::CopiedUnknown => "copied_unknown",
            ScrubStatus::SkippedUnsupported => "skipped_unsupported",
            ScrubStatus::SkippedNotAFile => "skipped_not_a_file",
            ScrubStatus::SkippedExists => "skipped_exists",
            ScrubStatus::DryRun => "dry_run",
            ScrubStatus::Error => "error",
        }
    }
}

/// Result record for one input file
///
/// `Error` always carries a message; `Scrubbed` and `CopiedUnknown` always
/// carry a destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrubOutcome {
    pub src: PathBuf,
    pub dst: Option<PathBuf>,
    pub status: ScrubStatus,
    pub scrubber: Option<String>,
    pub message: Option<String>,
    pub removed_xattrs: Vec<String>,
}

impl ScrubOutcome {
    pub fn new(src: PathBuf, dst: Option<PathBuf>, status: ScrubStatus) -> Self {
        Self {
            src,
            dst,
            status,
            scrubber: None,
            message: None,
            removed_xattrs: Vec::new(),
        }
    }

    pub fn with_scrubber(mut self, name: &str) -> Self {
        self.scrubber = Some(name.to_string());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_removed_xattrs(mut self, removed: Vec<String>) -> Self {
        self.removed_xattrs = removed;
        self
    }

    /// Error outcome for a failed scrub attempt.
    pub fn error(
        src: PathBuf,
        dst: Option<PathBuf>,
        scrubber: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            src,
            dst,
            status: ScrubStatus::Error,
            scrubber: scrubber.map(|s| s.to_string()),
            message: Some(message.into()),
            removed_xattrs: Vec::new(),
        }
    }
}
