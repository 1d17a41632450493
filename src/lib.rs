//! Metadata scrubbing library
//!
//! Strips identity-revealing metadata from documents, images and media
//! files while preserving their usable content. Format-specific scrubbers
//! sit behind a fixed registry; the apply pipeline makes every mutation
//! atomic and per-file.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod scrubbers;
pub mod types;
pub mod utils;
pub mod verify;

// Re-exports for crate consumers
pub use config::{OutputMode, RunOptions, ScrubOptions};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use report::{ErrorRecord, RunReport, MAX_REPORTED_ERRORS};
pub use scrubbers::{default_scrubbers, Scrubber};
pub use types::{ScrubOutcome, ScrubStatus};
pub use verify::{verify_paths, VerifyOptions, VerifyResult, VerifyStatus};
