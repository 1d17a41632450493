//! Error types and handling for the metadata scrubbing library

use std::{io, path::PathBuf, result::Result as StdResult};

use thiserror::Error;

/// Custom result type for scrubbing operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for scrubbing operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("discovery error: {0}")]
    Discovery(#[from] walkdir::Error),

    #[error("backup exists: {0}")]
    BackupExists(PathBuf),

    #[error("external tool error: {0}")]
    ExternalTool(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[cfg(feature = "audio")]
    #[error("audio tag error: {0}")]
    AudioTag(#[from] lofty::error::LoftyError),
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}
