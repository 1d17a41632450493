//! Filesystem helpers for atomic writes and stat preservation

use std::{
    fs::{self, Metadata},
    path::{Path, PathBuf},
};

use filetime::FileTime;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;

/// Scoped temporary file colocated with a destination path.
///
/// The destination is either left untouched or fully replaced: scrubbers
/// write into [`path`](AtomicWriter::path), and only
/// [`commit`](AtomicWriter::commit) makes the bytes visible at the
/// destination via an atomic rename. Dropping an uncommitted writer removes
/// the temporary file.
pub struct AtomicWriter {
    tmp: NamedTempFile,
}

impl AtomicWriter {
    /// Stage a temporary file next to `dst`, creating parent directories.
    pub fn stage(dst: &Path) -> Result<Self> {
        ensure_parent_dir(dst)?;

        let name = dst
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        let dir = dst.parent().filter(|p| !p.as_os_str().is_empty());

        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .suffix(".tmp")
            .tempfile_in(dir.unwrap_or_else(|| Path::new(".")))?;

        debug!(tmp = %tmp.path().display(), dst = %dst.display(), "staged temporary file");
        Ok(Self { tmp })
    }

    /// Path scrubbers should write into.
    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    /// Atomically replace `dst` with the staged file.
    pub fn commit(self, dst: &Path) -> Result<()> {
        self.tmp.persist(dst)?;
        Ok(())
    }
}

/// Ensures the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Copies file contents, creating the destination's parent directories.
pub fn copy_bytes(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;
    fs::copy(src, dst)?;
    Ok(())
}

/// Applies a source file's permission bits and timestamps onto `dst`.
pub fn apply_stat(
    meta: &Metadata,
    dst: &Path,
    preserve_times: bool,
    preserve_perms: bool,
) -> Result<()> {
    if preserve_perms {
        fs::set_permissions(dst, meta.permissions())?;
    }
    if preserve_times {
        let atime = FileTime::from_last_access_time(meta);
        let mtime = FileTime::from_last_modification_time(meta);
        filetime::set_file_times(dst, atime, mtime)?;
    }
    Ok(())
}

/// True for a regular file reached without following a symlink.
pub fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Backup path for in-place mode: `<name><suffix>` beside the source.
pub fn backup_path(src: &Path, suffix: &str) -> PathBuf {
    let mut name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(suffix);
    src.with_file_name(name)
}
