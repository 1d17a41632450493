//! Shared filesystem utilities

pub mod io;
pub mod xattrs;

pub use io::{apply_stat, backup_path, copy_bytes, ensure_parent_dir, is_regular_file, AtomicWriter};
pub use xattrs::strip_xattrs;
