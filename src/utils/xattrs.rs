//! Best-effort removal of extended filesystem attributes

#[cfg(unix)]
use tracing::debug;

/// Removes every extended attribute from `path`, returning the names that
/// were actually removed. Attributes that cannot be listed or removed are
/// left in place; this never fails.
#[cfg(unix)]
pub fn strip_xattrs(path: &std::path::Path) -> Vec<String> {
    let names = match xattr::list(path) {
        Ok(names) => names,
        Err(_) => return Vec::new(),
    };

    let mut removed = Vec::new();
    for name in names {
        match xattr::remove(path, &name) {
            Ok(()) => removed.push(name.to_string_lossy().into_owned()),
            Err(err) => {
                debug!(path = %path.display(), attr = %name.to_string_lossy(), %err,
                    "could not remove extended attribute");
            }
        }
    }

    removed
}

#[cfg(not(unix))]
pub fn strip_xattrs(_path: &std::path::Path) -> Vec<String> {
    Vec::new()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_strip_xattrs_on_plain_file_is_empty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(strip_xattrs(file.path()).is_empty());
    }

    #[test]
    fn test_strip_xattrs_removes_set_attribute() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // Setting user xattrs can fail on tmpfs without user_xattr; skip then.
        if xattr::set(file.path(), "user.mdscrub.test", b"x").is_err() {
            return;
        }

        let removed = strip_xattrs(file.path());
        assert_eq!(removed, vec!["user.mdscrub.test".to_string()]);
        assert!(strip_xattrs(file.path()).is_empty());
    }
}
