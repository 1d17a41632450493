//! Transactional apply pipeline
//!
//! Discovers input files, picks at most one scrubber per file and applies it
//! with atomic-replace semantics. Every file yields exactly one
//! [`ScrubOutcome`]; per-file failures never abort the run, only a failure
//! to enumerate a root does.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{RunOptions, ScrubOptions};
use crate::error::{Error, Result};
use crate::scrubbers::{default_scrubbers, Scrubber};
use crate::types::{ScrubOutcome, ScrubStatus};
use crate::utils::{
    apply_stat, backup_path, copy_bytes, is_regular_file, strip_xattrs, AtomicWriter,
};

/// Directory names never descended into during recursive discovery.
const SKIP_DIRS: &[&str] = &[".git", ".venv", "__pycache__"];

pub struct Pipeline {
    scrubbers: Vec<Box<dyn Scrubber>>,
    options: RunOptions,
}

impl Pipeline {
    /// Pipeline over the default scrubber set.
    pub fn new(options: RunOptions) -> Self {
        Self {
            scrubbers: default_scrubbers(),
            options,
        }
    }

    /// Pipeline over an explicit handler list, in dispatch order.
    pub fn with_scrubbers(options: RunOptions, scrubbers: Vec<Box<dyn Scrubber>>) -> Self {
        Self { scrubbers, options }
    }

    /// Runs the pipeline over every file discovered under `roots`.
    pub fn run(&self, roots: &[PathBuf]) -> Result<Vec<ScrubOutcome>> {
        let tasks = self.discover(roots)?;
        info!(files = tasks.len(), "discovery finished");

        Ok(tasks
            .into_iter()
            .map(|(src, dst)| self.scrub_one(&src, &dst))
            .collect())
    }

    /// Enumerates `(source, destination)` pairs for every regular file under
    /// the given roots. Symlinks are never followed or yielded, and the
    /// output directory is excluded from its own traversal.
    fn discover(&self, roots: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>> {
        let out_dir_resolved = self
            .options
            .out_dir()
            .and_then(|dir| dir.canonicalize().ok());

        let mut tasks = Vec::new();
        for root in roots {
            for src in iter_files(root, self.options.recursive)? {
                if let Some(out_dir) = &out_dir_resolved {
                    if src
                        .canonicalize()
                        .map(|resolved| resolved.starts_with(out_dir))
                        .unwrap_or(false)
                    {
                        // Never re-scrub our own output.
                        continue;
                    }
                }

                let dst = match &self.options.output {
                    crate::config::OutputMode::InPlace => src.clone(),
                    crate::config::OutputMode::Copy { out_dir } => {
                        map_output_path(&src, root, out_dir)
                    }
                };
                tasks.push((src, dst));
            }
        }

        Ok(tasks)
    }

    fn pick_scrubber(&self, path: &Path) -> Option<&dyn Scrubber> {
        self.scrubbers
            .iter()
            .find(|s| s.can_handle(path))
            .map(|s| s.as_ref())
    }

    /// Runs one file through the per-file state machine.
    fn scrub_one(&self, src: &Path, dst: &Path) -> ScrubOutcome {
        if !is_regular_file(src) {
            return ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::SkippedNotAFile,
            );
        }

        let Some(scrubber) = self.pick_scrubber(src) else {
            return self.handle_unknown(src, dst);
        };

        if !self.options.in_place() && dst.exists() && !self.options.overwrite {
            return ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::SkippedExists,
            )
            .with_scrubber(scrubber.name());
        }

        if self.options.dry_run {
            return ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::DryRun,
            )
            .with_scrubber(scrubber.name());
        }

        match self.apply(scrubber, src, dst) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(src = %src.display(), scrubber = scrubber.name(), %err, "scrub failed");
                ScrubOutcome::error(
                    src.to_path_buf(),
                    Some(dst.to_path_buf()),
                    Some(scrubber.name()),
                    err.to_string(),
                )
            }
        }
    }

    /// No handler claimed the file: copy it verbatim when asked to, skip it
    /// otherwise.
    fn handle_unknown(&self, src: &Path, dst: &Path) -> ScrubOutcome {
        if !self.options.copy_unknown || self.options.in_place() {
            return ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::SkippedUnsupported,
            );
        }

        if dst.exists() && !self.options.overwrite {
            return ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::SkippedExists,
            );
        }
        if self.options.dry_run {
            return ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::DryRun,
            )
            .with_message("copy unknown");
        }

        match self.copy_unknown_file(src, dst) {
            Ok(removed) => ScrubOutcome::new(
                src.to_path_buf(),
                Some(dst.to_path_buf()),
                ScrubStatus::CopiedUnknown,
            )
            .with_message("copied without scrubbing (unsupported type)")
            .with_removed_xattrs(removed),
            Err(err) => {
                ScrubOutcome::error(src.to_path_buf(), Some(dst.to_path_buf()), None, err.to_string())
            }
        }
    }

    fn copy_unknown_file(&self, src: &Path, dst: &Path) -> Result<Vec<String>> {
        let meta = fs::metadata(src)?;

        let staged = AtomicWriter::stage(dst)?;
        copy_bytes(src, staged.path())?;
        staged.commit(dst)?;

        apply_stat(
            &meta,
            dst,
            self.options.preserve_times,
            self.options.preserve_perms,
        )?;
        Ok(self.strip_attributes(dst))
    }

    /// The scrub attempt proper. Any error here is caught by the caller and
    /// converted into an `Error` outcome; the staged temporary file is
    /// removed on every failure path.
    fn apply(&self, scrubber: &dyn Scrubber, src: &Path, dst: &Path) -> Result<ScrubOutcome> {
        let meta = fs::metadata(src)?;

        if self.options.in_place() {
            // Back up the original bytes before touching anything.
            if !self.options.backup_suffix.is_empty() {
                let backup = backup_path(src, &self.options.backup_suffix);
                if backup.exists() && !self.options.overwrite {
                    return Err(Error::BackupExists(backup));
                }
                copy_bytes(src, &backup)?;
            }

            let staged = AtomicWriter::stage(src)?;
            scrubber.scrub(src, staged.path(), &self.scrub_options())?;
            staged.commit(src)?;

            // The replace discarded the original mode and times.
            apply_stat(
                &meta,
                src,
                self.options.preserve_times,
                self.options.preserve_perms,
            )?;
            let removed = self.strip_attributes(src);

            debug!(src = %src.display(), scrubber = scrubber.name(), "scrubbed in place");
            return Ok(ScrubOutcome::new(
                src.to_path_buf(),
                Some(src.to_path_buf()),
                ScrubStatus::Scrubbed,
            )
            .with_scrubber(scrubber.name())
            .with_removed_xattrs(removed));
        }

        let staged = AtomicWriter::stage(dst)?;
        scrubber.scrub(src, staged.path(), &self.scrub_options())?;
        staged.commit(dst)?;

        apply_stat(
            &meta,
            dst,
            self.options.preserve_times,
            self.options.preserve_perms,
        )?;
        let removed = self.strip_attributes(dst);

        debug!(src = %src.display(), dst = %dst.display(), scrubber = scrubber.name(), "scrubbed");
        Ok(ScrubOutcome::new(
            src.to_path_buf(),
            Some(dst.to_path_buf()),
            ScrubStatus::Scrubbed,
        )
        .with_scrubber(scrubber.name())
        .with_removed_xattrs(removed))
    }

    fn strip_attributes(&self, path: &Path) -> Vec<String> {
        if self.options.strip_xattrs {
            strip_xattrs(path)
        } else {
            Vec::new()
        }
    }

    fn scrub_options(&self) -> ScrubOptions {
        self.options.scrub
    }
}

/// Regular files under `root`, never following symlinks. A file root yields
/// itself; a directory root is walked recursively or shallowly.
fn iter_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let meta = fs::symlink_metadata(root)?;
    if meta.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if meta.file_type().is_symlink() || !meta.is_dir() {
        return Ok(Vec::new());
    }

    let walker = if recursive {
        WalkDir::new(root).follow_links(false)
    } else {
        WalkDir::new(root).follow_links(false).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !skipped_dir(e)) {
        let entry = entry?;
        if entry.file_type().is_file() && !entry.path_is_symlink() {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

fn skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIP_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Maps a source file into the output directory, namespaced by its root so
/// two roots with colliding relative paths cannot overwrite each other.
fn map_output_path(src: &Path, root: &Path, out_dir: &Path) -> PathBuf {
    if root.is_dir() {
        let rel = src.strip_prefix(root).unwrap_or(src);
        let root_name = root
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("root"));
        return out_dir.join(root_name).join(rel);
    }

    // A file root is namespaced by its parent directory's name.
    let parent_name = root
        .parent()
        .and_then(Path::file_name)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("root"));
    let file_name = src.file_name().map(PathBuf::from).unwrap_or_default();
    out_dir.join(parent_name).join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputMode;

    struct UppercaseScrubber;

    impl Scrubber for UppercaseScrubber {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn can_handle(&self, path: &Path) -> bool {
            crate::scrubbers::has_extension(path, &["txt"])
        }

        fn scrub(&self, src: &Path, dst: &Path, _options: &ScrubOptions) -> Result<()> {
            let data = fs::read_to_string(src)?;
            fs::write(dst, data.to_uppercase())?;
            Ok(())
        }
    }

    struct FailingScrubber;

    impl Scrubber for FailingScrubber {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn can_handle(&self, path: &Path) -> bool {
            crate::scrubbers::has_extension(path, &["txt"])
        }

        fn scrub(&self, _src: &Path, dst: &Path, _options: &ScrubOptions) -> Result<()> {
            // Leave a partial write behind, then fail.
            fs::write(dst, b"partial")?;
            Err(Error::ExternalTool("injected failure".to_string()))
        }
    }

    fn copy_options(out_dir: &Path) -> RunOptions {
        RunOptions {
            output: OutputMode::Copy {
                out_dir: out_dir.to_path_buf(),
            },
            ..RunOptions::default()
        }
    }

    fn in_place_options() -> RunOptions {
        RunOptions {
            output: OutputMode::InPlace,
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_copy_mode_scrubs_into_namespaced_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.txt"), "hello").unwrap();
        let out = dir.path().join("out");

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, ScrubStatus::Scrubbed);
        let dst = out.join("docs/sub/a.txt");
        assert_eq!(outcomes[0].dst.as_deref(), Some(dst.as_path()));
        assert_eq!(fs::read_to_string(dst).unwrap(), "HELLO");
    }

    #[test]
    fn test_file_root_namespaced_by_parent() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("inbox");
        fs::create_dir_all(&parent).unwrap();
        let file = parent.join("a.txt");
        fs::write(&file, "x").unwrap();
        let out = dir.path().join("out");

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[file]).unwrap();

        assert_eq!(
            outcomes[0].dst.as_deref(),
            Some(out.join("inbox/a.txt").as_path())
        );
    }

    #[test]
    fn test_unsupported_without_copy_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.bin"), "x").unwrap();
        let out = dir.path().join("out");

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::SkippedUnsupported);
        assert!(!out.exists());
    }

    #[test]
    fn test_copy_unknown_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.bin"), "raw-bytes").unwrap();
        let out = dir.path().join("out");

        let options = RunOptions {
            copy_unknown: true,
            ..copy_options(&out)
        };
        let pipeline = Pipeline::with_scrubbers(options, vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::CopiedUnknown);
        assert_eq!(
            fs::read_to_string(out.join("docs/a.bin")).unwrap(),
            "raw-bytes"
        );
    }

    #[test]
    fn test_existing_destination_skipped_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("docs")).unwrap();
        fs::write(out.join("docs/a.txt"), "old").unwrap();

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root.clone()]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::SkippedExists);
        assert_eq!(fs::read_to_string(out.join("docs/a.txt")).unwrap(), "old");

        let options = RunOptions {
            overwrite: true,
            ..copy_options(&out)
        };
        let pipeline = Pipeline::with_scrubbers(options, vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();
        assert_eq!(outcomes[0].status, ScrubStatus::Scrubbed);
        assert_eq!(fs::read_to_string(out.join("docs/a.txt")).unwrap(), "HELLO");
    }

    #[test]
    fn test_dry_run_performs_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        let out = dir.path().join("out");

        let options = RunOptions {
            dry_run: true,
            ..copy_options(&out)
        };
        let pipeline = Pipeline::with_scrubbers(options, vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::DryRun);
        assert_eq!(outcomes[0].scrubber.as_deref(), Some("upper"));
        assert!(!out.exists());
    }

    #[test]
    fn test_failure_leaves_no_destination_and_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        let out = dir.path().join("out");

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(FailingScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::Error);
        assert!(outcomes[0].message.as_deref().unwrap().contains("injected"));
        assert!(!out.join("docs/a.txt").exists());

        // no stray temporary files anywhere under the output tree
        if out.exists() {
            for entry in WalkDir::new(&out) {
                let entry = entry.unwrap();
                assert!(
                    !entry.file_name().to_string_lossy().ends_with(".tmp"),
                    "stray temp file: {}",
                    entry.path().display()
                );
            }
        }
    }

    #[test]
    fn test_in_place_failure_leaves_source_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        let file = root.join("a.txt");
        fs::write(&file, "hello").unwrap();

        let options = RunOptions {
            backup_suffix: String::new(),
            ..in_place_options()
        };
        let pipeline = Pipeline::with_scrubbers(options, vec![Box::new(FailingScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::Error);
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
    }

    #[test]
    fn test_in_place_creates_backup() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        let file = root.join("a.txt");
        fs::write(&file, "hello").unwrap();

        let pipeline =
            Pipeline::with_scrubbers(in_place_options(), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root.clone()]).unwrap();

        assert_eq!(outcomes[0].status, ScrubStatus::Scrubbed);
        assert_eq!(fs::read_to_string(&file).unwrap(), "HELLO");
        assert_eq!(
            fs::read_to_string(root.join("a.txt.bak")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_in_place_backup_collision_aborts_before_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        let file = root.join("a.txt");
        fs::write(&file, "hello").unwrap();
        fs::write(root.join("a.txt.bak"), "previous-backup").unwrap();

        let pipeline =
            Pipeline::with_scrubbers(in_place_options(), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root.clone()]).unwrap();

        // the backup-related outcome for a.txt
        let outcome = outcomes
            .iter()
            .find(|o| o.src.file_name().unwrap() == "a.txt")
            .unwrap();
        assert_eq!(outcome.status, ScrubStatus::Error);
        assert!(outcome.message.as_deref().unwrap().contains("backup exists"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
        assert_eq!(
            fs::read_to_string(root.join("a.txt.bak")).unwrap(),
            "previous-backup"
        );
    }

    #[test]
    fn test_output_dir_excluded_from_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        let out = root.join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::write(out.join("b.txt"), "already scrubbed").unwrap();

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        let sources: Vec<_> = outcomes
            .iter()
            .map(|o| o.src.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(sources.contains(&"a.txt".to_string()));
        assert!(!sources.contains(&"b.txt".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt")).unwrap();
        let out = dir.path().join("out");

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].src.file_name().unwrap(), "a.txt");
    }

    #[test]
    fn test_non_recursive_only_direct_children() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "x").unwrap();
        fs::write(root.join("sub/b.txt"), "y").unwrap();
        let out = dir.path().join("out");

        let options = RunOptions {
            recursive: false,
            ..copy_options(&out)
        };
        let pipeline = Pipeline::with_scrubbers(options, vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].src.file_name().unwrap(), "a.txt");
    }

    #[test]
    fn test_skip_dirs_not_descended() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("docs");
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.txt"), "x").unwrap();
        fs::write(root.join("a.txt"), "x").unwrap();
        let out = dir.path().join("out");

        let pipeline =
            Pipeline::with_scrubbers(copy_options(&out), vec![Box::new(UppercaseScrubber)]);
        let outcomes = pipeline.run(&[root]).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].src.file_name().unwrap(), "a.txt");
    }
}
