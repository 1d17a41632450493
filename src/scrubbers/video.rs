//! Video scrubber
//!
//! Re-muxes the container through an external `ffmpeg` process: streams are
//! copied without re-encoding while global metadata, chapters and common
//! per-stream tags are dropped. `ffmpeg` must be on PATH.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::config::ScrubOptions;
use crate::error::{Error, Result};
use crate::scrubbers::{has_extension, Scrubber};

pub struct VideoScrubber;

impl Scrubber for VideoScrubber {
    fn name(&self) -> &'static str {
        "video"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["mp4", "mov", "m4v", "mkv", "avi", "webm"])
    }

    fn scrub(&self, src: &Path, dst: &Path, _options: &ScrubOptions) -> Result<()> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| {
            Error::ExternalTool(
                "ffmpeg not found (required to scrub video files); install ffmpeg and try again"
                    .to_string(),
            )
        })?;

        debug!(src = %src.display(), "re-muxing video through ffmpeg");

        let status = Command::new(ffmpeg)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-y")
            .arg("-i")
            .arg(src)
            .args(["-map", "0"])
            .args(["-c", "copy"])
            .args(["-map_metadata", "-1"])
            .args(["-map_chapters", "-1"])
            // Suppress muxer-generated tags like encoder=Lavf... where possible.
            .args(["-fflags", "+bitexact"])
            .args(["-flags", "+bitexact"])
            .args(["-metadata", "title="])
            .args(["-metadata", "comment="])
            .args(["-metadata", "artist="])
            .args(["-metadata", "album="])
            .args(["-metadata", "date="])
            .args(["-metadata", "creation_time="])
            .args(["-metadata", "encoder="])
            .args(["-metadata:s", "creation_time="])
            .args(["-metadata:s", "encoder="])
            // The destination is a temporary file without a meaningful
            // extension; name the muxer from the source container.
            .args(["-f", muxer_for(src)])
            .arg(dst)
            .status()?;

        if !status.success() {
            return Err(Error::ExternalTool(format!(
                "ffmpeg exited with {} while scrubbing {}",
                status,
                src.display()
            )));
        }

        Ok(())
    }
}

/// ffmpeg muxer name for a source container extension.
fn muxer_for(src: &Path) -> &'static str {
    let ext = src
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mov" => "mov",
        "mkv" => "matroska",
        "avi" => "avi",
        "webm" => "webm",
        _ => "mp4",
    }
}
