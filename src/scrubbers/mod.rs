//! Format-specific scrubbers
//!
//! Each scrubber claims files by extension and writes a sanitized copy of a
//! source file to a destination path. The set of scrubbers is fixed at
//! startup; the pipeline asks each in order and the first match wins.

use std::path::Path;

use crate::config::ScrubOptions;
use crate::error::Result;

pub mod image;
pub mod openxml;
pub mod pdf;
pub mod video;

#[cfg(feature = "audio")]
pub mod audio;

pub use self::image::ImageScrubber;
pub use self::openxml::OpenXmlScrubber;
pub use self::pdf::PdfScrubber;
pub use self::video::VideoScrubber;

#[cfg(feature = "audio")]
pub use self::audio::AudioScrubber;

/// A format sanitizer.
///
/// `scrub` must write a complete sanitized file to `dst` and leave `src`
/// untouched; the pipeline owns atomicity and stat preservation.
pub trait Scrubber {
    fn name(&self) -> &'static str;

    fn can_handle(&self, path: &Path) -> bool;

    fn scrub(&self, src: &Path, dst: &Path, options: &ScrubOptions) -> Result<()>;
}

/// The default scrubber set, in dispatch order.
pub fn default_scrubbers() -> Vec<Box<dyn Scrubber>> {
    #[allow(unused_mut)]
    let mut scrubbers: Vec<Box<dyn Scrubber>> = vec![
        Box::new(ImageScrubber),
        Box::new(PdfScrubber),
        Box::new(OpenXmlScrubber),
        Box::new(VideoScrubber),
    ];

    #[cfg(feature = "audio")]
    scrubbers.push(Box::new(AudioScrubber));

    scrubbers
}

/// True when `path` has one of `exts` as its extension, case-insensitively.
pub(crate) fn has_extension(path: &Path, exts: &[&str]) -> bool {
    match path.extension() {
        Some(ext) => exts.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}
