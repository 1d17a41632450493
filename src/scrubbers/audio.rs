//! Audio scrubber (feature `audio`)
//!
//! Tag removal works in place, so the source bytes are copied to the
//! destination first and every tag type found there is then stripped.

use std::path::Path;

use lofty::file::TaggedFileExt;
use tracing::debug;

use crate::config::ScrubOptions;
use crate::error::Result;
use crate::scrubbers::{has_extension, Scrubber};
use crate::utils::copy_bytes;

pub struct AudioScrubber;

impl Scrubber for AudioScrubber {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["mp3", "flac", "m4a", "ogg"])
    }

    fn scrub(&self, src: &Path, dst: &Path, _options: &ScrubOptions) -> Result<()> {
        copy_bytes(src, dst)?;

        let tagged = lofty::read_from_path(dst)?;
        let tag_types: Vec<_> = tagged.tags().iter().map(|tag| tag.tag_type()).collect();
        debug!(src = %src.display(), tags = tag_types.len(), "removing audio tags");

        for tag_type in tag_types {
            tag_type.remove_from_path(dst)?;
        }

        Ok(())
    }
}
