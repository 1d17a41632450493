//! OpenXML (docx/xlsx/pptx) package rewriter
//!
//! Re-archives the ZIP package without the document-property parts and keeps
//! the two control parts (`_rels/.rels`, `[Content_Types].xml`) consistent
//! with the omission. Entries keep their enumeration order and permission
//! bits; compression is forced to deflate and timestamps are normalized to
//! the ZIP epoch unless disabled.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use tracing::{debug, warn};
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use crate::config::ScrubOptions;
use crate::error::Result;
use crate::scrubbers::{has_extension, Scrubber};

/// Document-property parts dropped from the archive.
const REMOVE_PARTS: &[&str] = &[
    "docProps/core.xml",
    "docProps/app.xml",
    "docProps/custom.xml",
    "docProps/thumbnail.jpeg",
    "docProps/thumbnail.png",
];

const RELS_PART: &str = "_rels/.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Relationship types whose declarations are dropped from `_rels/.rels`.
const DROP_REL_TYPES: &[&str] = &[
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties",
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties",
];

/// Relationship targets whose declarations are dropped from `_rels/.rels`.
const DROP_REL_TARGETS: &[&str] = &[
    "docProps/core.xml",
    "docProps/app.xml",
    "docProps/custom.xml",
];

/// Part names whose overrides are dropped from `[Content_Types].xml`.
const DROP_OVERRIDE_PARTS: &[&str] = &[
    "/docProps/core.xml",
    "/docProps/app.xml",
    "/docProps/custom.xml",
];

pub struct OpenXmlScrubber;

impl Scrubber for OpenXmlScrubber {
    fn name(&self) -> &'static str {
        "openxml"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["docx", "xlsx", "pptx"])
    }

    fn scrub(&self, src: &Path, dst: &Path, options: &ScrubOptions) -> Result<()> {
        let mut archive = ZipArchive::new(BufReader::new(File::open(src)?))?;
        let mut writer = ZipWriter::new(BufWriter::new(File::create(dst)?));

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                continue;
            }
            if REMOVE_PARTS.contains(&name.as_str()) {
                debug!(part = %name, "dropping document property part");
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;

            if name == RELS_PART {
                data = rewrite_control_part(&name, data, drops_relationship);
            } else if name == CONTENT_TYPES_PART {
                data = rewrite_control_part(&name, data, drops_override);
            }

            let timestamp = if options.normalize_zip_timestamps {
                // 1980-01-01T00:00:00, the earliest representable ZIP time.
                DateTime::default()
            } else {
                entry.last_modified().unwrap_or_default()
            };

            let mut entry_options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(timestamp);
            if let Some(mode) = entry.unix_mode() {
                entry_options = entry_options.unix_permissions(mode);
            }

            writer.start_file(name, entry_options)?;
            writer.write_all(&data)?;
        }

        let mut out = writer.finish()?;
        out.flush()?;
        Ok(())
    }
}

/// Rewrites a control part, dropping elements `dropped` claims. Malformed
/// XML passes through unmodified; the dangling references that leaves behind
/// are a documented residual, not an abort.
fn rewrite_control_part(
    name: &str,
    data: Vec<u8>,
    dropped: fn(&BytesStart) -> quick_xml::Result<bool>,
) -> Vec<u8> {
    match drop_elements(&data, dropped) {
        Ok(rewritten) => rewritten,
        Err(err) => {
            warn!(part = %name, %err, "control part is not well-formed XML; passing it through");
            data
        }
    }
}

/// Streams XML events from `data` to a fresh buffer, skipping every element
/// (empty or start..end) for which `dropped` returns true.
fn drop_elements(
    data: &[u8],
    dropped: fn(&BytesStart) -> quick_xml::Result<bool>,
) -> quick_xml::Result<Vec<u8>> {
    let mut reader = Reader::from_reader(data);
    let mut writer = Writer::new(Vec::with_capacity(data.len()));
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Empty(e) => {
                if !dropped(&e)? {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Start(e) => {
                if dropped(&e)? {
                    let end = e.name().as_ref().to_vec();
                    let mut skipped = Vec::new();
                    reader.read_to_end_into(QName(&end), &mut skipped)?;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// True for a `Relationship` element declaring a dropped type or target.
fn drops_relationship(element: &BytesStart) -> quick_xml::Result<bool> {
    if element.local_name().as_ref() != b"Relationship" {
        return Ok(false);
    }

    for attr in element.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.local_name().as_ref() {
            b"Type" if DROP_REL_TYPES.contains(&value.as_ref()) => return Ok(true),
            b"Target" if DROP_REL_TARGETS.contains(&value.as_ref()) => return Ok(true),
            _ => {}
        }
    }

    Ok(false)
}

/// True for an `Override` element naming a dropped part.
fn drops_override(element: &BytesStart) -> quick_xml::Result<bool> {
    if element.local_name().as_ref() != b"Override" {
        return Ok(false);
    }

    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == b"PartName"
            && DROP_OVERRIDE_PARTS.contains(&attr.unescape_value()?.as_ref())
        {
            return Ok(true);
        }
    }

    Ok(false)
}
