//! Media Hash List (MHL) side-car writer
//!
//! MHL v1.0: a UTF-8 XML manifest with one `hash` element per file,
//! carrying the relative filename, size, RFC3339 modification date and one
//! element per computed digest. The v1.0 vocabulary covers `xxhash64`,
//! `md5` and `sha1`; digests outside it (SHA-256) travel in the JSON result
//! and the PDF report instead.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <hashlist version="1.0">
//!   <hash>
//!     <filename>A001/clip.mov</filename>
//!     <size>104857600</size>
//!     <lastmodificationdate>2024-01-15T10:00:00Z</lastmodificationdate>
//!     <xxhash64>a1b2c3d4e5f60718</xxhash64>
//!   </hash>
//! </hashlist>
//! ```

use std::fs;
use std::path::Path;

use chrono::SecondsFormat;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::error::{Error, Result};
use crate::offload::FileRes;

/// Write an MHL document for the given file list
pub fn write_mhl(path: &Path, files: &[FileRes]) -> Result<()> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::Report(e.to_string()))?;

    let mut root = BytesStart::new("hashlist");
    root.push_attribute(("version", "1.0"));
    writer
        .write_event(Event::Start(root))
        .map_err(|e| Error::Report(e.to_string()))?;

    for file in files {
        writer
            .write_event(Event::Start(BytesStart::new("hash")))
            .map_err(|e| Error::Report(e.to_string()))?;

        text_element(&mut writer, "filename", &file.rel_path)?;
        text_element(&mut writer, "size", &file.size.to_string())?;
        text_element(
            &mut writer,
            "lastmodificationdate",
            &file.mtime.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        if !file.hash.xxhash64.is_empty() {
            text_element(&mut writer, "xxhash64", &file.hash.xxhash64)?;
        }
        if !file.hash.md5.is_empty() {
            text_element(&mut writer, "md5", &file.hash.md5)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("hash")))
            .map_err(|e| Error::Report(e.to_string()))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("hashlist")))
        .map_err(|e| Error::Report(e.to_string()))?;

    let mut document = writer.into_inner();
    document.push(b'\n');
    fs::write(path, document).map_err(|e| Error::io(path, e))?;

    debug!(path = %path.display(), entries = files.len(), "MHL written");
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(|e| Error::Report(e.to_string()))?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(|e| Error::Report(e.to_string()))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| Error::Report(e.to_string()))?;
    Ok(())
}
