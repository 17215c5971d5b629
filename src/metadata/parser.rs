//! Header parser trait and extension registry
//!
//! Each parser is a self-contained decoder over a bounded file prefix; the
//! registry maps a lowercased extension to at most one parser and is
//! populated once at startup. Reads never go past `HEADER_READ_LIMIT` - the
//! prefix is materialized up front and parsers index into it.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use tracing::trace;

use crate::common::HEADER_READ_LIMIT;
use crate::error::{Error, Result};
use crate::metadata::parsers;
use crate::metadata::Metadata;

/// Technical attributes decoded from a file header.
///
/// Wider than the public `Metadata` record: parsers surface raw fields
/// (width/height, serial) that the conversion flattens.
#[derive(Clone, Debug, Default)]
pub struct MediaMetadata {
    /// Which decoder produced this ("r3d_header", ...)
    pub source: &'static str,
    pub format: String,
    pub codec: String,
    pub resolution: String,
    pub width: u32,
    pub height: u32,
    pub fps: String,
    pub duration: String,
    pub timecode: String,
    pub camera_id: String,
    pub reel_number: String,
    pub clip_name: String,
    pub take_number: String,
    pub serial_number: String,
}

impl MediaMetadata {
    /// Flatten into the public metadata record
    pub fn to_metadata(&self) -> Metadata {
        Metadata {
            format: self.format.clone(),
            codec: self.codec.clone(),
            resolution: self.resolution.clone(),
            frame_rate: self.fps.clone(),
            duration: self.duration.clone(),
            timecode: self.timecode.clone(),
            bitrate: String::new(),
            camera_id: self.camera_id.clone(),
            reel_number: self.reel_number.clone(),
            clip_name: self.clip_name.clone(),
            take: self.take_number.clone(),
        }
    }
}

/// A format-specific header decoder
pub trait HeaderParser: Send + Sync {
    /// Parser name for logging
    fn name(&self) -> &'static str;

    /// True if this parser handles the (lowercased, dotted) extension
    fn can_handle(&self, ext: &str) -> bool;

    /// Decode a bounded header prefix. `header` is at most
    /// `HEADER_READ_LIMIT` bytes; shorter when the file is smaller.
    fn parse(&self, header: &[u8]) -> Result<MediaMetadata>;
}

static REGISTRY: OnceLock<Vec<Box<dyn HeaderParser>>> = OnceLock::new();

fn registry() -> &'static [Box<dyn HeaderParser>] {
    REGISTRY.get_or_init(parsers::all)
}

/// Find the parser registered for an extension (with leading dot), if any
pub fn parser_for(ext: &str) -> Option<&'static dyn HeaderParser> {
    let ext = ext.to_lowercase();
    registry().iter().find(|p| p.can_handle(&ext)).map(|p| p.as_ref())
}

/// Attempt to decode metadata from a file header.
///
/// Returns `Ok(None)` when no parser is registered for the extension - a
/// recoverable signal, not an error. Parser rejections (`InvalidHeader`)
/// and I/O failures are errors the caller treats as non-fatal.
pub fn parse_header(path: &Path) -> Result<Option<MediaMetadata>> {
    let ext = match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => return Ok(None),
    };
    let Some(parser) = parser_for(&ext) else {
        trace!(path = %path.display(), ext, "no header parser for extension");
        return Ok(None);
    };

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut header = Vec::with_capacity(HEADER_READ_LIMIT.min(64 * 1024));
    file.take(HEADER_READ_LIMIT as u64)
        .read_to_end(&mut header)
        .map_err(|e| Error::io(path, e))?;

    trace!(parser = parser.name(), bytes = header.len(), "parsing header");
    parser.parse(&header).map(Some)
}
