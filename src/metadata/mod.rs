//! Technical metadata extraction
//!
//! Header-first strategy: a cheap fixed-offset header decode primes the OS
//! page cache right before the copy stream starts, and the slow external
//! tools only run when the header route comes up short. Extraction is always
//! best-effort - no metadata failure may abort a transfer.

pub mod exiftool;
pub mod parser;
pub mod parsers;

pub use parser::{parse_header, HeaderParser, MediaMetadata};

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

// Extensions that trigger any extraction at all
const KNOWN_EXTENSIONS: &[&str] =
    &["mov", "mp4", "mxf", "mkv", "avi", "r3d", "braw", "crm", "ari"];

/// Extraction strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum MetadataMode {
    /// No extraction
    Off,
    /// Header parsers only
    Header,
    /// External tool only
    Exiftool,
    /// Header first, external tool when the header route is incomplete
    #[default]
    Hybrid,
}

impl MetadataMode {
    pub fn name(&self) -> &'static str {
        match self {
            MetadataMode::Off => "off",
            MetadataMode::Header => "header",
            MetadataMode::Exiftool => "exiftool",
            MetadataMode::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for MetadataMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Technical attributes of a media file. Any field may be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub codec: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resolution: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub frame_rate: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub duration: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timecode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bitrate: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub camera_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reel_number: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub clip_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub take: String,
}

/// Extract metadata from a media file according to `mode`.
///
/// Returns `None` for mode `off`, for unknown extensions, and for every
/// extraction failure. Failures are logged at debug level and never
/// propagate - a transfer must not abort because a header was odd or an
/// external tool is missing.
pub fn extract(path: &Path, mode: MetadataMode) -> Option<Metadata> {
    if mode == MetadataMode::Off {
        return None;
    }

    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if !KNOWN_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }

    // Fast path: fixed-offset header decode
    if matches!(mode, MetadataMode::Header | MetadataMode::Hybrid) {
        match parse_header(path) {
            Ok(Some(media)) => {
                let meta = media.to_metadata();
                if mode == MetadataMode::Header {
                    return Some(meta);
                }
                // Hybrid: good enough means resolution and frame rate known
                if !meta.resolution.is_empty() && !meta.frame_rate.is_empty() {
                    return Some(meta);
                }
            }
            Ok(None) => {}
            Err(err) => {
                debug!(path = %path.display(), %err, "header parse failed");
            }
        }
        if mode == MetadataMode::Header {
            return None;
        }
    }

    // Slow path: external tools
    match exiftool::extract_exiftool(path) {
        Ok(meta) => return Some(meta),
        Err(err) => debug!(path = %path.display(), %err, "exiftool extraction failed"),
    }
    match exiftool::extract_ffprobe(path) {
        Ok(meta) => Some(meta),
        Err(err) => {
            debug!(path = %path.display(), %err, "ffprobe extraction failed");
            None
        }
    }
}
