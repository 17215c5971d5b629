// Result and progress records for the offload engine

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::HashResult;
use crate::metadata::Metadata;

/// Coalesced progress sample emitted on the progress channel.
///
/// Byte counts use source-byte semantics: each source byte counts once no
/// matter how many destinations receive it.
#[derive(Clone, Debug, Default)]
pub struct ProgressInfo {
    pub total_bytes: u64,
    pub copied_bytes: u64,
    pub current_file: String,
    /// Bytes per second since the copy started
    pub speed: f64,
}

/// Per-file record of a verified transfer.
///
/// Appended during the verify pass only; `hash` always comes from the
/// source readback, never from the in-memory copy-time digest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRes {
    /// Path relative to the source root, forward-slash normalized
    pub rel_path: String,
    /// Source size in bytes at walk time
    pub size: u64,
    /// Source modification time
    pub mtime: DateTime<Utc>,
    /// Source readback digests, populated during verify
    pub hash: HashResult,
    /// Best-effort technical metadata; None when mode is off or extraction failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Free-space check for one destination during a dry run
#[derive(Clone, Debug, Serialize)]
pub struct DestCheck {
    pub path: PathBuf,
    pub free_space: u64,
    pub can_fit: bool,
}

/// Outcome of a dry run: what would be copied and whether it fits
#[derive(Clone, Debug, Default, Serialize)]
pub struct DryRunReport {
    pub source: PathBuf,
    pub files: Vec<FileRes>,
    pub total_size: u64,
    pub destinations: Vec<DestCheck>,
}
