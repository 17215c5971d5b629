//! Offload engine: verified fan-out copy
//!
//! The offloader copies a source tree (or single file) to one or more
//! destination roots in a single read pass, then proves the transfer with an
//! independent readback hash of the source and every replica.
//!
//! ```text
//! source ──read──► workers ──write──► destination 1
//!                     │     ──write──► destination 2
//!                     └─────update──► hash tap (write-path sanity)
//!
//! verify: re-read source + every replica from disk, compare digests
//! ```
//!
//! The hash computed while copying is never reused for verification - the
//! guarantee sold here is "bits on disk", so verification always re-reads
//! what the filesystem persisted.

pub mod copier;
pub mod types;
pub mod verify;
pub mod volumes;

pub use types::{DestCheck, DryRunReport, FileRes, ProgressInfo};
pub use volumes::{format_bytes, list_volumes, Volume};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use tracing::debug;

use crate::common::CancelFlag;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metadata::Metadata;

/// Drives the copy and verification passes for one job
pub struct Offloader {
    pub config: Config,
    pub source: PathBuf,
    pub destinations: Vec<PathBuf>,
    /// Per-file results, appended by the verify pass
    pub files: Vec<FileRes>,
    /// Metadata extracted during copy, keyed by rel_path, consumed by verify
    pub(crate) metadata_cache: Mutex<HashMap<String, Metadata>>,
}

impl Offloader {
    pub fn new(config: Config) -> Self {
        let source = config.source.clone();
        let destinations = config.destinations.clone();
        Offloader {
            config,
            source,
            destinations,
            files: Vec::new(),
            metadata_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Copy the source to every destination, streaming progress on `progress`.
    ///
    /// The progress sender is dropped (closing the channel) only after every
    /// worker has joined. Returns the first worker or walk error.
    pub fn copy(&self, cancel: &CancelFlag, progress: Sender<ProgressInfo>) -> Result<()> {
        copier::run_copy(self, cancel, progress)
    }

    /// Independent readback verification of source against every replica.
    ///
    /// Fail-fast: the first digest disagreement aborts with `Mismatch`.
    /// Appends a `FileRes` per verified file.
    pub fn verify(&mut self, cancel: &CancelFlag) -> Result<()> {
        verify::run_verify(self, cancel)
    }

    /// Simulate the copy: enumerate files, sum sizes, check that each
    /// destination volume can fit the transfer. Writes nothing.
    pub fn dry_run(&self) -> Result<DryRunReport> {
        let mut report = DryRunReport {
            source: self.source.clone(),
            ..DryRunReport::default()
        };

        let info = std::fs::metadata(&self.source).map_err(|e| Error::io(&self.source, e))?;
        if info.is_dir() {
            for entry in copier::walk_source(&self.source) {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let meta = entry.metadata().map_err(|e| {
                    Error::io(entry.path(), std::io::Error::other(e))
                })?;
                report.files.push(FileRes {
                    rel_path: rel_path_string(entry.path().strip_prefix(&self.source).unwrap_or(entry.path())),
                    size: meta.len(),
                    mtime: mtime_utc(&meta),
                    hash: Default::default(),
                    metadata: None,
                });
                report.total_size += meta.len();
            }
        } else {
            report.files.push(FileRes {
                rel_path: file_name_string(&self.source),
                size: info.len(),
                mtime: mtime_utc(&info),
                hash: Default::default(),
                metadata: None,
            });
            report.total_size = info.len();
        }

        for dest in &self.destinations {
            let free = volumes::free_space(dest);
            report.destinations.push(DestCheck {
                path: dest.clone(),
                free_space: free,
                // Unknown free space stays optimistic; the copy will surface
                // the real ENOSPC if it comes to that
                can_fit: free == 0 || free > report.total_size,
            });
        }

        debug!(
            files = report.files.len(),
            total = report.total_size,
            "dry run complete"
        );
        Ok(report)
    }
}

/// Destination path for a single-file source: an existing directory gets the
/// source file name joined on, anything else is taken as the target file path.
pub(crate) fn single_file_dest(dest: &Path, source: &Path) -> PathBuf {
    if dest.is_dir() {
        if let Some(name) = source.file_name() {
            return dest.join(name);
        }
    }
    dest.to_path_buf()
}

/// Relative path normalized to forward slashes, for `FileRes` and cache keys
pub(crate) fn rel_path_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn file_name_string(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

pub(crate) fn mtime_utc(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rel_paths_use_forward_slashes() {
        let rel = Path::new("A001").join("sub").join("clip.mov");
        assert_eq!(rel_path_string(&rel), "A001/sub/clip.mov");
    }

    #[test]
    fn single_file_dest_joins_into_directories() {
        let dir = tempfile::tempdir().unwrap();
        let source = Path::new("/card/hello.txt");

        assert_eq!(
            single_file_dest(dir.path(), source),
            dir.path().join("hello.txt")
        );
        let explicit = dir.path().join("renamed.txt");
        assert_eq!(single_file_dest(&explicit, source), explicit);
    }

    #[test]
    fn dry_run_counts_files_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir_all(src.join("A001")).unwrap();
        fs::write(src.join("A001/clip.mov"), vec![0u8; 1024]).unwrap();
        fs::write(src.join(".DS_Store"), b"junk").unwrap();
        let dst = dir.path().join("backup");

        let config = Config {
            source: src.clone(),
            destinations: vec![dst.clone()],
            dry_run: true,
            ..Config::default()
        };
        let report = Offloader::new(config).dry_run().unwrap();

        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].rel_path, "A001/clip.mov");
        assert_eq!(report.total_size, 1024);
        assert_eq!(report.destinations.len(), 1);
        assert!(!dst.exists(), "dry run must not create destinations");
    }
}
