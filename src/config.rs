//! Per-job configuration
//!
//! A `Config` is built once by the CLI layer, validated, and then read-only
//! for the lifetime of the job that owns it. Retrying a job means cloning
//! the config into a fresh job (typically with `skip_existing` set).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::{HashAlgorithm, DEFAULT_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::metadata::MetadataMode;

/// Configuration for one offload job
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Source file or directory (camera card root)
    pub source: PathBuf,
    /// One or more destination roots for the fan-out copy
    pub destinations: Vec<PathBuf>,

    /// Primary hash algorithm
    pub algorithm: HashAlgorithm,
    /// Record both xxHash64 and MD5 in a single read pass
    pub dual_hash: bool,

    /// Skip the independent readback verification pass
    pub no_verify: bool,
    /// Skip destinations that already hold a same-size regular file
    pub skip_existing: bool,

    /// Copy buffer size in bytes
    pub buffer_size: usize,
    /// Number of parallel file copies (>= 1)
    pub concurrency: usize,

    /// Metadata extraction strategy
    pub metadata_mode: MetadataMode,

    /// Simulate without writing anything but reports
    pub dry_run: bool,

    /// Report metadata
    pub job_name: String,
    pub camera: String,
    pub reel: String,

    /// Output options (CLI consumer concerns, carried for report context)
    pub json_output: bool,
    pub quiet: bool,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destinations: Vec::new(),
            algorithm: HashAlgorithm::Xxhash64,
            dual_hash: false,
            no_verify: false,
            skip_existing: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            concurrency: 4,
            metadata_mode: MetadataMode::Hybrid,
            dry_run: false,
            job_name: String::new(),
            camera: String::new(),
            reel: String::new(),
            json_output: false,
            quiet: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Algorithms computed during copy and verify. Dual-hash always means
    /// xxHash64 + MD5; otherwise just the primary.
    pub fn hash_algorithms(&self) -> Vec<HashAlgorithm> {
        if self.dual_hash {
            vec![HashAlgorithm::Xxhash64, HashAlgorithm::Md5]
        } else {
            vec![self.algorithm]
        }
    }

    /// Validate configuration before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("source is required".into()));
        }
        if self.destinations.is_empty() {
            return Err(Error::InvalidConfig("at least one destination is required".into()));
        }
        if !self.source.exists() {
            return Err(Error::InvalidConfig(format!(
                "source '{}' does not exist",
                self.source.display()
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig("buffer size must be non-zero".into()));
        }
        Ok(())
    }
}
