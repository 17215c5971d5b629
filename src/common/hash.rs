// Streaming hash sink for offload verification
//
// A single read pass can feed any subset of the supported algorithms
// simultaneously; dual-hash mode records the fast xxHash64 fingerprint and
// the industry-standard MD5 in one pass.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::Xxh64;

use crate::error::{Error, Result};

const HASH_BUFFER_SIZE: usize = 4 * 1024 * 1024;

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Supported hash algorithms
/// - xxHash64: fast non-cryptographic fingerprint, the default for offloads
/// - MD5: legacy, still the interchange standard on many delivery specs
/// - SHA-256: NIST approved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum HashAlgorithm {
    Xxhash64,
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Parse algorithm name from string (case-insensitive)
    pub fn from_str(algorithm: &str) -> Result<Self> {
        match algorithm.trim().to_lowercase().as_str() {
            "xxhash64" | "xxh64" => Ok(HashAlgorithm::Xxhash64),
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(Error::InvalidConfig(format!(
                "unsupported hash algorithm: '{}' (supported: xxhash64, md5, sha256)",
                algorithm
            ))),
        }
    }

    /// Canonical lowercase name, as used in reports and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Xxhash64 => "xxhash64",
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Hash Result
// =============================================================================

/// Digests produced by one finalized sink, lowercase hex, empty when the
/// algorithm was not enabled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub xxhash64: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub md5: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,
}

impl HashResult {
    /// Digest for the primary algorithm, empty if it was not computed
    pub fn primary(&self, algo: HashAlgorithm) -> &str {
        match algo {
            HashAlgorithm::Xxhash64 => &self.xxhash64,
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xxhash64.is_empty() && self.md5.is_empty() && self.sha256.is_empty()
    }
}

impl std::fmt::Display for HashResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (name, value) in [
            ("xxhash64", &self.xxhash64),
            ("md5", &self.md5),
            ("sha256", &self.sha256),
        ] {
            if value.is_empty() {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

// =============================================================================
// Streaming Multi-Hasher
// =============================================================================

/// A streaming sink that feeds every enabled algorithm per chunk.
///
/// Constructing with zero algorithms is valid and yields an empty
/// `HashResult` (used as an inert sink). `finalize` is terminal.
pub struct MultiHasher {
    xxh: Option<Xxh64>,
    md5: Option<md5::Context>,
    sha: Option<Sha256>,
}

impl MultiHasher {
    /// Create a sink for the given algorithms; duplicates are harmless
    pub fn new(algorithms: &[HashAlgorithm]) -> Self {
        let mut hasher = MultiHasher { xxh: None, md5: None, sha: None };
        for algo in algorithms {
            match algo {
                HashAlgorithm::Xxhash64 => hasher.xxh = Some(Xxh64::new(0)),
                HashAlgorithm::Md5 => hasher.md5 = Some(md5::Context::new()),
                HashAlgorithm::Sha256 => hasher.sha = Some(Sha256::new()),
            }
        }
        hasher
    }

    /// Sink for a single algorithm
    pub fn single(algorithm: HashAlgorithm) -> Self {
        Self::new(&[algorithm])
    }

    /// Update every enabled hash with more data
    pub fn update(&mut self, data: &[u8]) {
        if let Some(h) = self.xxh.as_mut() {
            h.update(data);
        }
        if let Some(h) = self.md5.as_mut() {
            h.consume(data);
        }
        if let Some(h) = self.sha.as_mut() {
            h.update(data);
        }
    }

    /// Finalize and return every digest as lowercase hex
    pub fn finalize(self) -> HashResult {
        let mut result = HashResult::default();
        if let Some(h) = self.xxh {
            result.xxhash64 = format!("{:016x}", h.digest());
        }
        if let Some(h) = self.md5 {
            result.md5 = format!("{:x}", h.compute());
        }
        if let Some(h) = self.sha {
            result.sha256 = hex::encode(h.finalize());
        }
        result
    }
}

// =============================================================================
// File Hashing
// =============================================================================

/// Hash a file from disk with the given algorithms (buffered, single pass)
pub fn hash_file(path: &Path, algorithms: &[HashAlgorithm]) -> Result<HashResult> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = MultiHasher::new(algorithms);

    loop {
        let buf = reader.fill_buf().map_err(|e| Error::io(path, e))?;
        let len = buf.len();
        if len == 0 {
            break;
        }
        hasher.update(buf);
        reader.consume(len);
    }

    Ok(hasher.finalize())
}
