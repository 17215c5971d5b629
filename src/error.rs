//! Error types for the offload engine

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during an offload
#[derive(Debug)]
pub enum Error {
    /// Contradictory or missing configuration, surfaced before any work
    InvalidConfig(String),
    /// Filesystem operation failed (stat/open/create/read/write/mkdir)
    Io { path: PathBuf, source: io::Error },
    /// Cooperative abort via the job's cancellation flag
    Cancelled,
    /// A header parser rejected the file prefix
    InvalidHeader(String),
    /// Verification digest disagreement for a (source, destination) pair
    Mismatch { rel_path: String, dest: PathBuf },
    /// External metadata tool failed or produced unusable output
    Metadata(String),
    /// MHL or PDF side-car emission failed (logged, never fatal to a job)
    Report(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// True for the cooperative-abort error, which maps to the Cancelled
    /// job status rather than Failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Error::Io { path, source } => write!(f, "I/O error on {}: {}", path.display(), source),
            Error::Cancelled => write!(f, "cancelled"),
            Error::InvalidHeader(msg) => write!(f, "invalid header: {}", msg),
            Error::Mismatch { rel_path, dest } => {
                write!(f, "checksum mismatch: {} vs {}", rel_path, dest.display())
            }
            Error::Metadata(msg) => write!(f, "metadata extraction error: {}", msg),
            Error::Report(msg) => write!(f, "report generation error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io { path: PathBuf::new(), source: err }
    }
}
