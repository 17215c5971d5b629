// Common utilities shared across the offload engine

pub mod binary;
pub mod hash;

// Re-exports for convenience
pub use binary::{printable_ascii_at, read_u32_be, read_u32_le};
pub use hash::{HashAlgorithm, HashResult, MultiHasher};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Shared constants - tuned for sequential media card reads
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB copy buffer
pub const POOL_CHUNK_SIZE: usize = 1024 * 1024; // 1MB pooled I/O chunks

// Header parsers never read past this prefix
pub const HEADER_READ_LIMIT: usize = 128 * 1024; // 128KB

/// Cooperative cancellation flag shared between a job and its workers.
///
/// Cloning yields another handle to the same flag. Tripping is one-way.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns `Err(Error::Cancelled)` once the flag has been tripped.
    /// Long-running loops call this at their natural boundaries.
    pub fn check(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(crate::error::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());

        other.cancel();
        assert!(flag.is_cancelled());
        assert!(flag.check().is_err());
    }
}
