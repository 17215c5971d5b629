//! cartage - professional media offload engine
//!
//! Copies a source tree (typically a camera card) to one or more
//! destinations in a single fan-out read pass, verifies bit-integrity with
//! an independent readback hash of source and every replica, extracts
//! technical metadata from media file headers, and emits auditable transfer
//! reports (MHL + PDF).
//!
//! The engine is headless: the `Queue`/`Job`/`Offloader` API below is the
//! whole surface, and the bundled CLI is just one consumer of it.

pub mod common;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod metadata;
pub mod offload;
pub mod report;

pub use common::{CancelFlag, HashAlgorithm, HashResult, MultiHasher};
pub use config::Config;
pub use error::{Error, Result};
pub use job::{Job, JobStatus, JobUpdate, Queue, QueueState};
pub use metadata::{Metadata, MetadataMode};
pub use offload::{FileRes, Offloader, ProgressInfo};
pub use report::JobResult;
