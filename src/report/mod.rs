//! Transfer report emission
//!
//! After a job completes, each destination root gets two side-car files:
//! `<dest>.mhl` (the machine-verifiable hash manifest) and `<dest>.pdf`
//! (the human-readable report). Emission failures are warnings - the bits
//! are already proven on disk at this point, so a report problem must not
//! fail the job.

pub mod mhl;
pub mod pdf;
pub mod types;

pub use types::{format_duration, JobResult};

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::offload::Offloader;

/// Write MHL and PDF side-cars next to every destination root
pub fn emit_reports(offloader: &Offloader, result: &JobResult) {
    for dest in &offloader.destinations {
        let mhl_path = sidecar_path(dest, "mhl");
        match mhl::write_mhl(&mhl_path, &offloader.files) {
            Ok(()) => info!(path = %mhl_path.display(), "MHL report written"),
            Err(err) => warn!(path = %mhl_path.display(), %err, "MHL generation failed"),
        }

        let pdf_path = sidecar_path(dest, "pdf");
        match pdf::write_pdf(&pdf_path, result, &offloader.config) {
            Ok(()) => info!(path = %pdf_path.display(), "PDF report written"),
            Err(err) => warn!(path = %pdf_path.display(), %err, "PDF generation failed"),
        }
    }
}

/// `/mnt/backup` -> `/mnt/backup.mhl` (appended, not replacing an extension)
fn sidecar_path(dest: &Path, ext: &str) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
