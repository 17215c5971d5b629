//! Serializable job outcome

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::offload::{FileRes, Offloader};

/// Final status of an offload job, emitted as the `--json` document and
/// surfaced by the PDF report.
#[derive(Clone, Debug, Serialize)]
pub struct JobResult {
    pub timestamp: DateTime<Utc>,
    pub source: PathBuf,
    pub destinations: Vec<PathBuf>,
    /// "success" or "failed"
    pub status: String,
    pub total_files: usize,
    pub total_bytes: u64,
    /// Human readable duration, e.g. "1m12.4s"
    pub duration: String,
    pub duration_ms: i64,
    pub speed_mbps: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRes>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl JobResult {
    /// Assemble the result record for a terminal job, success or not.
    pub(crate) fn assemble(
        config: &Config,
        offloader: Option<&Offloader>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        copied_bytes: u64,
        total_bytes: u64,
        error: Option<String>,
    ) -> Self {
        let elapsed = (end - start).to_std().unwrap_or_default();
        let secs = elapsed.as_secs_f64();
        let speed_mbps = if secs > 0.0 {
            copied_bytes as f64 / 1024.0 / 1024.0 / secs
        } else {
            0.0
        };

        let files = offloader.map(|o| o.files.clone()).unwrap_or_default();
        JobResult {
            timestamp: Utc::now(),
            source: config.source.clone(),
            destinations: config.destinations.clone(),
            status: if error.is_none() { "success" } else { "failed" }.to_string(),
            total_files: files.len(),
            total_bytes,
            duration: format_duration(elapsed),
            duration_ms: elapsed.as_millis() as i64,
            speed_mbps,
            files,
            error: error.unwrap_or_default(),
        }
    }
}

/// Render a duration as "750ms", "12.4s", "1m12.4s" or "1h2m3s"
pub fn format_duration(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs_f64();
    if total_secs < 1.0 {
        return format!("{}ms", elapsed.as_millis());
    }
    let hours = (total_secs / 3600.0) as u64;
    let minutes = ((total_secs % 3600.0) / 60.0) as u64;
    let seconds = total_secs % 60.0;
    if hours > 0 {
        format!("{}h{}m{:.0}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{:.1}s", minutes, seconds)
    } else {
        format!("{:.1}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_by_magnitude() {
        assert_eq!(format_duration(Duration::from_millis(750)), "750ms");
        assert_eq!(format_duration(Duration::from_secs_f64(12.42)), "12.4s");
        assert_eq!(format_duration(Duration::from_secs_f64(72.4)), "1m12.4s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h2m3s");
    }

    #[test]
    fn result_json_has_contract_field_names() {
        let config = Config {
            source: PathBuf::from("/card"),
            destinations: vec![PathBuf::from("/backup")],
            ..Config::default()
        };
        let start = Utc::now();
        let result = JobResult::assemble(&config, None, start, start, 0, 0, None);
        let json = serde_json::to_value(&result).unwrap();

        for field in [
            "timestamp",
            "source",
            "destinations",
            "status",
            "total_files",
            "total_bytes",
            "duration",
            "duration_ms",
            "speed_mbps",
        ] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(json["status"], "success");
        // Empty collections and errors are omitted
        assert!(json.get("files").is_none());
        assert!(json.get("error").is_none());

        let failed = JobResult::assemble(
            &config,
            None,
            start,
            start,
            0,
            0,
            Some("checksum mismatch".into()),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "checksum mismatch");
    }
}
