//! Job lifecycle
//!
//! A `Job` is a single offload request driving the staged pipeline
//! `Pending → Running → Copying → Verifying → Completed`; any stage can land
//! in `Failed` or `Cancelled`. Observable state (status, counters, result)
//! lives behind a mutex so queue snapshots and UI reads never block a
//! running transfer. A job is never reused: a retry is a new job cloned
//! from the config.

pub mod queue;

pub use queue::{Queue, QueueState};

use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Sender};
use tracing::{debug, info, warn};

use crate::common::CancelFlag;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::offload::{Offloader, ProgressInfo};
use crate::report;
use crate::report::JobResult;

/// Job lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Copying,
    Verifying,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Copying => "Copying",
            JobStatus::Verifying => "Verifying",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// Message sent to the caller-provided update channel as a job progresses
#[derive(Clone, Debug)]
pub struct JobUpdate {
    pub job_id: String,
    pub stage: JobStatus,
    pub progress: Option<ProgressInfo>,
    /// Human readable status line
    pub message: String,
    pub finished: bool,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    total_bytes: u64,
    copied_bytes: u64,
    speed: f64,
    result: Option<JobResult>,
    error: Option<String>,
}

/// A single offload request. Cloning yields another handle to the same job.
#[derive(Clone)]
pub struct Job {
    pub id: String,
    pub config: Config,
    state: Arc<Mutex<JobState>>,
    cancel: CancelFlag,
}

impl Job {
    pub fn new(config: Config) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Job {
            id: format!("job-{}", nanos),
            config,
            state: Arc::new(Mutex::new(JobState {
                status: JobStatus::Pending,
                start_time: None,
                end_time: None,
                total_bytes: 0,
                copied_bytes: 0,
                speed: 0.0,
                result: None,
                error: None,
            })),
            cancel: CancelFlag::new(),
        }
    }

    /// Trip the cancellation flag. Non-blocking; the runner observes it at
    /// the next ordered check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().unwrap().status
    }

    pub fn result(&self) -> Option<JobResult> {
        self.state.lock().unwrap().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().unwrap().error.clone()
    }

    /// Byte counters and throughput as last reported by the copy stage:
    /// `(copied_bytes, total_bytes, bytes_per_second)`
    pub fn progress(&self) -> (u64, u64, f64) {
        let state = self.state.lock().unwrap();
        (state.copied_bytes, state.total_bytes, state.speed)
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().end_time
    }

    fn set_status(&self, status: JobStatus) {
        self.state.lock().unwrap().status = status;
    }

    fn send_stage(&self, updates: &Sender<JobUpdate>, stage: JobStatus, message: &str) {
        self.set_status(stage);
        updates
            .send(JobUpdate {
                job_id: self.id.clone(),
                stage,
                progress: None,
                message: message.to_string(),
                finished: false,
            })
            .ok();
    }

    /// Execute the job, blocking until it reaches a terminal state.
    ///
    /// Stage changes and progress are forwarded on `updates`. A `JobResult`
    /// is assembled on every terminal path, success or not.
    pub fn run(&self, updates: &Sender<JobUpdate>) {
        {
            let mut state = self.state.lock().unwrap();
            state.start_time = Some(Utc::now());
            state.status = JobStatus::Running;
        }
        info!(job = %self.id, source = %self.config.source.display(), "job started");

        if self.cancel.is_cancelled() {
            self.finish(updates, None, Err(Error::Cancelled));
            return;
        }

        // 1. COPY
        self.send_stage(updates, JobStatus::Copying, "Copying...");
        let mut offloader = Offloader::new(self.config.clone());
        let (progress_tx, progress_rx) = bounded::<ProgressInfo>(100);

        let copy_result = thread::scope(|scope| {
            let offloader = &offloader;
            let handle = scope.spawn(move || offloader.copy(&self.cancel, progress_tx));

            // Drain progress until the copy drops its sender; the channel
            // close is sequenced after every worker has joined
            for progress in progress_rx.iter() {
                {
                    let mut state = self.state.lock().unwrap();
                    state.total_bytes = progress.total_bytes;
                    state.copied_bytes = progress.copied_bytes;
                    state.speed = progress.speed;
                }
                updates
                    .send(JobUpdate {
                        job_id: self.id.clone(),
                        stage: JobStatus::Copying,
                        progress: Some(progress),
                        message: "Copying...".to_string(),
                        finished: false,
                    })
                    .ok();
            }

            match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        if let Err(err) = copy_result {
            self.finish(updates, Some(&offloader), Err(err));
            return;
        }
        if self.cancel.is_cancelled() {
            self.finish(updates, Some(&offloader), Err(Error::Cancelled));
            return;
        }

        // 2. VERIFY
        if !self.config.no_verify {
            self.send_stage(updates, JobStatus::Verifying, "Verifying...");
            if let Err(err) = offloader.verify(&self.cancel) {
                self.finish(updates, Some(&offloader), Err(err));
                return;
            }
        }

        // 3. COMPLETE & REPORT
        self.finish(updates, Some(&offloader), Ok(()));
    }

    /// Terminal bookkeeping: set status, assemble the result, emit reports
    /// on success, send the final update.
    fn finish(&self, updates: &Sender<JobUpdate>, offloader: Option<&Offloader>, outcome: Result<()>) {
        let end = Utc::now();
        let (status, error_str) = match &outcome {
            Ok(()) => (JobStatus::Completed, None),
            Err(err) if err.is_cancelled() => (JobStatus::Cancelled, Some(err.to_string())),
            Err(err) => (JobStatus::Failed, Some(err.to_string())),
        };

        let result = {
            let mut state = self.state.lock().unwrap();
            state.end_time = Some(end);
            state.status = status;
            state.error = error_str.clone();

            let result = JobResult::assemble(
                &self.config,
                offloader,
                state.start_time.unwrap_or(end),
                end,
                state.copied_bytes,
                state.total_bytes,
                error_str.clone(),
            );
            state.result = Some(result.clone());
            result
        };

        match status {
            JobStatus::Completed => {
                info!(job = %self.id, files = result.total_files, "job completed");
                if let Some(offloader) = offloader {
                    // Reports come strictly after verify success; failures
                    // here are warnings, never job failures
                    report::emit_reports(offloader, &result);
                }
            }
            JobStatus::Cancelled => warn!(job = %self.id, "job cancelled"),
            _ => warn!(job = %self.id, error = ?error_str, "job failed"),
        }

        let message = match status {
            JobStatus::Completed => "Done!".to_string(),
            JobStatus::Cancelled => "Cancelled".to_string(),
            _ => format!("Failed: {}", error_str.as_deref().unwrap_or("unknown error")),
        };
        updates
            .send(JobUpdate {
                job_id: self.id.clone(),
                stage: status,
                progress: None,
                message,
                finished: true,
            })
            .ok();
        debug!(job = %self.id, %status, "job finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataMode;
    use std::fs;
    use std::path::Path;

    pub(crate) fn job_config(src: &Path, dst: &Path) -> Config {
        Config {
            source: src.to_path_buf(),
            destinations: vec![dst.to_path_buf()],
            metadata_mode: MetadataMode::Off,
            ..Config::default()
        }
    }

    fn drain(updates: crossbeam_channel::Receiver<JobUpdate>) -> Vec<JobUpdate> {
        updates.try_iter().collect()
    }

    #[test]
    fn successful_job_reaches_completed_and_emits_reports() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), b"Hello LOOT").unwrap();
        let dst = dir.path().join("backup");

        let job = Job::new(job_config(&src, &dst));
        let (tx, rx) = bounded(1024);
        job.run(&tx);

        assert_eq!(job.status(), JobStatus::Completed);
        let result = job.result().expect("result");
        assert_eq!(result.status, "success");
        assert_eq!(result.total_files, 1);
        assert!(result.error.is_empty());
        assert!(job.start_time().is_some() && job.end_time().is_some());

        let (copied, total, _) = job.progress();
        assert_eq!(copied, 10);
        assert_eq!(copied, total);

        // MHL side-car lands next to the destination root
        let mhl = dir.path().join("backup.mhl");
        assert!(mhl.exists(), "expected MHL at {}", mhl.display());

        let stages: Vec<JobStatus> = drain(rx).iter().map(|u| u.stage).collect();
        assert!(stages.contains(&JobStatus::Copying));
        assert!(stages.contains(&JobStatus::Verifying));
        assert_eq!(*stages.last().unwrap(), JobStatus::Completed);
    }

    #[test]
    fn pre_cancelled_job_terminates_cancelled_without_reports() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), vec![0u8; 4096]).unwrap();
        let dst = dir.path().join("backup");

        let job = Job::new(job_config(&src, &dst));
        job.cancel();
        let (tx, rx) = bounded(1024);
        job.run(&tx);

        assert_eq!(job.status(), JobStatus::Cancelled);
        assert!(!dir.path().join("backup.mhl").exists());
        assert!(!dir.path().join("backup.pdf").exists());
        let updates = drain(rx);
        assert!(updates.last().unwrap().finished);
        assert_eq!(updates.last().unwrap().stage, JobStatus::Cancelled);
        // A result is assembled even on the cancel path
        assert_eq!(job.result().unwrap().status, "failed");
    }

    #[test]
    fn mid_copy_cancellation_joins_workers_and_skips_reports() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        // Thousands of per-buffer cancellation checks at this buffer size
        fs::write(src.join("big.mov"), vec![0x5Au8; 64 * 1024 * 1024]).unwrap();
        let dst = dir.path().join("backup");

        let mut config = job_config(&src, &dst);
        config.buffer_size = 4096;
        let job = Job::new(config);
        // Rendezvous channel: the runner blocks on each update until the
        // watcher has taken it, so the cancel lands while copying
        let (tx, rx) = bounded::<JobUpdate>(0);

        let canceller = job.clone();
        let watcher = std::thread::spawn(move || {
            let mut stage = JobStatus::Failed;
            for update in rx.iter() {
                canceller.cancel();
                stage = update.stage;
                if update.finished {
                    break;
                }
            }
            stage
        });

        job.run(&tx);
        drop(tx);
        let final_stage = watcher.join().unwrap();

        assert_eq!(job.status(), JobStatus::Cancelled);
        assert_eq!(final_stage, JobStatus::Cancelled);
        assert!(!dir.path().join("backup.mhl").exists());
        assert!(!dir.path().join("backup.pdf").exists());
    }

    #[test]
    fn verification_failure_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("card");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.mov"), b"payload").unwrap();
        let dst = dir.path().join("backup");

        // First job copies, then we corrupt and retry with skip_existing so
        // the copy leaves the corrupt replica in place for verify to catch
        let job = Job::new(job_config(&src, &dst));
        let (tx, _rx) = bounded(1024);
        job.run(&tx);
        assert_eq!(job.status(), JobStatus::Completed);

        fs::write(dst.join("clip.mov"), b"pAyload").unwrap();
        let mut config = job_config(&src, &dst);
        config.skip_existing = true;
        let retry = Job::new(config);
        let (tx2, _rx2) = bounded(1024);
        retry.run(&tx2);

        assert_eq!(retry.status(), JobStatus::Failed);
        let result = retry.result().unwrap();
        assert_eq!(result.status, "failed");
        assert!(result.error.contains("mismatch"));
    }
}
