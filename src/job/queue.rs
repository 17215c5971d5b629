//! Job queue
//!
//! A FIFO of pending jobs with a single active slot and completed/failed
//! buckets. The dispatcher runs at most one job at a time and guarantees
//! strict sequential execution: job N+1 does not start before job N has
//! fully finished, reports included. `add` nudges a wake channel so
//! dispatch is signal-driven, with a modest timeout as a safety net.
//!
//! Every transition broadcasts a `QueueState` snapshot on a bounded channel
//! via non-blocking send; slow observers miss states, they never stall the
//! queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use tracing::{debug, info};

use crate::common::CancelFlag;
use crate::job::{Job, JobStatus, JobUpdate};

const DISPATCH_INTERVAL: Duration = Duration::from_millis(200);

/// Snapshot of queue occupancy for UI consumption
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueState {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub active_id: Option<String>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<Job>,
    active: Option<Job>,
    completed: Vec<Job>,
    failed: Vec<Job>,
}

impl QueueInner {
    fn state(&self) -> QueueState {
        let pending = self.pending.len();
        let completed = self.completed.len();
        let failed = self.failed.len();
        let active = self.active.is_some() as usize;
        QueueState {
            pending,
            completed,
            failed,
            total: pending + completed + failed + active,
            active_id: self.active.as_ref().map(|j| j.id.clone()),
        }
    }
}

/// FIFO queue running at most one active job
pub struct Queue {
    inner: Arc<Mutex<QueueInner>>,
    state_tx: Sender<QueueState>,
    state_rx: Receiver<QueueState>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    quit: CancelFlag,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Queue {
    pub fn new() -> Self {
        let (state_tx, state_rx) = bounded(10);
        let (wake_tx, wake_rx) = bounded(4);
        Queue {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            state_tx,
            state_rx,
            wake_tx,
            wake_rx,
            quit: CancelFlag::new(),
            dispatcher: Mutex::new(None),
        }
    }

    /// Receiver for `QueueState` broadcasts. Best-effort: states are
    /// dropped when this receiver falls behind.
    pub fn updates(&self) -> Receiver<QueueState> {
        self.state_rx.clone()
    }

    /// Append a job to the pending FIFO and nudge the dispatcher
    pub fn add(&self, job: Job) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.pending.push_back(job);
            self.broadcast(&inner);
        }
        self.wake_tx.try_send(()).ok();
    }

    /// Start the background dispatch loop. Running jobs send their progress
    /// on `job_updates`.
    pub fn start(&self, job_updates: Sender<JobUpdate>) {
        let inner = Arc::clone(&self.inner);
        let state_tx = self.state_tx.clone();
        let wake_rx = self.wake_rx.clone();
        let quit = self.quit.clone();

        let handle = std::thread::spawn(move || {
            dispatch_loop(inner, state_tx, wake_rx, quit, job_updates);
        });
        *self.dispatcher.lock().unwrap() = Some(handle);
    }

    /// Stop the dispatcher after the current job (if any) finishes
    pub fn stop(&self) {
        self.quit.cancel();
        self.wake_tx.try_send(()).ok();
        if let Some(handle) = self.dispatcher.lock().unwrap().take() {
            handle.join().ok();
        }
    }

    /// Cancel the active job via its flag, or excise a pending job into the
    /// failed bucket.
    pub fn cancel_job(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(active) = &inner.active {
            if active.id == id {
                info!(job = id, "cancelling active job");
                active.cancel();
                // The dispatcher buckets it when run() returns
                return;
            }
        }

        if let Some(pos) = inner.pending.iter().position(|j| j.id == id) {
            let job = inner.pending.remove(pos).unwrap();
            info!(job = id, "cancelling pending job");
            job.cancel();
            inner.failed.push(job);
            self.broadcast(&inner);
        }
    }

    /// Defensive copies of the job lists under the queue lock
    pub fn snapshot(&self) -> (Option<Job>, Vec<Job>, Vec<Job>, Vec<Job>) {
        let inner = self.inner.lock().unwrap();
        (
            inner.active.clone(),
            inner.pending.iter().cloned().collect(),
            inner.completed.clone(),
            inner.failed.clone(),
        )
    }

    pub fn state(&self) -> QueueState {
        self.inner.lock().unwrap().state()
    }

    fn broadcast(&self, inner: &QueueInner) {
        self.state_tx.try_send(inner.state()).ok();
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch_loop(
    inner: Arc<Mutex<QueueInner>>,
    state_tx: Sender<QueueState>,
    wake_rx: Receiver<()>,
    quit: CancelFlag,
    job_updates: Sender<JobUpdate>,
) {
    loop {
        if quit.is_cancelled() {
            return;
        }

        let next = {
            let mut guard = inner.lock().unwrap();
            if guard.active.is_none() {
                if let Some(job) = guard.pending.pop_front() {
                    guard.active = Some(job.clone());
                    state_tx.try_send(guard.state()).ok();
                    Some(job)
                } else {
                    None
                }
            } else {
                None
            }
        };

        match next {
            Some(job) => {
                debug!(job = %job.id, "dispatching");
                // Blocking: strict sequential execution across jobs
                job.run(&job_updates);

                let mut guard = inner.lock().unwrap();
                guard.active = None;
                match job.status() {
                    JobStatus::Failed | JobStatus::Cancelled => guard.failed.push(job),
                    _ => guard.completed.push(job),
                }
                state_tx.try_send(guard.state()).ok();
            }
            None => {
                // Idle: wait for an add() nudge, or poll as a fallback
                let _ = wake_rx.recv_timeout(DISPATCH_INTERVAL);
            }
        }
    }
}
