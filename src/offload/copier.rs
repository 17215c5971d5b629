//! Fan-out copy machinery
//!
//! A walk feeder enumerates the source tree, materializes directories at
//! every destination synchronously in walk order, and feeds file jobs into a
//! bounded channel drained by `concurrency` worker threads. Each worker
//! streams a file through every destination writer plus a hash tap in one
//! pass. A mutex tracker coalesces progress into non-blocking channel sends.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use filetime::FileTime;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::common::{CancelFlag, MultiHasher, POOL_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::metadata;
use crate::offload::types::ProgressInfo;
use crate::offload::{file_name_string, rel_path_string, single_file_dest, Offloader};

/// System metadata names excluded from both walks. Any other dotfile is
/// preserved - camera vendors hide real data in dot-directories.
pub(crate) const SYSTEM_FILES: &[&str] = &[
    ".DS_Store",
    ".Spotlight-V100",
    ".fseventsd",
    ".Trashes",
    ".TemporaryItems",
    ".DocumentRevisions-V100",
];

const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);
const FEED_RETRY: Duration = Duration::from_millis(50);

pub(crate) fn is_system_entry(name: &str) -> bool {
    SYSTEM_FILES.contains(&name)
}

/// Walk the source tree with system-metadata subtrees pruned
pub(crate) fn walk_source(
    source: &std::path::Path,
) -> impl Iterator<Item = Result<walkdir::DirEntry>> {
    WalkDir::new(source)
        .into_iter()
        .filter_entry(|e| !is_system_entry(&e.file_name().to_string_lossy()))
        .map(|r| {
            r.map_err(|e| {
                let path = e.path().map(PathBuf::from).unwrap_or_default();
                Error::io(path, std::io::Error::other(e))
            })
        })
}

// =============================================================================
// Progress Tracker
// =============================================================================

/// Shared byte counters behind one mutex; emits on the progress channel at
/// most every 50 ms (or on completion) via non-blocking send. A slow
/// consumer drops samples, it never backpressures I/O.
pub(crate) struct Tracker {
    state: Mutex<TrackerState>,
    progress: Sender<ProgressInfo>,
}

struct TrackerState {
    total_bytes: u64,
    copied_bytes: u64,
    start_time: Instant,
    last_update: Instant,
}

impl Tracker {
    pub(crate) fn new(progress: Sender<ProgressInfo>) -> Self {
        let now = Instant::now();
        Tracker {
            state: Mutex::new(TrackerState {
                total_bytes: 0,
                copied_bytes: 0,
                start_time: now,
                last_update: now,
            }),
            progress,
        }
    }

    pub(crate) fn add_total(&self, n: u64) {
        let mut state = self.state.lock().unwrap();
        state.total_bytes += n;
    }

    /// Account `n` source bytes. Source-byte semantics: every source byte
    /// counts once no matter how many destinations received it.
    pub(crate) fn update(&self, n: u64, file: &str) {
        let mut state = self.state.lock().unwrap();
        state.copied_bytes += n;

        let now = Instant::now();
        let done = state.copied_bytes == state.total_bytes;
        if now.duration_since(state.last_update) < PROGRESS_INTERVAL && !done {
            return;
        }

        let elapsed = now.duration_since(state.start_time).as_secs_f64();
        let speed = if elapsed > 0.0 {
            state.copied_bytes as f64 / elapsed
        } else {
            0.0
        };
        let info = ProgressInfo {
            total_bytes: state.total_bytes,
            copied_bytes: state.copied_bytes,
            current_file: file.to_string(),
            speed,
        };
        if self.progress.try_send(info).is_ok() {
            state.last_update = now;
        }
    }
}

// =============================================================================
// Buffer Pool
// =============================================================================

/// Shared pool of 1 MiB chunks; nothing is allocated per-chunk in steady
/// state once each worker has pulled its buffer.
pub(crate) struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub(crate) fn new() -> Self {
        BufferPool { buffers: Mutex::new(Vec::new()) }
    }

    pub(crate) fn get(&self) -> Vec<u8> {
        self.buffers
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| vec![0u8; POOL_CHUNK_SIZE])
    }

    pub(crate) fn put(&self, buf: Vec<u8>) {
        self.buffers.lock().unwrap().push(buf);
    }
}

// =============================================================================
// Copy Orchestration
// =============================================================================

struct CopyJob {
    path: PathBuf,
    rel_path: String,
}

pub(crate) fn run_copy(
    o: &Offloader,
    cancel: &CancelFlag,
    progress: Sender<ProgressInfo>,
) -> Result<()> {
    let info = fs::metadata(&o.source).map_err(|e| Error::io(&o.source, e))?;
    let tracker = Tracker::new(progress);
    let pool = BufferPool::new();

    if !info.is_dir() {
        tracker.add_total(info.len());
        let dests: Vec<PathBuf> = o
            .destinations
            .iter()
            .map(|d| single_file_dest(d, &o.source))
            .collect();
        let job = CopyJob {
            path: o.source.clone(),
            rel_path: file_name_string(&o.source),
        };
        return copy_file_multi(o, &job, &dests, &tracker, cancel, &pool);
    }

    // Pre-walk: establish total_bytes before any copying starts
    for entry in walk_source(&o.source) {
        let entry = entry?;
        cancel.check()?;
        if entry.file_type().is_file() {
            let meta = entry
                .metadata()
                .map_err(|e| Error::io(entry.path(), std::io::Error::other(e)))?;
            tracker.add_total(meta.len());
        }
    }

    let workers = o.config.concurrency.max(1);
    let (job_tx, job_rx) = bounded::<CopyJob>(workers);
    let first_error: Mutex<Option<Error>> = Mutex::new(None);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx: &Receiver<CopyJob> = &job_rx;
            let tracker = &tracker;
            let pool = &pool;
            let first_error = &first_error;
            scope.spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    // Keep draining after cancellation so the feeder's
                    // bounded sends never wedge
                    if cancel.is_cancelled() {
                        continue;
                    }
                    let dests: Vec<PathBuf> =
                        o.destinations.iter().map(|d| d.join(&job.rel_path)).collect();
                    if let Err(err) = copy_file_multi(o, &job, &dests, tracker, cancel, pool) {
                        record_error(first_error, err);
                    }
                }
            });
        }

        // Feeder: directories are created synchronously in walk order so a
        // worker never opens an output before its parent chain exists
        scope.spawn(|| {
            if let Err(err) = feed_jobs(o, cancel, job_tx) {
                record_error(&first_error, err);
            }
        });
    });

    match first_error.into_inner().unwrap() {
        Some(err) => Err(err),
        None if cancel.is_cancelled() => Err(Error::Cancelled),
        None => Ok(()),
    }
}

fn record_error(slot: &Mutex<Option<Error>>, err: Error) {
    let mut guard = slot.lock().unwrap();
    if guard.is_none() {
        *guard = Some(err);
    }
}

fn feed_jobs(o: &Offloader, cancel: &CancelFlag, job_tx: Sender<CopyJob>) -> Result<()> {
    for entry in walk_source(&o.source) {
        let entry = entry?;
        cancel.check()?;

        let rel = entry
            .path()
            .strip_prefix(&o.source)
            .unwrap_or(entry.path());
        if rel.as_os_str().is_empty() {
            continue; // the source root itself
        }
        let rel_path = rel_path_string(rel);

        if entry.file_type().is_dir() {
            for dest in &o.destinations {
                let dest_path = dest.join(rel);
                fs::create_dir_all(&dest_path).map_err(|e| Error::io(&dest_path, e))?;
            }
            continue;
        }
        if !entry.file_type().is_file() {
            trace!(path = %entry.path().display(), "skipping non-regular file");
            continue;
        }

        let mut job = CopyJob { path: entry.path().to_path_buf(), rel_path };
        // Bounded send with cancellation checks instead of blocking forever
        loop {
            match job_tx.send_timeout(job, FEED_RETRY) {
                Ok(()) => break,
                Err(crossbeam_channel::SendTimeoutError::Timeout(returned)) => {
                    cancel.check()?;
                    job = returned;
                }
                Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                    return Err(Error::Cancelled);
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Per-File Copy
// =============================================================================

/// Copy one file to every destination in a single read pass.
///
/// The hash tap validates the write path only; verification re-reads from
/// disk. Destination handles are released on every exit path.
fn copy_file_multi(
    o: &Offloader,
    job: &CopyJob,
    dests: &[PathBuf],
    tracker: &Tracker,
    cancel: &CancelFlag,
    pool: &BufferPool,
) -> Result<()> {
    let src_info = fs::metadata(&job.path).map_err(|e| Error::io(&job.path, e))?;
    let file_label = file_name_string(&job.path);

    // Open destinations, honoring skip-existing per destination
    let mut writers: Vec<(PathBuf, File)> = Vec::with_capacity(dests.len());
    for dest_path in dests {
        if o.config.skip_existing {
            if let Ok(dest_info) = fs::metadata(dest_path) {
                if dest_info.is_file() && dest_info.len() == src_info.len() {
                    trace!(dest = %dest_path.display(), "skip existing");
                    continue;
                }
            }
        }
        cancel.check()?;
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = File::create(dest_path).map_err(|e| Error::io(dest_path, e))?;
        writers.push((dest_path.clone(), file));
    }

    // Every destination already has this file: account it and move on
    if writers.is_empty() {
        tracker.update(src_info.len(), &format!("{} (skipped)", file_label));
        return Ok(());
    }

    cancel.check()?;
    let mut src = File::open(&job.path).map_err(|e| Error::io(&job.path, e))?;

    // Best-effort metadata before streaming; reading the header here also
    // primes the page cache for the copy that follows
    if let Some(meta) = metadata::extract(&job.path, o.config.metadata_mode) {
        o.metadata_cache
            .lock()
            .unwrap()
            .insert(job.rel_path.clone(), meta);
    }

    let mut hasher = MultiHasher::new(&o.config.hash_algorithms());
    let mut buf = pool.get();
    let chunk = o.config.buffer_size.min(buf.len());

    let stream = (|| -> Result<()> {
        loop {
            let n = src.read(&mut buf[..chunk]).map_err(|e| Error::io(&job.path, e))?;
            if n == 0 {
                return Ok(());
            }
            cancel.check()?;
            for (dest_path, file) in writers.iter_mut() {
                file.write_all(&buf[..n])
                    .map_err(|e| Error::io(dest_path.as_path(), e))?;
            }
            hasher.update(&buf[..n]);
            tracker.update(n as u64, &file_label);
        }
    })();
    pool.put(buf);
    stream?;

    let written_digest = hasher.finalize();
    trace!(file = %file_label, digest = %written_digest, "write-path digest");

    // Close handles, then carry the source mtime onto each replica
    let written: Vec<PathBuf> = writers.into_iter().map(|(path, _)| path).collect();
    let mtime = FileTime::from_last_modification_time(&src_info);
    for path in &written {
        if let Err(err) = filetime::set_file_mtime(path, mtime) {
            warn!(path = %path.display(), %err, "failed to preserve modification time");
        }
    }

    debug!(file = %job.rel_path, size = src_info.len(), dests = written.len(), "copied");
    Ok(())
}
