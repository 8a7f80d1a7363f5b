#![forbid(unsafe_code)]

//! Consumer side of the report queue.
//!
//! [`ReportCreator::run_cycle`] processes at most one job:
//!
//! ```text
//! work/ (left over from a crash) ─┐
//!                                 ├─► pick ─► rename into work/ ─► backend
//! open/ (get before set, oldest) ─┘                                   │
//!                      done/<id>.<ext> ◄── ok ──────────────────────────┤
//!                      error/<job file> ◄── failure or panic ──────────┘
//! ```
//!
//! [`CreatorRunner`] repeats cycles on one background thread until stopped.
//! The first cycle runs right after spawn; every later one follows a poll
//! interval, so the loop is sleep-then-check from the second pass on.
//!
//! # Failure Modes
//!
//! | Failure                          | Behavior                              |
//! |----------------------------------|---------------------------------------|
//! | Descriptor unreadable            | Moved to `error/`, next job follows   |
//! | No backend for the report type   | Moved to `error/`                     |
//! | Backend returns an error/panics  | Moved to `error/`, logged             |
//! | Job cancelled before pickup      | Rename fails with NotFound, cycle idle|

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use weft_core::panic_message;

use crate::config::ReportQueueConfig;
use crate::error::{ReportError, ReportResult};
use crate::job::{QueuedJob, ReportId, ReportJob, ReportMode, ReportType, ReportValues};
use crate::queue::{QueueDirs, list_jobs};

// ─────────────────────────────────────────────────────────────────────────────
// Backends
// ─────────────────────────────────────────────────────────────────────────────

/// What a backend produced for a job.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutput {
    /// A rendered document (get mode).
    Document(Vec<u8>),
    /// Values read from a document (set mode).
    Values(ReportValues),
}

/// Office integration for one report type.
pub trait OfficeBackend: Send {
    /// Produce the output of `job`.
    fn create(&self, job: &ReportJob) -> ReportResult<ReportOutput>;
}

impl<F> OfficeBackend for F
where
    F: Fn(&ReportJob) -> ReportResult<ReportOutput> + Send,
{
    fn create(&self, job: &ReportJob) -> ReportResult<ReportOutput> {
        self(job)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Creator
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one [`ReportCreator::run_cycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to do.
    Idle,
    /// The job finished; its result is in `done/`.
    Completed(ReportId),
    /// The job failed; its descriptor is in `error/`.
    Failed(ReportId),
}

/// Single consumer of a report queue.
pub struct ReportCreator {
    dirs: QueueDirs,
    backends: HashMap<ReportType, Box<dyn OfficeBackend>>,
}

impl ReportCreator {
    /// Creator for the queue described by `config`; creates the directories.
    pub fn new(config: &ReportQueueConfig) -> ReportResult<Self> {
        Ok(Self {
            dirs: QueueDirs::create(config)?,
            backends: HashMap::new(),
        })
    }

    /// Register the backend handling `report_type`.
    #[must_use]
    pub fn with_backend(mut self, report_type: ReportType, backend: impl OfficeBackend + 'static) -> Self {
        self.backends.insert(report_type, Box::new(backend));
        self
    }

    #[must_use]
    pub fn dirs(&self) -> &QueueDirs {
        &self.dirs
    }

    /// Process the next job, if any.
    pub fn run_cycle(&self) -> ReportResult<CycleOutcome> {
        let Some(queued) = self.next_job()? else {
            return Ok(CycleOutcome::Idle);
        };
        let work_path = self.dirs.work.join(&queued.file_name);
        tracing::trace!(file = %queued.file_name, "report cycle picked job");

        match self.process(&work_path) {
            Ok((job, output)) => {
                fs::remove_file(&work_path)?;
                tracing::info!(
                    id = %queued.id,
                    mode = ?job.mode,
                    path = %output.display(),
                    "report completed"
                );
                Ok(CycleOutcome::Completed(queued.id))
            }
            Err(e) => {
                tracing::warn!(id = %queued.id, error = %e, "report failed");
                fs::rename(&work_path, self.dirs.error.join(&queued.file_name))?;
                Ok(CycleOutcome::Failed(queued.id))
            }
        }
    }

    /// Pick the next job and make sure it sits in `work/`.
    fn next_job(&self) -> ReportResult<Option<QueuedJob>> {
        if let Some(job) = list_jobs(&self.dirs.work)?.into_iter().next() {
            tracing::debug!(id = %job.id, "resuming job left in work/");
            return Ok(Some(job));
        }
        for job in list_jobs(&self.dirs.open)? {
            let from = self.dirs.open.join(&job.file_name);
            match fs::rename(&from, self.dirs.work.join(&job.file_name)) {
                Ok(()) => return Ok(Some(job)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(id = %job.id, "job vanished before pickup");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    fn process(&self, work_path: &Path) -> ReportResult<(ReportJob, PathBuf)> {
        let job: ReportJob = serde_json::from_slice(&fs::read(work_path)?)?;
        let backend = self
            .backends
            .get(&job.report_type)
            .ok_or_else(|| ReportError::NoBackend(job.report_type.to_string()))?;

        let output = catch_unwind(AssertUnwindSafe(|| backend.create(&job))).map_err(|payload| {
            ReportError::Backend(format!("backend panicked: {}", panic_message(payload.as_ref())))
        })??;

        let bytes = match (job.mode, output) {
            (ReportMode::Get, ReportOutput::Document(bytes)) => bytes,
            (ReportMode::Set, ReportOutput::Values(values)) => serde_json::to_vec(&values)?,
            (mode, _) => {
                return Err(ReportError::Backend(format!(
                    "output does not match {mode:?} mode"
                )));
            }
        };
        let path = self.write_result(&job.result_file_name(), &bytes)?;
        Ok((job, path))
    }

    fn write_result(&self, file_name: &str, bytes: &[u8]) -> ReportResult<PathBuf> {
        let temp = self.dirs.temp.join(file_name);
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            writer.write_all(bytes)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        let target = self.dirs.done.join(file_name);
        fs::rename(&temp, &target)?;
        Ok(target)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

/// Cooperative stop flag shared with the runner thread.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the runner to stop and wake it.
    pub fn stop(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Sleep for `duration` unless stopped first. Returns `true` if stopped.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Background thread running [`ReportCreator`] cycles.
///
/// Polls `short_poll` after a processed job and `idle_poll` after an empty
/// cycle. Dropping the runner stops and joins the thread.
pub struct CreatorRunner {
    stop: StopSignal,
    thread: Option<thread::JoinHandle<()>>,
}

impl CreatorRunner {
    /// Start the runner thread.
    pub fn spawn(creator: ReportCreator, config: &ReportQueueConfig) -> ReportResult<Self> {
        let stop = StopSignal::new();
        let signal = stop.clone();
        let (short_poll, idle_poll) = (config.short_poll, config.idle_poll);
        let thread = thread::Builder::new()
            .name("weft-report-creator".into())
            .spawn(move || run_loop(&creator, &signal, short_poll, idle_poll))?;
        tracing::info!(queue = %config.queue_dir().display(), "report creator started");
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Signal the thread to stop and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        self.stop.stop();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("report creator thread panicked");
            }
        }
    }
}

impl Drop for CreatorRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(creator: &ReportCreator, stop: &StopSignal, short_poll: Duration, idle_poll: Duration) {
    while !stop.is_stopped() {
        let pause = match creator.run_cycle() {
            Ok(CycleOutcome::Idle) => idle_poll,
            Ok(_) => short_poll,
            Err(e) => {
                tracing::error!(error = %e, "report cycle failed");
                idle_poll
            }
        };
        if stop.wait_timeout(pause) {
            break;
        }
    }
    tracing::debug!("report creator stopped");
}
