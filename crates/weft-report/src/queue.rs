#![forbid(unsafe_code)]

//! Producer side of the report queue.
//!
//! # Design Invariants
//!
//! 1. A descriptor only ever appears in `open/` complete: it is written to
//!    `temp/` first and renamed into place.
//! 2. Exactly one consumer moves files out of `open/`. The rename into
//!    `work/` is the only synchronisation between producer and consumer.
//! 3. Position queries and cancellation read the directories without
//!    locking. They tolerate files moving underneath them.
//!
//! # Failure Modes
//!
//! | Failure                               | Behavior                          |
//! |---------------------------------------|-----------------------------------|
//! | Job moved to `work/` during cancel    | `cancel_report` returns `false`   |
//! | Entry vanishes while scanning `open/` | Skipped; rank may be off by one   |
//! | Stray file in a queue directory       | Ignored                           |

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::ReportQueueConfig;
use crate::error::{ReportError, ReportResult};
use crate::job::{
    QueuedJob, ReportId, ReportJob, ReportMode, ReportType, SER_EXTENSION, job_file_name,
    job_order, parse_job_file_name,
};

/// The five directories of a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDirs {
    pub open: PathBuf,
    pub work: PathBuf,
    pub done: PathBuf,
    pub error: PathBuf,
    pub temp: PathBuf,
}

impl QueueDirs {
    /// Directory names below `root`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            open: root.join("open"),
            work: root.join("work"),
            done: root.join("done"),
            error: root.join("error"),
            temp: root.join("temp"),
        }
    }

    /// Create every directory of the queue described by `config`.
    pub fn create(config: &ReportQueueConfig) -> ReportResult<Self> {
        let dirs = Self::under(&config.queue_dir());
        for dir in dirs.all() {
            fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }

    fn all(&self) -> [&Path; 5] {
        [
            self.open.as_path(),
            self.work.as_path(),
            self.done.as_path(),
            self.error.as_path(),
            self.temp.as_path(),
        ]
    }
}

/// Queued jobs in `dir`, in processing order.
///
/// Entries that disappear or cannot be read while listing are skipped.
pub fn list_jobs(dir: &Path) -> ReportResult<Vec<QueuedJob>> {
    let mut jobs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else {
            continue;
        };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some((id, mode)) = parse_job_file_name(&file_name) else {
            continue;
        };
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        jobs.push(QueuedJob {
            id,
            mode,
            modified,
            file_name,
        });
    }
    jobs.sort_by(job_order);
    Ok(jobs)
}

/// Where a report currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPosition {
    /// Waiting in `open/` with this many jobs ahead of it.
    Queued(usize),
    /// Being processed.
    Working,
    /// Result available.
    Done,
    /// Processing failed; the descriptor is in `error/`.
    Failed,
    /// Not found anywhere, e.g. cancelled or never submitted.
    Unknown,
}

/// Submits jobs and answers questions about them.
#[derive(Debug, Clone)]
pub struct QueueReporter {
    dirs: QueueDirs,
}

impl QueueReporter {
    /// Reporter on the queue described by `config`; creates the directories.
    pub fn new(config: &ReportQueueConfig) -> ReportResult<Self> {
        Ok(Self {
            dirs: QueueDirs::create(config)?,
        })
    }

    #[must_use]
    pub fn dirs(&self) -> &QueueDirs {
        &self.dirs
    }

    /// Queue `job`. Returns its id.
    pub fn create_report(&self, job: &ReportJob) -> ReportResult<ReportId> {
        if self.find_job(&self.dirs.open, &job.id).is_some()
            || self.find_job(&self.dirs.work, &job.id).is_some()
        {
            return Err(ReportError::Duplicate(job.id.to_string()));
        }

        let file_name = job.file_name();
        let temp = self.dirs.temp.join(&file_name);
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer(&mut writer, job)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp, self.dirs.open.join(&file_name))?;

        tracing::info!(id = %job.id, mode = ?job.mode, report_type = %job.report_type, "report queued");
        Ok(job.id.clone())
    }

    /// Best-effort position of `id`.
    ///
    /// A linear scan of `open/`; concurrent moves may skew the rank.
    pub fn report_position(&self, id: &ReportId) -> ReportPosition {
        if let Ok(jobs) = list_jobs(&self.dirs.open) {
            if let Some(rank) = jobs.iter().position(|job| job.id == *id) {
                return ReportPosition::Queued(rank);
            }
        }
        if self.find_job(&self.dirs.work, id).is_some() {
            return ReportPosition::Working;
        }
        if self.report_result(id).is_some() {
            return ReportPosition::Done;
        }
        if self.find_job(&self.dirs.error, id).is_some() {
            return ReportPosition::Failed;
        }
        ReportPosition::Unknown
    }

    /// Remove `id` from `open/`.
    ///
    /// Returns `false` if it is not (or no longer) queued. A job already
    /// moved to `work/` cannot be cancelled.
    pub fn cancel_report(&self, id: &ReportId) -> ReportResult<bool> {
        let Some(path) = self.find_job(&self.dirs.open, id) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(id = %id, "report cancelled");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(id = %id, "report left open/ before it could be cancelled");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the finished result of `id`, if any.
    #[must_use]
    pub fn report_result(&self, id: &ReportId) -> Option<PathBuf> {
        ReportType::ALL
            .iter()
            .map(|kind| kind.extension())
            .chain([SER_EXTENSION])
            .map(|ext| self.dirs.done.join(format!("{id}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Modification time of the queued descriptor of `id`.
    pub fn queued_since(&self, id: &ReportId) -> Option<SystemTime> {
        let path = self.find_job(&self.dirs.open, id)?;
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn find_job(&self, dir: &Path, id: &ReportId) -> Option<PathBuf> {
        ReportMode::ALL
            .iter()
            .map(|mode| dir.join(job_file_name(id, *mode)))
            .find(|path| path.is_file())
    }
}
