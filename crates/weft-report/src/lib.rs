#![forbid(unsafe_code)]

//! Report job queue on the file system.
//!
//! Request threads submit jobs through a [`QueueReporter`]; one
//! [`CreatorRunner`] thread takes them through `open/` → `work/` →
//! `done/` or `error/`. The queue is safe for any number of producers and
//! exactly one consumer: a directory rename is the only lock.
//!
//! # Example
//!
//! ```no_run
//! use weft_report::{
//!     CreatorRunner, QueueReporter, ReportCreator, ReportJob, ReportMode, ReportOutput,
//!     ReportQueueConfig, ReportType,
//! };
//!
//! let config = ReportQueueConfig::from_env();
//! let creator = ReportCreator::new(&config)?.with_backend(ReportType::Document, |_: &ReportJob| {
//!     Ok(ReportOutput::Document(b"...".to_vec()))
//! });
//! let runner = CreatorRunner::spawn(creator, &config)?;
//!
//! let reporter = QueueReporter::new(&config)?;
//! let id = reporter.create_report(&ReportJob::new(ReportMode::Get, ReportType::Document, "letter"))?;
//! println!("{:?}", reporter.report_position(&id));
//! runner.stop();
//! # Ok::<(), weft_report::ReportError>(())
//! ```

pub mod config;
pub mod creator;
pub mod error;
pub mod job;
pub mod queue;

pub use config::{ConfigWarning, ReportQueueConfig};
pub use creator::{
    CreatorRunner, CycleOutcome, OfficeBackend, ReportCreator, ReportOutput, StopSignal,
};
pub use error::{ReportError, ReportResult};
pub use job::{QueuedJob, ReportId, ReportJob, ReportMode, ReportType, ReportValues, job_order};
pub use queue::{QueueDirs, QueueReporter, ReportPosition, list_jobs};
