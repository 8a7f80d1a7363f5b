#![forbid(unsafe_code)]

//! Report job descriptors and their file names.
//!
//! A queued job is one JSON file named `<id>-get.ser` or `<id>-set.ser`.
//! Completed get-values jobs leave `<id>.<ppt|doc|xls>` in `done/`;
//! completed set-values jobs leave `<id>.ser` holding the value map.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};

/// Suffix of result files and of set-values job files.
pub const SER_EXTENSION: &str = "ser";

/// Identifier of a report job; a valid file name stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReportId(String);

impl ReportId {
    /// Validate `id` as a report id.
    pub fn new(id: impl Into<String>) -> ReportResult<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(id))
        } else {
            Err(ReportError::InvalidId(id))
        }
    }

    /// A fresh id from the clock, the process id and a counter.
    #[must_use]
    pub fn generate() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let n = COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
        Self(format!("r{millis:x}_{:x}_{n:x}", std::process::id()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ReportId {
    type Error = ReportError;

    fn try_from(id: String) -> ReportResult<Self> {
        Self::new(id)
    }
}

impl From<ReportId> for String {
    fn from(id: ReportId) -> Self {
        id.0
    }
}

/// Whether a job produces a document or a value map.
///
/// Declaration order is processing priority: get-values jobs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// Render a document from values.
    Get,
    /// Extract values from a document.
    Set,
}

impl ReportMode {
    /// File name suffix of a queued job, including the extension.
    #[must_use]
    pub const fn job_suffix(self) -> &'static str {
        match self {
            ReportMode::Get => "-get.ser",
            ReportMode::Set => "-set.ser",
        }
    }

    pub const ALL: [ReportMode; 2] = [ReportMode::Get, ReportMode::Set];
}

/// Kind of office document a job deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Presentation,
    Document,
    Spreadsheet,
}

impl ReportType {
    /// Extension of a rendered document of this type.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            ReportType::Presentation => "ppt",
            ReportType::Document => "doc",
            ReportType::Spreadsheet => "xls",
        }
    }

    pub const ALL: [ReportType; 3] = [
        ReportType::Presentation,
        ReportType::Document,
        ReportType::Spreadsheet,
    ];
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportType::Presentation => "presentation",
            ReportType::Document => "document",
            ReportType::Spreadsheet => "spreadsheet",
        };
        f.write_str(name)
    }
}

/// Values exchanged with a report template.
pub type ReportValues = BTreeMap<String, serde_json::Value>;

/// A queued report request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportJob {
    pub id: ReportId,
    pub mode: ReportMode,
    pub report_type: ReportType,
    /// Template reference understood by the backend.
    pub template: String,
    /// Input values (get mode) or the names to extract (set mode).
    #[serde(default)]
    pub values: ReportValues,
}

impl ReportJob {
    /// A job with a generated id.
    #[must_use]
    pub fn new(mode: ReportMode, report_type: ReportType, template: impl Into<String>) -> Self {
        Self {
            id: ReportId::generate(),
            mode,
            report_type,
            template: template.into(),
            values: ReportValues::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: ReportId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// File name of the queued descriptor.
    #[must_use]
    pub fn file_name(&self) -> String {
        job_file_name(&self.id, self.mode)
    }

    /// File name of the result in `done/`.
    #[must_use]
    pub fn result_file_name(&self) -> String {
        match self.mode {
            ReportMode::Get => format!("{}.{}", self.id, self.report_type.extension()),
            ReportMode::Set => format!("{}.{SER_EXTENSION}", self.id),
        }
    }
}

/// File name of a queued job.
#[must_use]
pub fn job_file_name(id: &ReportId, mode: ReportMode) -> String {
    format!("{id}{}", mode.job_suffix())
}

/// Split a queued job's file name into id and mode.
#[must_use]
pub fn parse_job_file_name(name: &str) -> Option<(ReportId, ReportMode)> {
    ReportMode::ALL.into_iter().find_map(|mode| {
        let stem = name.strip_suffix(mode.job_suffix())?;
        ReportId::new(stem).ok().map(|id| (id, mode))
    })
}

/// A queued job as seen in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: ReportId,
    pub mode: ReportMode,
    pub modified: SystemTime,
    pub file_name: String,
}

/// Processing order: get before set, then oldest first, then by name.
#[must_use]
pub fn job_order(a: &QueuedJob, b: &QueuedJob) -> Ordering {
    a.mode
        .cmp(&b.mode)
        .then(a.modified.cmp(&b.modified))
        .then_with(|| a.file_name.cmp(&b.file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ids_are_file_name_safe() {
        assert!(ReportId::new("q3-sales_2").is_ok());
        for bad in ["", "../x", "a b", "a/b", "a.b"] {
            assert!(matches!(ReportId::new(bad), Err(ReportError::InvalidId(_))), "{bad}");
        }
        let generated = ReportId::generate();
        assert!(ReportId::new(generated.as_str()).is_ok());
        assert_ne!(generated, ReportId::generate());
    }

    #[test]
    fn file_names_round_trip_through_parser() {
        let id = ReportId::new("sales-q3").unwrap();
        assert_eq!(job_file_name(&id, ReportMode::Set), "sales-q3-set.ser");
        assert_eq!(
            parse_job_file_name("sales-q3-set.ser"),
            Some((id.clone(), ReportMode::Set))
        );
        assert_eq!(parse_job_file_name("sales-q3.ser"), None);
        assert_eq!(parse_job_file_name("notes.txt"), None);
    }

    #[test]
    fn result_names_follow_mode() {
        let get = ReportJob::new(ReportMode::Get, ReportType::Spreadsheet, "t")
            .with_id(ReportId::new("a").unwrap());
        assert_eq!(get.result_file_name(), "a.xls");
        let set = ReportJob { mode: ReportMode::Set, ..get };
        assert_eq!(set.result_file_name(), "a.ser");
    }

    #[test]
    fn get_jobs_precede_older_set_jobs() {
        let t0 = UNIX_EPOCH + Duration::from_secs(100);
        let queued = |name: &str, mode, secs| QueuedJob {
            id: ReportId::new(name).unwrap(),
            mode,
            modified: t0 + Duration::from_secs(secs),
            file_name: job_file_name(&ReportId::new(name).unwrap(), mode),
        };
        let old_set = queued("a", ReportMode::Set, 0);
        let new_get = queued("b", ReportMode::Get, 10);
        assert_eq!(job_order(&new_get, &old_set), Ordering::Less);

        let same_time = queued("c", ReportMode::Get, 10);
        assert_eq!(job_order(&new_get, &same_time), Ordering::Less);
    }

    #[test]
    fn descriptor_is_json() {
        let job = ReportJob::new(ReportMode::Get, ReportType::Document, "letter")
            .with_id(ReportId::new("j1").unwrap())
            .with_value("name", "Ada");
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""mode":"get""#));
        assert!(json.contains(r#""report_type":"document""#));
        let back: ReportJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);

        let bad = json.replace("\"j1\"", "\"../j1\"");
        assert!(serde_json::from_str::<ReportJob>(&bad).is_err());
    }
}
