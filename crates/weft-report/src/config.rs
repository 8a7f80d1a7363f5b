#![forbid(unsafe_code)]

//! Report queue configuration.
//!
//! | Variable                   | Field        | Default                 |
//! |----------------------------|--------------|-------------------------|
//! | `WEFT_REPORT_DIR`          | `base_dir`   | `std::env::temp_dir()`  |
//! | `WEFT_REPORT_POLL_MS`      | `short_poll` | 100                     |
//! | `WEFT_REPORT_IDLE_POLL_MS` | `idle_poll`  | 500                     |
//!
//! Unparsable values keep the default and are reported as
//! [`ConfigWarning`]s by [`ReportQueueConfig::from_env_with`].

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_REPORT_DIR: &str = "WEFT_REPORT_DIR";
pub const ENV_REPORT_POLL_MS: &str = "WEFT_REPORT_POLL_MS";
pub const ENV_REPORT_IDLE_POLL_MS: &str = "WEFT_REPORT_IDLE_POLL_MS";

/// Name of the queue directory below the base directory.
pub const QUEUE_DIR_NAME: &str = "report";

/// Where the queue lives and how often the creator polls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQueueConfig {
    /// Parent of the `report/` queue directory.
    pub base_dir: PathBuf,
    /// Pause after a cycle that processed a job.
    pub short_poll: Duration,
    /// Pause after a cycle that found nothing to do.
    pub idle_poll: Duration,
}

impl Default for ReportQueueConfig {
    fn default() -> Self {
        Self {
            base_dir: env::temp_dir(),
            short_poll: Duration::from_millis(100),
            idle_poll: Duration::from_millis(500),
        }
    }
}

/// An environment value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub variable: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} (expected milliseconds)", self.variable, self.value)
    }
}

impl ReportQueueConfig {
    /// Configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let (config, warnings) = Self::from_env_with(|key| env::var(key).ok());
        for warning in warnings {
            tracing::warn!(%warning, "ignoring report queue setting");
        }
        config
    }

    /// Configuration from a custom lookup (for tests).
    pub fn from_env_with<F>(get: F) -> (Self, Vec<ConfigWarning>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        if let Some(dir) = get(ENV_REPORT_DIR).filter(|d| !d.trim().is_empty()) {
            config.base_dir = PathBuf::from(dir);
        }
        for (variable, slot) in [
            (ENV_REPORT_POLL_MS, &mut config.short_poll),
            (ENV_REPORT_IDLE_POLL_MS, &mut config.idle_poll),
        ] {
            let Some(value) = get(variable) else {
                continue;
            };
            match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => *slot = Duration::from_millis(ms),
                _ => warnings.push(ConfigWarning { variable, value }),
            }
        }
        (config, warnings)
    }

    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_short_poll(mut self, poll: Duration) -> Self {
        self.short_poll = poll;
        self
    }

    #[must_use]
    pub fn with_idle_poll(mut self, poll: Duration) -> Self {
        self.idle_poll = poll;
        self
    }

    /// The `report/` directory holding the five queue folders.
    #[must_use]
    pub fn queue_dir(&self) -> PathBuf {
        self.base_dir.join(QUEUE_DIR_NAME)
    }
}
