use derive_builder::{Builder, UninitializedFieldError};
use thiserror::Error;

use crate::duration::ParseError;

/// Longest accepted process name, in characters.
pub const MAX_NAME_LEN: usize = 256;

/// Polling interval used when none is given.
pub const DEFAULT_INTERVAL: f64 = 1.0;

/// Positive abort times up to this many seconds end the wait before the
/// first query.
pub const IMMEDIATE_ABORT_THRESHOLD: f64 = 0.2;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("process name not given")]
    MissingProcessName,
    #[error("name is too long ({len} characters, at most {max} allowed)", max = MAX_NAME_LEN)]
    NameTooLong { len: usize },
    #[error("an error occurred while parsing interval time: {0}")]
    InvalidInterval(#[source] ParseError),
    #[error("an error occurred while parsing abort time: {0}")]
    InvalidAbort(#[source] ParseError),
    #[error("interval must be a positive, finite number of seconds (got {0})")]
    IntervalOutOfRange(f64),
    #[error("abort time must be negative or a finite number of seconds (got {0})")]
    AbortOutOfRange(f64),
}

/// Validated parameters of one wait.
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(
    pattern = "owned",
    build_fn(validate = "Self::validate", error = "ConfigError")
)]
pub struct PollConfig {
    /// Name of the process to wait for
    #[builder(setter(into))]
    process_name: String,

    /// Seconds between two queries
    #[builder(default = "DEFAULT_INTERVAL")]
    interval: f64,

    /// Seconds before giving up; negative means never
    #[builder(setter(strip_option), default)]
    abort: Option<f64>,
}

impl PollConfig {
    #[inline]
    pub fn builder() -> PollConfigBuilder {
        PollConfigBuilder::default()
    }

    #[inline]
    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Seconds between two queries, always positive and finite.
    #[inline]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// The abort time exactly as given, negative values included.
    #[inline]
    pub fn abort(&self) -> Option<f64> {
        self.abort
    }

    /// The abort time if it bounds the wait; negative means never.
    pub fn deadline(&self) -> Option<f64> {
        self.abort.filter(|abort| *abort >= 0.0)
    }

    /// Whether the deadline is too short to be worth a single query.
    pub fn aborts_immediately(&self) -> bool {
        self.deadline()
            .is_some_and(|deadline| deadline > 0.0 && deadline <= IMMEDIATE_ABORT_THRESHOLD)
    }
}

impl PollConfigBuilder {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.process_name {
            if name.is_empty() {
                return Err(ConfigError::MissingProcessName);
            }

            let len = name.chars().count();
            if len > MAX_NAME_LEN {
                return Err(ConfigError::NameTooLong { len });
            }
        }

        if let Some(interval) = self.interval {
            if !(interval.is_finite() && interval > 0.0) {
                return Err(ConfigError::IntervalOutOfRange(interval));
            }
        }

        // -inf still means never
        if let Some(Some(abort)) = self.abort {
            if abort.is_nan() || abort == f64::INFINITY {
                return Err(ConfigError::AbortOutOfRange(abort));
            }
        }

        Ok(())
    }
}

// process_name is the only field without a default
impl From<UninitializedFieldError> for ConfigError {
    fn from(_: UninitializedFieldError) -> Self {
        Self::MissingProcessName
    }
}
