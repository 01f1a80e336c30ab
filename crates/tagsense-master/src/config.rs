//! Master configuration.
//!
//! Durations are expressed in milliseconds on the wire so a bench or site
//! file stays readable:
//!
//! ```json
//! {
//!   "poll_interval_ms": 250,
//!   "retry": { "interval_ms": 1000, "max_attempts": 10 }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use tagsense_core::{
    Error, Result,
    constants::{DEFAULT_MAX_INIT_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRY_INTERVAL_MS},
};

/// How slave initialization retries a failed reader-count query.
///
/// The default gives up after [`DEFAULT_MAX_INIT_ATTEMPTS`] attempts one
/// second apart. Use [`RetryPolicy::forever`] for a slave that must be
/// waited for no matter how long it takes to boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay between attempts.
    #[serde(rename = "interval_ms", with = "duration_ms")]
    pub interval: Duration,

    /// Attempt limit; `None` retries until cancelled.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry until cancelled, one second apart.
    pub fn forever() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Set the delay between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the attempt limit.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// True once `attempts` attempts have used up the policy.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == Some(0) {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            max_attempts: Some(DEFAULT_MAX_INIT_ATTEMPTS),
        }
    }
}

/// Aggregator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Period of the polling loop.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,

    /// Initialization retry policy.
    pub retry: RetryPolicy,
}

impl MasterConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the JSON is malformed or a value is out
    /// of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero poll interval or a zero attempt
    /// limit.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        self.retry.validate()
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            retry: RetryPolicy::default(),
        }
    }
}

mod duration_ms {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Duration,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        // Saturate rather than fail for absurd durations
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
