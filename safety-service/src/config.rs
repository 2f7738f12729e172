//! Engine configuration.
#![forbid(unsafe_code)]

use std::time::Duration;

use safety_core::{ClockError, GEOCELL_PRECISION, LocalClock, geocell::MAX_PRECISION};
use safety_data::RepositoryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted cache lifetime.
pub const MAX_CACHE_TTL_SECS: u32 = 86_400;

/// Longest accepted look-back window, in days.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// How computed scores reach the history store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Spawn the write on the current Tokio runtime and return immediately.
    #[default]
    Detached,
    /// Await the write before returning the score.
    Inline,
}

/// Errors raised by [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Geocell precision outside the supported range.
    #[error("geocell precision {precision} is outside 1..={max}")]
    InvalidPrecision {
        /// Rejected precision.
        precision: usize,
        /// Longest supported precision.
        max: usize,
    },
    /// A look-back window or result cap was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },
    /// A look-back window above [`MAX_WINDOW_DAYS`].
    #[error("{field} of {days} days exceeds {max} days")]
    WindowTooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Rejected window.
        days: u32,
        /// Longest accepted window.
        max: u32,
    },
    /// Cache lifetime above [`MAX_CACHE_TTL_SECS`].
    #[error("cache TTL of {secs}s exceeds {max}s")]
    TtlTooLong {
        /// Rejected lifetime.
        secs: u32,
        /// Longest accepted lifetime.
        max: u32,
    },
    /// The UTC offset is out of range.
    #[error("invalid UTC offset")]
    Offset {
        /// Error reported by the clock.
        #[source]
        source: ClockError,
    },
}

/// Settings for a [`ScoreEngine`](crate::ScoreEngine).
///
/// Every field has a default, so partial configuration files deserialise.
///
/// # Examples
/// ```
/// use safety_service::{EngineConfig, HistoryMode};
///
/// let config: EngineConfig =
///     serde_json::from_str(r#"{"cache_ttl_secs": 600, "history_mode": "inline"}"#)
///         .expect("valid config");
/// assert_eq!(config.cache_ttl_secs, 600);
/// assert_eq!(config.history_mode, HistoryMode::Inline);
/// assert_eq!(config.incident_limit, 100);
/// config.validate().expect("config is valid");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Geohash precision of the aggregation cell.
    pub geocell_precision: usize,
    /// Days of incident history considered.
    pub incident_window_days: u32,
    /// Most incidents loaded per request.
    pub incident_limit: usize,
    /// Days of community reports considered.
    pub report_window_days: u32,
    /// Most community reports loaded per request.
    pub report_limit: usize,
    /// Bound on the area data fan-out, in milliseconds.
    pub repository_timeout_ms: u64,
    /// Lifetime of a cached score, in seconds.
    pub cache_ttl_secs: u32,
    /// Offset used to derive local hours and dates.
    pub utc_offset_minutes: i32,
    /// How history writes are executed.
    pub history_mode: HistoryMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            geocell_precision: GEOCELL_PRECISION,
            incident_window_days: 180,
            incident_limit: 100,
            report_window_days: 30,
            report_limit: 50,
            repository_timeout_ms: 2_000,
            cache_ttl_secs: 3_600,
            utc_offset_minutes: 0,
            history_mode: HistoryMode::Detached,
        }
    }
}

impl EngineConfig {
    /// Check every field.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PRECISION).contains(&self.geocell_precision) {
            return Err(ConfigError::InvalidPrecision {
                precision: self.geocell_precision,
                max: MAX_PRECISION,
            });
        }
        let required = [
            ("incident_window_days", self.incident_window_days == 0),
            ("incident_limit", self.incident_limit == 0),
            ("report_window_days", self.report_window_days == 0),
            ("report_limit", self.report_limit == 0),
            ("repository_timeout_ms", self.repository_timeout_ms == 0),
            ("cache_ttl_secs", self.cache_ttl_secs == 0),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::Zero { field });
        }
        let windows = [
            ("incident_window_days", self.incident_window_days),
            ("report_window_days", self.report_window_days),
        ];
        if let Some((field, days)) = windows
            .into_iter()
            .find(|(_, days)| *days > MAX_WINDOW_DAYS)
        {
            return Err(ConfigError::WindowTooLong {
                field,
                days,
                max: MAX_WINDOW_DAYS,
            });
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::TtlTooLong {
                secs: self.cache_ttl_secs,
                max: MAX_CACHE_TTL_SECS,
            });
        }
        self.clock().map(|_| ())
    }

    /// Clock for the configured offset.
    ///
    /// # Errors
    /// Returns [`ConfigError::Offset`] when the offset is out of range.
    pub fn clock(&self) -> Result<LocalClock, ConfigError> {
        LocalClock::from_offset_minutes(self.utc_offset_minutes)
            .map_err(|source| ConfigError::Offset { source })
    }

    /// Repository settings derived from this configuration.
    #[must_use]
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            geocell_precision: self.geocell_precision,
            incident_window_days: i64::from(self.incident_window_days),
            incident_limit: self.incident_limit,
            report_window_days: i64::from(self.report_window_days),
            report_limit: self.report_limit,
            timeout: Duration::from_millis(self.repository_timeout_ms),
        }
    }

    /// Incident look-back as a signed duration.
    #[must_use]
    pub fn incident_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.incident_window_days))
    }

    /// Community report look-back as a signed duration.
    #[must_use]
    pub fn report_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.report_window_days))
    }

    /// Cache lifetime as a signed duration.
    #[must_use]
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.cache_ttl_secs))
    }
}
