//! Session configuration parsed from environment variables.
//!
//! Every knob has a `DEFAULT_*` constant. Unset or unparseable values fall
//! back to the default; [`SessionConfig::validate`] rejects values that parse
//! but make no sense.

use std::time::Duration;

use canvas::engine::EngineConfig;
use canvas::placement::PlacementConfig;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POSITION_FLUSH_INTERVAL_MS: u64 = 0;
pub const DEFAULT_UNDO_CAPACITY: usize = canvas::consts::UNDO_CAPACITY;
pub const DEFAULT_PREFETCH_MARGIN_PX: f64 = canvas::consts::PREFETCH_MARGIN_PX;
pub const DEFAULT_PLACEMENT_PADDING_PX: f64 = canvas::consts::PLACEMENT_PADDING;

/// Errors produced while validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The API base URL is not an http(s) URL.
    #[error("invalid API URL: {0}")]
    InvalidApiUrl(String),

    /// A numeric setting is outside its allowed range.
    #[error("invalid value for {key}: {reason}")]
    OutOfRange { key: &'static str, reason: &'static str },
}

/// Timeouts for outbound HTTP (API and image fetches).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub timeouts: HttpTimeouts,
    /// Autosave period for pending positions. Zero disables autosave.
    pub flush_interval_ms: u64,
    pub undo_capacity: usize,
    pub prefetch_margin_px: f64,
    pub placement_padding_px: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeouts: HttpTimeouts::default(),
            flush_interval_ms: DEFAULT_POSITION_FLUSH_INTERVAL_MS,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            prefetch_margin_px: DEFAULT_PREFETCH_MARGIN_PX,
            placement_padding_px: DEFAULT_PLACEMENT_PADDING_PX,
        }
    }
}

impl SessionConfig {
    /// Build config from environment variables.
    ///
    /// - `GENBOARD_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GENBOARD_CONNECT_TIMEOUT_SECS`: default 10
    /// - `POSITION_FLUSH_INTERVAL_MS`: default 0 (autosave off)
    /// - `UNDO_CAPACITY`: default 50
    /// - `PREFETCH_MARGIN_PX`: default 256
    /// - `PLACEMENT_PADDING_PX`: default 20
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            timeouts: HttpTimeouts {
                request_secs: env_parse("GENBOARD_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("GENBOARD_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
            flush_interval_ms: env_parse("POSITION_FLUSH_INTERVAL_MS", DEFAULT_POSITION_FLUSH_INTERVAL_MS),
            undo_capacity: env_parse("UNDO_CAPACITY", DEFAULT_UNDO_CAPACITY),
            prefetch_margin_px: env_parse("PREFETCH_MARGIN_PX", DEFAULT_PREFETCH_MARGIN_PX),
            placement_padding_px: env_parse("PLACEMENT_PADDING_PX", DEFAULT_PLACEMENT_PADDING_PX),
        }
    }

    /// Reject values that parsed but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.undo_capacity == 0 {
            return Err(ConfigError::OutOfRange { key: "UNDO_CAPACITY", reason: "must be at least 1" });
        }
        if !self.prefetch_margin_px.is_finite() || self.prefetch_margin_px < 0.0 {
            return Err(ConfigError::OutOfRange { key: "PREFETCH_MARGIN_PX", reason: "must be a finite, non-negative number" });
        }
        if !self.placement_padding_px.is_finite() || self.placement_padding_px < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "PLACEMENT_PADDING_PX",
                reason: "must be a finite, non-negative number",
            });
        }
        if self.timeouts.request_secs == 0 {
            return Err(ConfigError::OutOfRange { key: "GENBOARD_REQUEST_TIMEOUT_SECS", reason: "must be at least 1" });
        }
        Ok(())
    }

    /// Engine tuning derived from this config.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            undo_capacity: self.undo_capacity,
            prefetch_margin: self.prefetch_margin_px,
            placement: PlacementConfig { padding: self.placement_padding_px, ..PlacementConfig::default() },
            ..EngineConfig::default()
        }
    }

    /// `None` when autosave is off.
    #[must_use]
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }
}

/// Normalize an API base URL: http(s) only, no trailing slash.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidApiUrl`] for anything else.
pub fn parse_api_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::InvalidApiUrl(raw.to_owned()))?;
    if rest.is_empty() {
        return Err(ConfigError::InvalidApiUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
