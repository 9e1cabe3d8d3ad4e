//! Shim location and timeout settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, ShimError};

pub const EXECUTABLE_ENV: &str = "SHIM_BRIDGE_EXECUTABLE";
pub const CONFIG_ENV: &str = "SHIM_BRIDGE_CONFIG";
pub const TIMEOUT_ENV: &str = "SHIM_BRIDGE_TIMEOUT";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the shim lives and how long action and validate calls may take.
///
/// Paths are not checked here; every invocation checks them again before
/// spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimConfig {
    pub executable: PathBuf,
    pub config: PathBuf,
    pub timeout: Duration,
}

impl ShimConfig {
    pub fn new(executable: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            config: config.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `SHIM_BRIDGE_EXECUTABLE`, `SHIM_BRIDGE_CONFIG` and
    /// `SHIM_BRIDGE_TIMEOUT` (whole seconds).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Unset paths stay empty so the missing setting is reported when the
    /// shim is first used.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let executable = lookup(EXECUTABLE_ENV).unwrap_or_default();
        let config = lookup(CONFIG_ENV).unwrap_or_default();

        let timeout = match lookup(TIMEOUT_ENV) {
            Some(raw) if !raw.trim().is_empty() => parse_timeout(TIMEOUT_ENV, &raw)?,
            _ => DEFAULT_TIMEOUT,
        };

        Ok(Self::new(executable, config).with_timeout(timeout))
    }
}

/// Parse a positive number of whole seconds.
pub fn parse_timeout(name: &'static str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw.trim().parse().map_err(|e| ShimError::InvalidSetting {
        name,
        reason: format!("{raw:?} is not a number of seconds: {e}"),
    })?;

    if secs == 0 {
        return Err(ShimError::InvalidSetting {
            name,
            reason: "timeout must be at least one second".to_string(),
        });
    }

    Ok(Duration::from_secs(secs))
}
