//! Typed environment-variable overrides.
//!
//! The probe's primary configuration contract is two environment
//! variables, `TARGET_HOST` and `TARGET_PORT`; the rest of the family is
//! optional tuning. Values are read through an injectable lookup so tests
//! never mutate process-global environment state.

use crate::config::{ConfigError, TerminationSignal};
use std::time::Duration;

/// Environment variable naming the health-check target host.
pub const ENV_TARGET_HOST: &str = "TARGET_HOST";
/// Environment variable naming the health-check target UDP port.
pub const ENV_TARGET_PORT: &str = "TARGET_PORT";
/// Optional handshake timeout override (humantime form, e.g. `1s`).
pub const ENV_PROBE_TIMEOUT: &str = "PROBE_TIMEOUT";
/// Optional recovery process-name override.
pub const ENV_RECOVERY_PROCESS: &str = "RECOVERY_PROCESS";
/// Optional recovery signal override (term, kill, int).
pub const ENV_RECOVERY_SIGNAL: &str = "RECOVERY_SIGNAL";
/// Optional recovery attempt-count override.
pub const ENV_RECOVERY_MAX_ATTEMPTS: &str = "RECOVERY_MAX_ATTEMPTS";
/// Optional recovery retry-interval override (humantime form).
pub const ENV_RECOVERY_RETRY_INTERVAL: &str = "RECOVERY_RETRY_INTERVAL";
/// Optional recovery overall-deadline override (humantime form).
pub const ENV_RECOVERY_DEADLINE: &str = "RECOVERY_DEADLINE";

/// Overrides collected from the environment, already parsed into their
/// target types. `None` means the variable was not set.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<Duration>,
    pub recovery_process: Option<String>,
    pub recovery_signal: Option<TerminationSignal>,
    pub recovery_max_attempts: Option<u32>,
    pub recovery_retry_interval: Option<Duration>,
    pub recovery_deadline: Option<Duration>,
}

impl EnvOverrides {
    /// Read the overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the overrides through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: non_empty(ENV_TARGET_HOST, lookup(ENV_TARGET_HOST))?,
            port: parse_with(ENV_TARGET_PORT, lookup(ENV_TARGET_PORT), |s| {
                s.parse::<u16>().map_err(|e| e.to_string())
            })?,
            timeout: parse_with(ENV_PROBE_TIMEOUT, lookup(ENV_PROBE_TIMEOUT), duration)?,
            recovery_process: non_empty(ENV_RECOVERY_PROCESS, lookup(ENV_RECOVERY_PROCESS))?,
            recovery_signal: parse_with(ENV_RECOVERY_SIGNAL, lookup(ENV_RECOVERY_SIGNAL), |s| {
                s.parse::<TerminationSignal>()
            })?,
            recovery_max_attempts: parse_with(
                ENV_RECOVERY_MAX_ATTEMPTS,
                lookup(ENV_RECOVERY_MAX_ATTEMPTS),
                |s| s.parse::<u32>().map_err(|e| e.to_string()),
            )?,
            recovery_retry_interval: parse_with(
                ENV_RECOVERY_RETRY_INTERVAL,
                lookup(ENV_RECOVERY_RETRY_INTERVAL),
                duration,
            )?,
            recovery_deadline: parse_with(
                ENV_RECOVERY_DEADLINE,
                lookup(ENV_RECOVERY_DEADLINE),
                duration,
            )?,
        })
    }
}

fn duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

fn parse_with<T, F>(name: &'static str, value: Option<String>, parse: F) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Result<T, String>,
{
    match value {
        None => Ok(None),
        Some(raw) => parse(raw.trim())
            .map(Some)
            .map_err(|reason| ConfigError::InvalidVariable {
                name,
                value: raw,
                reason,
            }),
    }
}

/// A variable that is set but empty is malformed, not absent.
fn non_empty(name: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::InvalidVariable {
            name,
            value: raw,
            reason: "must not be empty".to_string(),
        }),
        Some(raw) => Ok(Some(raw)),
    }
}
