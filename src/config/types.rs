//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Fully resolved probe configuration: defaults, file, environment and
/// command line merged, validated once, immutable afterwards.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Global settings
    pub global: GlobalConfig,

    /// The endpoint under test
    pub target: TargetConfig,

    /// Handshake tuning
    pub handshake: HandshakeConfig,

    /// Recovery action settings
    pub recovery: RecoveryConfig,
}

/// The optional configuration file. The target pair deliberately has no
/// file form; it arrives through the environment or the command line.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub handshake: HandshakeConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// The UDP endpoint whose health is being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Hostname or IP address
    pub host: String,

    /// UDP port
    pub port: u16,
}

/// Handshake tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// How long to wait for a connect or disconnect event
    #[serde(default = "default_handshake_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How often to retransmit the connect request while unacknowledged
    #[serde(default = "default_resend_interval", with = "humantime_serde")]
    pub resend_interval: Duration,

    /// How to classify a window that ends with no event at all
    #[serde(default)]
    pub on_timeout: TimeoutPolicy,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: default_handshake_timeout(),
            resend_interval: default_resend_interval(),
            on_timeout: TimeoutPolicy::Unhealthy,
        }
    }
}

/// Classification of a handshake window that produced neither a connect
/// nor a disconnect event.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutPolicy {
    /// Treat silence as a failed endpoint: run recovery.
    #[default]
    Unhealthy,
    /// Treat silence as an unanswered question: report it, skip recovery.
    Inconclusive,
}

/// Recovery action settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecoveryConfig {
    /// Whether the destructive recovery action runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exact name of the co-located process to terminate
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Terminate this PID instead of matching by name
    #[serde(default)]
    pub pid: Option<u32>,

    /// Termination signal to deliver
    #[serde(default)]
    pub signal: TerminationSignal,

    /// Maximum signal-and-confirm attempts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between attempts
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Overall bound on the recovery loop
    #[serde(default = "default_recovery_deadline", with = "humantime_serde")]
    pub deadline: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            process_name: default_process_name(),
            pid: None,
            signal: TerminationSignal::Term,
            max_attempts: default_max_attempts(),
            retry_interval: default_retry_interval(),
            deadline: default_recovery_deadline(),
        }
    }
}

/// Signal delivered to the recovery target.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TerminationSignal {
    #[default]
    Term,
    Kill,
    Int,
}

impl FromStr for TerminationSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "term" | "sigterm" => Ok(Self::Term),
            "kill" | "sigkill" => Ok(Self::Kill),
            "int" | "sigint" => Ok(Self::Int),
            other => Err(format!(
                "unknown signal '{}', expected one of: term, kill, int",
                other
            )),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_handshake_timeout() -> Duration {
    Duration::from_millis(1000)
}

fn default_resend_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_process_name() -> String {
    "nginx".to_string()
}

fn default_max_attempts() -> u32 {
    30
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_recovery_deadline() -> Duration {
    Duration::from_secs(60)
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_reference_values() {
        let handshake = HandshakeConfig::default();
        assert_eq!(handshake.timeout, Duration::from_millis(1000));
        assert_eq!(handshake.resend_interval, Duration::from_millis(500));
        assert_eq!(handshake.on_timeout, TimeoutPolicy::Unhealthy);

        let recovery = RecoveryConfig::default();
        assert!(recovery.enabled);
        assert_eq!(recovery.process_name, "nginx");
        assert_eq!(recovery.signal, TerminationSignal::Term);
        assert_eq!(recovery.max_attempts, 30);
        assert_eq!(recovery.retry_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_file_config_durations_use_humantime() {
        let yaml = r#"
handshake:
  timeout: 250ms
  on_timeout: inconclusive
recovery:
  retry_interval: 2s
  signal: kill
"#;
        let file: FileConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.handshake.timeout, Duration::from_millis(250));
        assert_eq!(file.handshake.on_timeout, TimeoutPolicy::Inconclusive);
        assert_eq!(file.recovery.retry_interval, Duration::from_secs(2));
        assert_eq!(file.recovery.signal, TerminationSignal::Kill);
        // Untouched sections keep their defaults.
        assert_eq!(file.global.log_level, "info");
        assert_eq!(file.recovery.max_attempts, 30);
    }

    #[test]
    fn test_signal_from_str() {
        assert_eq!(
            "SIGTERM".parse::<TerminationSignal>().unwrap(),
            TerminationSignal::Term
        );
        assert_eq!(
            "kill".parse::<TerminationSignal>().unwrap(),
            TerminationSignal::Kill
        );
        assert!("hup".parse::<TerminationSignal>().is_err());
    }
}
