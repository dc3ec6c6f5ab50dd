//! Layered configuration resolution.
//!
//! Precedence, lowest to highest: built-in defaults, the optional YAML
//! file, environment variables, command-line flags. The result is
//! validated once and never mutated afterwards.

use crate::config::env::{EnvOverrides, ENV_TARGET_HOST, ENV_TARGET_PORT};
use crate::config::{validate_config, FileConfig, ProbeConfig, TargetConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("{name} is required: set the environment variable or pass the matching flag")]
    MissingVariable { name: &'static str },

    #[error("invalid value for {name}: '{value}' ({reason})")]
    InvalidVariable {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Overrides supplied on the command line; highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<Duration>,
    pub log_level: Option<String>,
    pub no_recovery: bool,
}

/// Resolve the full configuration from file, process environment and
/// command line.
pub fn load_config(cli: &CliOverrides) -> Result<ProbeConfig, ConfigError> {
    resolve(cli, EnvOverrides::from_env()?)
}

/// Resolution with the environment layer supplied by the caller.
pub fn resolve(cli: &CliOverrides, env: EnvOverrides) -> Result<ProbeConfig, ConfigError> {
    let file = match &cli.config {
        Some(path) => load_file(path)?,
        None => FileConfig::default(),
    };

    // The target pair has no default and no file form.
    let host = cli
        .host
        .clone()
        .or(env.host)
        .ok_or(ConfigError::MissingVariable {
            name: ENV_TARGET_HOST,
        })?;
    let port = cli.port.or(env.port).ok_or(ConfigError::MissingVariable {
        name: ENV_TARGET_PORT,
    })?;

    let mut global = file.global;
    if let Some(level) = &cli.log_level {
        global.log_level = level.clone();
    }

    let mut handshake = file.handshake;
    if let Some(timeout) = env.timeout {
        handshake.timeout = timeout;
    }
    if let Some(timeout) = cli.timeout {
        handshake.timeout = timeout;
    }

    let mut recovery = file.recovery;
    if let Some(process) = env.recovery_process {
        recovery.process_name = process;
    }
    if let Some(signal) = env.recovery_signal {
        recovery.signal = signal;
    }
    if let Some(attempts) = env.recovery_max_attempts {
        recovery.max_attempts = attempts;
    }
    if let Some(interval) = env.recovery_retry_interval {
        recovery.retry_interval = interval;
    }
    if let Some(deadline) = env.recovery_deadline {
        recovery.deadline = deadline;
    }
    if cli.no_recovery {
        recovery.enabled = false;
    }

    let config = ProbeConfig {
        global,
        target: TargetConfig { host, port },
        handshake,
        recovery,
    };

    validate_config(&config).map_err(ConfigError::ValidationError)?;

    Ok(config)
}

fn load_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    Ok(serde_yaml::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_with_target() -> EnvOverrides {
        EnvOverrides {
            host: Some("127.0.0.1".to_string()),
            port: Some(9000),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_with_defaults() {
        let config = resolve(&CliOverrides::default(), env_with_target()).unwrap();
        assert_eq!(config.target.host, "127.0.0.1");
        assert_eq!(config.target.port, 9000);
        assert_eq!(config.handshake.timeout, Duration::from_millis(1000));
        assert!(config.recovery.enabled);
    }

    #[test]
    fn test_missing_target_host_fails() {
        let env = EnvOverrides {
            port: Some(9000),
            ..Default::default()
        };
        let result = resolve(&CliOverrides::default(), env);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingVariable {
                name: "TARGET_HOST"
            }
        ));
    }

    #[test]
    fn test_missing_target_port_fails() {
        let env = EnvOverrides {
            host: Some("127.0.0.1".to_string()),
            ..Default::default()
        };
        let result = resolve(&CliOverrides::default(), env);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingVariable {
                name: "TARGET_PORT"
            }
        ));
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let yaml = r#"
handshake:
  timeout: 2s
  on_timeout: inconclusive
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let mut env = env_with_target();
        env.timeout = Some(Duration::from_secs(3));

        // File only: the env layer wins over the file.
        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = resolve(&cli, env.clone()).unwrap();
        assert_eq!(config.handshake.timeout, Duration::from_secs(3));
        assert_eq!(config.handshake.on_timeout, TimeoutPolicy::Inconclusive);

        // CLI wins over both.
        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            timeout: Some(Duration::from_secs(4)),
            ..Default::default()
        };
        let config = resolve(&cli, env).unwrap();
        assert_eq!(config.handshake.timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_no_recovery_flag_disables_recovery() {
        let cli = CliOverrides {
            no_recovery: true,
            ..Default::default()
        };
        let config = resolve(&cli, env_with_target()).unwrap();
        assert!(!config.recovery.enabled);
    }

    #[test]
    fn test_missing_file_is_a_read_error() {
        let cli = CliOverrides {
            config: Some("/nonexistent/path/probe.yaml".into()),
            ..Default::default()
        };
        let result = resolve(&cli, env_with_target());
        assert!(matches!(result.unwrap_err(), ConfigError::ReadError(_)));
    }

    #[test]
    fn test_invalid_yaml_is_a_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not: valid: yaml: {{{}}}").unwrap();

        let cli = CliOverrides {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let result = resolve(&cli, env_with_target());
        assert!(result.is_err());
    }
}
