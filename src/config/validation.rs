//! Configuration validation.

use crate::config::ProbeConfig;

/// Validate the resolved configuration.
///
/// Checks for:
/// - Non-empty target host
/// - Sensible handshake timing (nonzero, resend within the window)
/// - A usable recovery target and bounded retry schedule
/// - A known log level
///
/// # Returns
///
/// `Ok(())` if valid, or a message accumulating every problem found.
pub fn validate_config(config: &ProbeConfig) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.target.host.trim().is_empty() {
        errors.push("target host cannot be empty".to_string());
    }

    if config.handshake.timeout.is_zero() {
        errors.push("handshake timeout must be nonzero".to_string());
    }

    if config.handshake.resend_interval.is_zero() {
        errors.push("handshake resend interval must be nonzero".to_string());
    } else if config.handshake.resend_interval > config.handshake.timeout {
        errors.push(format!(
            "handshake resend interval ({}) exceeds the timeout ({})",
            humantime::format_duration(config.handshake.resend_interval),
            humantime::format_duration(config.handshake.timeout)
        ));
    }

    if config.recovery.enabled {
        if config.recovery.pid.is_none() && config.recovery.process_name.trim().is_empty() {
            errors.push("recovery process name cannot be empty (or set an explicit pid)".to_string());
        }

        if config.recovery.max_attempts == 0 {
            errors.push("recovery max attempts must be at least 1".to_string());
        }

        if config.recovery.retry_interval.is_zero() {
            errors.push("recovery retry interval must be nonzero".to_string());
        } else if config.recovery.deadline < config.recovery.retry_interval {
            errors.push(format!(
                "recovery deadline ({}) is shorter than one retry interval ({})",
                humantime::format_duration(config.recovery.deadline),
                humantime::format_duration(config.recovery.retry_interval)
            ));
        }
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
