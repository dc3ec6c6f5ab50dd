//! Configuration resolution, parsing, and validation.

mod env;
mod loader;
mod types;
mod validation;

pub use env::{
    EnvOverrides, ENV_PROBE_TIMEOUT, ENV_RECOVERY_DEADLINE, ENV_RECOVERY_MAX_ATTEMPTS,
    ENV_RECOVERY_PROCESS, ENV_RECOVERY_RETRY_INTERVAL, ENV_RECOVERY_SIGNAL, ENV_TARGET_HOST,
    ENV_TARGET_PORT,
};
pub use loader::{load_config, resolve, CliOverrides, ConfigError};
pub use types::*;
pub use validation::validate_config;
