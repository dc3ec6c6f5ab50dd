//! udprobe - a sidecar health probe for UDP endpoints
//!
//! Usage:
//!     TARGET_HOST=10.0.0.5 TARGET_PORT=7777 udprobe
//!     udprobe --host 10.0.0.5 --port 7777 --timeout 1s
//!
//! Exit codes: 0 healthy, 1 configuration error, 2 unhealthy (sidecar
//! stopped), 3 unhealthy (recovery failed or disabled), 4 inconclusive.
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

use udprobe::config::{load_config, CliOverrides, ProbeConfig};
use udprobe::probe::{ProbeRunner, ProbeVerdict};
use udprobe::util::init_logging;

/// Exit code for errors before the probe gets to run.
const EXIT_CONFIG_ERROR: u8 = 1;

/// A sidecar health probe for UDP services behind network load balancers.
#[derive(Parser, Debug)]
#[command(name = "udprobe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to an optional configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Target host (overrides the TARGET_HOST environment variable)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Target UDP port (overrides the TARGET_PORT environment variable)
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Handshake timeout, e.g. "1s" or "500ms"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Skip the destructive recovery action on failure
    #[arg(long)]
    no_recovery: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config: self.config.clone(),
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
            log_level: self.log_level.clone(),
            no_recovery: self.no_recovery,
        }
    }
}

fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse();

    // Resolve configuration: defaults < file < environment < CLI.
    // This must fail before any network I/O is attempted.
    let config = match load_config(&cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("udprobe: configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // Initialize logging
    init_logging(&config.global.log_level, &config.global.log_format);

    // If --validate flag, just print the resolved configuration and exit
    if cli.validate {
        info!("configuration is valid");
        print_summary(&config);
        return ExitCode::SUCCESS;
    }

    match run(config) {
        Ok(verdict) => ExitCode::from(verdict.exit_code()),
        Err(e) => {
            eprintln!("udprobe: {e:#}");
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn print_summary(config: &ProbeConfig) {
    println!("Configuration is valid.");
    println!("  Target: {}:{}", config.target.host, config.target.port);
    println!(
        "  Handshake: timeout {}, resend every {}, on timeout: {:?}",
        humantime::format_duration(config.handshake.timeout),
        humantime::format_duration(config.handshake.resend_interval),
        config.handshake.on_timeout
    );
    if config.recovery.enabled {
        let target = match config.recovery.pid {
            Some(pid) => format!("pid {pid}"),
            None => format!("process '{}'", config.recovery.process_name),
        };
        println!(
            "  Recovery: {} via {:?}, up to {} attempts every {}, deadline {}",
            target,
            config.recovery.signal,
            config.recovery.max_attempts,
            humantime::format_duration(config.recovery.retry_interval),
            humantime::format_duration(config.recovery.deadline)
        );
    } else {
        println!("  Recovery: disabled");
    }
}

/// Run the probe with the given configuration.
fn run(config: ProbeConfig) -> Result<ProbeVerdict> {
    // One probe, one suspension point: a current-thread runtime is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let runner = ProbeRunner::new(config);
    Ok(runtime.block_on(async { runner.run().await }))
}
