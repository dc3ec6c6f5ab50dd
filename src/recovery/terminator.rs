//! Bounded terminate-and-confirm loop against a local process.
//!
//! Targets are found through the process table, either an explicit PID or
//! every process whose name matches exactly (never our own). A target
//! that is gone, or only lingers as a zombie waiting to be reaped, counts
//! as stopped: it is no longer serving traffic either way.

use crate::config::{RecoveryConfig, TerminationSignal};
use std::time::Duration;
use sysinfo::{Pid, Process, ProcessStatus, Signal, System};
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Why the recovery action gave up.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("target still running after {attempts} attempts ({remaining} process(es) remaining)")]
    AttemptsExhausted { attempts: u32, remaining: usize },

    #[error("recovery deadline of {} elapsed with {remaining} process(es) remaining", humantime::format_duration(*.deadline))]
    DeadlineElapsed { deadline: Duration, remaining: usize },
}

/// What a successful recovery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Attempts used, including the one that confirmed the target gone.
    pub attempts: u32,
    /// Total termination signals delivered.
    pub signaled: u32,
}

/// Signal the configured process until it is confirmed stopped.
///
/// Bounded by both `max_attempts` and `deadline`; on success reports how
/// much work it took, on failure returns an explicit error instead of
/// looping forever.
pub async fn terminate(config: &RecoveryConfig) -> Result<RecoveryReport, RecoveryError> {
    let deadline = Instant::now() + config.deadline;
    let own_pid = sysinfo::get_current_pid().ok();
    let mut system = System::new();
    let mut signaled = 0u32;

    for attempt in 1..=config.max_attempts {
        system.refresh_processes();
        let targets = live_targets(&system, config, own_pid);

        if targets.is_empty() {
            debug!(attempt, "target process confirmed stopped");
            return Ok(RecoveryReport { attempts: attempt, signaled });
        }

        if Instant::now() >= deadline {
            return Err(RecoveryError::DeadlineElapsed {
                deadline: config.deadline,
                remaining: targets.len(),
            });
        }

        debug!(
            attempt,
            targets = targets.len(),
            signal = ?config.signal,
            "signaling target process(es)"
        );
        for pid in &targets {
            if let Some(process) = system.process(*pid) {
                deliver(process, config.signal);
                signaled += 1;
            }
        }

        sleep(config.retry_interval).await;
    }

    // Final confirmation pass after the last sleep.
    system.refresh_processes();
    let remaining = live_targets(&system, config, own_pid);
    if remaining.is_empty() {
        Ok(RecoveryReport {
            attempts: config.max_attempts,
            signaled,
        })
    } else {
        Err(RecoveryError::AttemptsExhausted {
            attempts: config.max_attempts,
            remaining: remaining.len(),
        })
    }
}

fn deliver(process: &Process, signal: TerminationSignal) {
    let signal = match signal {
        TerminationSignal::Term => Signal::Term,
        TerminationSignal::Kill => Signal::Kill,
        TerminationSignal::Int => Signal::Interrupt,
    };
    // Platforms without the requested signal fall back to the
    // unconditional kill.
    if process.kill_with(signal).is_none() {
        warn!(pid = process.pid().as_u32(), "signal unsupported on this platform, killing");
        process.kill();
    }
}

/// Processes still standing between us and a confirmed stop.
fn live_targets(system: &System, config: &RecoveryConfig, own_pid: Option<Pid>) -> Vec<Pid> {
    match config.pid {
        Some(pid) => {
            let pid = Pid::from_u32(pid);
            system
                .process(pid)
                .filter(|p| is_live(p))
                .map(|p| vec![p.pid()])
                .unwrap_or_default()
        }
        None => system
            .processes()
            .values()
            .filter(|p| p.name() == config.process_name)
            .filter(|p| Some(p.pid()) != own_pid)
            .filter(|p| is_live(p))
            .map(|p| p.pid())
            .collect(),
    }
}

fn is_live(process: &Process) -> bool {
    !matches!(
        process.status(),
        ProcessStatus::Zombie | ProcessStatus::Dead
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config(process_name: &str) -> RecoveryConfig {
        RecoveryConfig {
            process_name: process_name.to_string(),
            max_attempts: 3,
            retry_interval: Duration::from_millis(10),
            deadline: Duration::from_secs(5),
            ..RecoveryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_absent_process_confirms_immediately() {
        // Nothing plausible carries this name.
        let config = quick_config("udprobe-no-such-process-a9f3");
        let report = terminate(&config).await.unwrap();
        assert_eq!(report.attempts, 1);
        assert_eq!(report.signaled, 0);
    }

    #[tokio::test]
    async fn test_absent_pid_confirms_immediately() {
        let config = RecoveryConfig {
            // Linux pid_max caps well below this.
            pid: Some(u32::MAX - 1),
            ..quick_config("ignored")
        };
        let report = terminate(&config).await.unwrap();
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_error_messages_name_the_bound() {
        let err = RecoveryError::AttemptsExhausted {
            attempts: 30,
            remaining: 2,
        };
        assert!(err.to_string().contains("30 attempts"));

        let err = RecoveryError::DeadlineElapsed {
            deadline: Duration::from_secs(60),
            remaining: 1,
        };
        assert!(err.to_string().contains("1m"));
    }
}
