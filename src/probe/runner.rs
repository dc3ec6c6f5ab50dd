//! The probe runner: one health check, one verdict.

use crate::config::{ProbeConfig, TimeoutPolicy};
use crate::probe::{ProbeOutcome, ProbeSession};
use crate::recovery::terminate;
use crate::util::RunId;
use std::net::SocketAddr;
use tracing::{error, info, info_span, warn, Instrument};

/// Final verdict of one probe execution, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// The endpoint completed the handshake.
    Healthy,
    /// The endpoint is down. `recovered` records whether the recovery
    /// action confirmed the sidecar process stopped.
    Unhealthy { recovered: bool },
    /// The window closed silently and policy declines to guess.
    Inconclusive,
}

impl ProbeVerdict {
    /// Documented exit codes: 0 healthy, 2 unhealthy and recovered,
    /// 3 unhealthy with recovery failed or disabled, 4 inconclusive.
    /// (1 is reserved for configuration errors, which never reach the
    /// runner.)
    pub fn exit_code(&self) -> u8 {
        match self {
            ProbeVerdict::Healthy => 0,
            ProbeVerdict::Unhealthy { recovered: true } => 2,
            ProbeVerdict::Unhealthy { recovered: false } => 3,
            ProbeVerdict::Inconclusive => 4,
        }
    }
}

/// Performs a single probe against the configured target.
pub struct ProbeRunner {
    config: ProbeConfig,
}

impl ProbeRunner {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Run the probe to completion. All failures are classified into the
    /// verdict; nothing is retried.
    pub async fn run(&self) -> ProbeVerdict {
        let run_id = RunId::new();
        let span = info_span!("probe", run_id = %run_id);
        self.run_probe().instrument(span).await
    }

    async fn run_probe(&self) -> ProbeVerdict {
        info!(
            host = %self.config.target.host,
            port = self.config.target.port,
            "checking health of udp endpoint"
        );

        let peer = match self.resolve().await {
            Some(addr) => addr,
            None => {
                // Could not even aim the probe; contract says treat this
                // the same as a failed connect.
                return self.classify(None, ProbeOutcome::Disconnected).await;
            }
        };

        info!(peer = %peer, "probing peer");

        let outcome = match self.handshake(peer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(peer = %peer, error = %e, "connect request could not be issued");
                ProbeOutcome::Disconnected
            }
        };

        self.classify(Some(peer), outcome).await
    }

    async fn resolve(&self) -> Option<SocketAddr> {
        let host = self.config.target.host.as_str();
        let port = self.config.target.port;
        match tokio::net::lookup_host((host, port)).await {
            Ok(mut addrs) => {
                let addr = addrs.next();
                if addr.is_none() {
                    warn!(host, "hostname resolved to no addresses");
                }
                addr
            }
            Err(e) => {
                warn!(host, error = %e, "failed to resolve target host");
                None
            }
        }
    }

    async fn handshake(&self, peer: SocketAddr) -> Result<ProbeOutcome, crate::probe::ProbeError> {
        let session = ProbeSession::connect(
            peer,
            self.config.handshake.timeout,
            self.config.handshake.resend_interval,
        )
        .await?;
        session.run().await
    }

    async fn classify(&self, peer: Option<SocketAddr>, outcome: ProbeOutcome) -> ProbeVerdict {
        let peer = peer
            .map(|a| a.to_string())
            .unwrap_or_else(|| self.config.target.host.clone());

        match outcome {
            ProbeOutcome::Connected => {
                info!(peer = %peer, event = outcome.label(), "endpoint is healthy");
                ProbeVerdict::Healthy
            }

            ProbeOutcome::Disconnected | ProbeOutcome::Refused => {
                info!(peer = %peer, event = outcome.label(), "endpoint is unreachable");
                self.recover().await
            }

            ProbeOutcome::TimedOut => match self.config.handshake.on_timeout {
                TimeoutPolicy::Unhealthy => {
                    info!(
                        peer = %peer,
                        event = "DISCONNECT",
                        "no event within the handshake window, treating as unhealthy"
                    );
                    self.recover().await
                }
                TimeoutPolicy::Inconclusive => {
                    warn!(
                        peer = %peer,
                        event = outcome.label(),
                        "no event within the handshake window, result inconclusive"
                    );
                    ProbeVerdict::Inconclusive
                }
            },
        }
    }

    /// Invoked exactly once per failed probe; all retry cycles happen
    /// inside the recovery action itself.
    async fn recover(&self) -> ProbeVerdict {
        if !self.config.recovery.enabled {
            warn!("recovery action disabled, leaving the sidecar process running");
            return ProbeVerdict::Unhealthy { recovered: false };
        }

        match terminate(&self.config.recovery).await {
            Ok(report) => {
                info!(
                    attempts = report.attempts,
                    signaled = report.signaled,
                    "sidecar process stopped successfully"
                );
                ProbeVerdict::Unhealthy { recovered: true }
            }
            Err(e) => {
                error!(error = %e, "recovery action failed");
                ProbeVerdict::Unhealthy { recovered: false }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_documented_values() {
        assert_eq!(ProbeVerdict::Healthy.exit_code(), 0);
        assert_eq!(ProbeVerdict::Unhealthy { recovered: true }.exit_code(), 2);
        assert_eq!(ProbeVerdict::Unhealthy { recovered: false }.exit_code(), 3);
        assert_eq!(ProbeVerdict::Inconclusive.exit_code(), 4);
    }
}
