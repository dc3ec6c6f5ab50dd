//! udprobe - a sidecar health probe for UDP endpoints
//!
//! This crate performs a single connection-oriented handshake over UDP
//! (the ENet connect/verify-connect exchange) against a target endpoint,
//! classifies the result within a bounded window, and on failure tears
//! down a co-located proxy process so the surrounding load-balancer
//! harness can detect and route around the node:
//! - One probe attempt per process invocation, no retries
//! - Deterministic classification: connect, disconnect, refusal, timeout
//! - Bounded recovery with documented exit codes

pub mod config;
pub mod probe;
pub mod recovery;
pub mod util;
pub mod wire;

pub use config::ProbeConfig;
pub use probe::{ProbeOutcome, ProbeRunner, ProbeVerdict};
