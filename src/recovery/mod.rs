//! The recovery action: terminate the co-located sidecar process.

mod terminator;

pub use terminator::{terminate, RecoveryError, RecoveryReport};
