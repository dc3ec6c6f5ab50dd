//! The probe runner and its handshake session.

mod outcome;
mod runner;
mod session;

pub use outcome::ProbeOutcome;
pub use runner::{ProbeRunner, ProbeVerdict};
pub use session::{ProbeError, ProbeSession};
