//! Probe-run identifiers.
//!
//! Each probe execution tags its log records with a unique id so an
//! orchestrator scraping sidecar logs can correlate the banner, the
//! outcome line, and any recovery lines of one run.

use uuid::Uuid;

/// Identifier for one probe execution, carried in the probe's tracing span.
#[derive(Clone, Debug)]
pub struct RunId(String);

impl RunId {
    /// Create a new random run id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the run id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
