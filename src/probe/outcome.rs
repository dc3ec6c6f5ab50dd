//! Probe outcome classification.

/// How a single handshake attempt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint completed the handshake within the window.
    Connected,
    /// The endpoint produced a disconnect event (an explicit disconnect
    /// command, or a verify-connect that failed the acceptance check).
    Disconnected,
    /// Nothing listens at the target: the connect was refused at the
    /// transport level (ICMP port unreachable). Disconnect-equivalent.
    Refused,
    /// The window closed with no event at all.
    TimedOut,
}

impl ProbeOutcome {
    /// Only a completed handshake counts as healthy.
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Connected)
    }

    /// The event tag logged next to the peer address, mirroring the
    /// harness's expected output vocabulary.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Connected => "CONNECT",
            ProbeOutcome::Disconnected | ProbeOutcome::Refused => "DISCONNECT",
            ProbeOutcome::TimedOut => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connected_is_healthy() {
        assert!(ProbeOutcome::Connected.is_healthy());
        assert!(!ProbeOutcome::Disconnected.is_healthy());
        assert!(!ProbeOutcome::Refused.is_healthy());
        assert!(!ProbeOutcome::TimedOut.is_healthy());
    }

    #[test]
    fn test_refusal_is_disconnect_equivalent() {
        assert_eq!(ProbeOutcome::Refused.label(), "DISCONNECT");
        assert_eq!(ProbeOutcome::Disconnected.label(), "DISCONNECT");
    }
}
