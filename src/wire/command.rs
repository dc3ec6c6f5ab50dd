//! Command encoding and decoding for the handshake subset.

use bytes::{Buf, BufMut, BytesMut};

use crate::wire::packet::WireError;

/// Acknowledge command number.
pub const COMMAND_ACKNOWLEDGE: u8 = 1;
/// Connect command number.
pub const COMMAND_CONNECT: u8 = 2;
/// Verify-connect command number.
pub const COMMAND_VERIFY_CONNECT: u8 = 3;
/// Disconnect command number.
pub const COMMAND_DISCONNECT: u8 = 4;
/// Ping command number.
pub const COMMAND_PING: u8 = 5;

/// The receiver must acknowledge this command.
pub const COMMAND_FLAG_ACKNOWLEDGE: u8 = 1 << 7;
/// The command is delivered outside the reliable sequence space.
pub const COMMAND_FLAG_UNSEQUENCED: u8 = 1 << 6;

/// Low bits of the command byte carry the command number.
const COMMAND_NUMBER_MASK: u8 = 0x0F;
const COMMAND_FLAG_MASK: u8 = COMMAND_FLAG_ACKNOWLEDGE | COMMAND_FLAG_UNSEQUENCED;

/// Smallest channel count a peer may request.
pub const MINIMUM_CHANNEL_COUNT: u32 = 1;
/// Largest channel count a peer may request.
pub const MAXIMUM_CHANNEL_COUNT: u32 = 255;

// Host parameters of a single-peer probe endpoint: default MTU, maximum
// window (no outgoing bandwidth limit), default packet throttle.
const DEFAULT_MTU: u32 = 1400;
const MAXIMUM_WINDOW_SIZE: u32 = 65536;
const THROTTLE_INTERVAL: u32 = 5000;
const THROTTLE_ACCELERATION: u32 = 2;
const THROTTLE_DECELERATION: u32 = 2;

/// Per-command header: flags, channel, reliable sequence number.
///
/// The command number itself lives in [`Command`]; encoding merges it with
/// the flags into the leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub flags: u8,
    pub channel_id: u8,
    pub reliable_seq: u16,
}

impl CommandHeader {
    /// Header for a reliable command (acknowledge flag set).
    pub fn reliable(channel_id: u8, reliable_seq: u16) -> Self {
        Self {
            flags: COMMAND_FLAG_ACKNOWLEDGE,
            channel_id,
            reliable_seq,
        }
    }

    /// Header for a plain command with no delivery flags.
    pub fn unreliable(channel_id: u8, reliable_seq: u16) -> Self {
        Self {
            flags: 0,
            channel_id,
            reliable_seq,
        }
    }

    /// Does this command ask the receiver for an acknowledgement?
    pub fn wants_ack(&self) -> bool {
        self.flags & COMMAND_FLAG_ACKNOWLEDGE != 0
    }
}

/// Connect request body sent by an outgoing peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect {
    pub outgoing_peer_id: u16,
    pub incoming_session_id: u8,
    pub outgoing_session_id: u8,
    pub mtu: u32,
    pub window_size: u32,
    pub channel_count: u32,
    pub incoming_bandwidth: u32,
    pub outgoing_bandwidth: u32,
    pub packet_throttle_interval: u32,
    pub packet_throttle_acceleration: u32,
    pub packet_throttle_deceleration: u32,
    pub connect_id: u32,
    pub data: u32,
}

impl Connect {
    /// Connect request for a fresh single-channel outgoing peer.
    ///
    /// Session ids start unassigned (0xFF) and the peer occupies slot 0 of
    /// a one-peer host; everything else is the reference host defaults for
    /// an endpoint created with no bandwidth limits.
    pub fn outgoing(connect_id: u32) -> Self {
        Self {
            outgoing_peer_id: 0,
            incoming_session_id: crate::wire::SESSION_UNASSIGNED,
            outgoing_session_id: crate::wire::SESSION_UNASSIGNED,
            mtu: DEFAULT_MTU,
            window_size: MAXIMUM_WINDOW_SIZE,
            channel_count: MINIMUM_CHANNEL_COUNT,
            incoming_bandwidth: 0,
            outgoing_bandwidth: 0,
            packet_throttle_interval: THROTTLE_INTERVAL,
            packet_throttle_acceleration: THROTTLE_ACCELERATION,
            packet_throttle_deceleration: THROTTLE_DECELERATION,
            connect_id,
            data: 0,
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.outgoing_peer_id);
        buf.put_u8(self.incoming_session_id);
        buf.put_u8(self.outgoing_session_id);
        buf.put_u32(self.mtu);
        buf.put_u32(self.window_size);
        buf.put_u32(self.channel_count);
        buf.put_u32(self.incoming_bandwidth);
        buf.put_u32(self.outgoing_bandwidth);
        buf.put_u32(self.packet_throttle_interval);
        buf.put_u32(self.packet_throttle_acceleration);
        buf.put_u32(self.packet_throttle_deceleration);
        buf.put_u32(self.connect_id);
        buf.put_u32(self.data);
    }

    fn parse(buf: &mut &[u8]) -> Self {
        Self {
            outgoing_peer_id: buf.get_u16(),
            incoming_session_id: buf.get_u8(),
            outgoing_session_id: buf.get_u8(),
            mtu: buf.get_u32(),
            window_size: buf.get_u32(),
            channel_count: buf.get_u32(),
            incoming_bandwidth: buf.get_u32(),
            outgoing_bandwidth: buf.get_u32(),
            packet_throttle_interval: buf.get_u32(),
            packet_throttle_acceleration: buf.get_u32(),
            packet_throttle_deceleration: buf.get_u32(),
            connect_id: buf.get_u32(),
            data: buf.get_u32(),
        }
    }
}

/// Verify-connect body: the accepting side's answer to [`Connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyConnect {
    pub outgoing_peer_id: u16,
    pub incoming_session_id: u8,
    pub outgoing_session_id: u8,
    pub mtu: u32,
    pub window_size: u32,
    pub channel_count: u32,
    pub incoming_bandwidth: u32,
    pub outgoing_bandwidth: u32,
    pub packet_throttle_interval: u32,
    pub packet_throttle_acceleration: u32,
    pub packet_throttle_deceleration: u32,
    pub connect_id: u32,
}

impl VerifyConnect {
    /// Acceptance check a connecting peer applies before it considers the
    /// handshake complete.
    ///
    /// The reference behavior: channel count within protocol bounds,
    /// throttle parameters echoed unchanged, and the connect id matching
    /// the one from the request. Anything else zombies the peer, which the
    /// caller surfaces as a disconnect.
    pub fn matches(&self, request: &Connect) -> bool {
        (MINIMUM_CHANNEL_COUNT..=MAXIMUM_CHANNEL_COUNT).contains(&self.channel_count)
            && self.packet_throttle_interval == request.packet_throttle_interval
            && self.packet_throttle_acceleration == request.packet_throttle_acceleration
            && self.packet_throttle_deceleration == request.packet_throttle_deceleration
            && self.connect_id == request.connect_id
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.outgoing_peer_id);
        buf.put_u8(self.incoming_session_id);
        buf.put_u8(self.outgoing_session_id);
        buf.put_u32(self.mtu);
        buf.put_u32(self.window_size);
        buf.put_u32(self.channel_count);
        buf.put_u32(self.incoming_bandwidth);
        buf.put_u32(self.outgoing_bandwidth);
        buf.put_u32(self.packet_throttle_interval);
        buf.put_u32(self.packet_throttle_acceleration);
        buf.put_u32(self.packet_throttle_deceleration);
        buf.put_u32(self.connect_id);
    }

    fn parse(buf: &mut &[u8]) -> Self {
        Self {
            outgoing_peer_id: buf.get_u16(),
            incoming_session_id: buf.get_u8(),
            outgoing_session_id: buf.get_u8(),
            mtu: buf.get_u32(),
            window_size: buf.get_u32(),
            channel_count: buf.get_u32(),
            incoming_bandwidth: buf.get_u32(),
            outgoing_bandwidth: buf.get_u32(),
            packet_throttle_interval: buf.get_u32(),
            packet_throttle_acceleration: buf.get_u32(),
            packet_throttle_deceleration: buf.get_u32(),
            connect_id: buf.get_u32(),
        }
    }
}

/// Acknowledge body: echoes the acked command's sequence number and the
/// sent time from the packet that carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledge {
    pub received_reliable_seq: u16,
    pub received_sent_time: u16,
}

/// Disconnect body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnect {
    pub data: u32,
}

/// A command body the probe models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Acknowledge(Acknowledge),
    Connect(Connect),
    VerifyConnect(VerifyConnect),
    Disconnect(Disconnect),
    Ping,
}

impl Command {
    /// Protocol number of this command.
    pub fn number(&self) -> u8 {
        match self {
            Command::Acknowledge(_) => COMMAND_ACKNOWLEDGE,
            Command::Connect(_) => COMMAND_CONNECT,
            Command::VerifyConnect(_) => COMMAND_VERIFY_CONNECT,
            Command::Disconnect(_) => COMMAND_DISCONNECT,
            Command::Ping => COMMAND_PING,
        }
    }

    /// Body size in bytes for a command number, excluding the command
    /// header. `None` for command numbers the probe does not model.
    pub(crate) fn body_size(number: u8) -> Option<usize> {
        match number {
            COMMAND_ACKNOWLEDGE => Some(4),
            COMMAND_CONNECT => Some(44),
            COMMAND_VERIFY_CONNECT => Some(44),
            COMMAND_DISCONNECT => Some(4),
            COMMAND_PING => Some(0),
            _ => None,
        }
    }

    pub(crate) fn encode(&self, header: &CommandHeader, buf: &mut BytesMut) {
        buf.put_u8(self.number() | (header.flags & COMMAND_FLAG_MASK));
        buf.put_u8(header.channel_id);
        buf.put_u16(header.reliable_seq);
        match self {
            Command::Acknowledge(ack) => {
                buf.put_u16(ack.received_reliable_seq);
                buf.put_u16(ack.received_sent_time);
            }
            Command::Connect(connect) => connect.encode(buf),
            Command::VerifyConnect(verify) => verify.encode(buf),
            Command::Disconnect(disconnect) => buf.put_u32(disconnect.data),
            Command::Ping => {}
        }
    }

    /// Parse one command (header + body) from the front of `buf`.
    ///
    /// Returns `Ok(None)` when the leading command number is one the probe
    /// does not model; the caller stops walking the datagram there, the
    /// way the reference parser abandons a packet at an unknown command.
    pub(crate) fn parse(buf: &mut &[u8]) -> Result<Option<(CommandHeader, Command)>, WireError> {
        if buf.remaining() < 4 {
            return Err(WireError::Truncated("command header"));
        }
        let lead = buf.get_u8();
        let number = lead & COMMAND_NUMBER_MASK;
        let header = CommandHeader {
            flags: lead & COMMAND_FLAG_MASK,
            channel_id: buf.get_u8(),
            reliable_seq: buf.get_u16(),
        };
        let Some(size) = Command::body_size(number) else {
            return Ok(None);
        };
        if buf.remaining() < size {
            return Err(WireError::Truncated("command body"));
        }
        let body = match number {
            COMMAND_ACKNOWLEDGE => Command::Acknowledge(Acknowledge {
                received_reliable_seq: buf.get_u16(),
                received_sent_time: buf.get_u16(),
            }),
            COMMAND_CONNECT => Command::Connect(Connect::parse(buf)),
            COMMAND_VERIFY_CONNECT => Command::VerifyConnect(VerifyConnect::parse(buf)),
            COMMAND_DISCONNECT => Command::Disconnect(Disconnect {
                data: buf.get_u32(),
            }),
            COMMAND_PING => Command::Ping,
            _ => unreachable!("body_size filtered unknown command numbers"),
        };
        Ok(Some((header, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_connect_defaults() {
        let connect = Connect::outgoing(0xDEAD_BEEF);
        assert_eq!(connect.outgoing_peer_id, 0);
        assert_eq!(connect.incoming_session_id, 0xFF);
        assert_eq!(connect.outgoing_session_id, 0xFF);
        assert_eq!(connect.mtu, 1400);
        assert_eq!(connect.window_size, 65536);
        assert_eq!(connect.channel_count, 1);
        assert_eq!(connect.incoming_bandwidth, 0);
        assert_eq!(connect.outgoing_bandwidth, 0);
        assert_eq!(connect.packet_throttle_interval, 5000);
        assert_eq!(connect.connect_id, 0xDEAD_BEEF);
    }

    #[test]
    fn test_verify_connect_matches() {
        let request = Connect::outgoing(42);
        let verify = VerifyConnect {
            outgoing_peer_id: 7,
            incoming_session_id: 0,
            outgoing_session_id: 0,
            mtu: request.mtu,
            window_size: request.window_size,
            channel_count: 1,
            incoming_bandwidth: 0,
            outgoing_bandwidth: 0,
            packet_throttle_interval: request.packet_throttle_interval,
            packet_throttle_acceleration: request.packet_throttle_acceleration,
            packet_throttle_deceleration: request.packet_throttle_deceleration,
            connect_id: 42,
        };
        assert!(verify.matches(&request));

        let wrong_id = VerifyConnect {
            connect_id: 43,
            ..verify
        };
        assert!(!wrong_id.matches(&request));

        let zero_channels = VerifyConnect {
            channel_count: 0,
            ..verify
        };
        assert!(!zero_channels.matches(&request));
    }

    #[test]
    fn test_command_sizes_follow_reference_tables() {
        // Reference sizes include the 4-byte command header.
        assert_eq!(Command::body_size(COMMAND_ACKNOWLEDGE), Some(8 - 4));
        assert_eq!(Command::body_size(COMMAND_CONNECT), Some(48 - 4));
        assert_eq!(Command::body_size(COMMAND_VERIFY_CONNECT), Some(48 - 4));
        assert_eq!(Command::body_size(COMMAND_DISCONNECT), Some(8 - 4));
        assert_eq!(Command::body_size(COMMAND_PING), Some(4 - 4));
        assert_eq!(Command::body_size(0x0E), None);
    }

    #[test]
    fn test_command_roundtrip() {
        let mut buf = BytesMut::new();
        let header = CommandHeader::reliable(0xFF, 1);
        let command = Command::Connect(Connect::outgoing(0x1234_5678));
        command.encode(&header, &mut buf);
        assert_eq!(buf.len(), 48);

        let mut slice = &buf[..];
        let (parsed_header, parsed) = Command::parse(&mut slice).unwrap().unwrap();
        assert_eq!(parsed_header, header);
        assert_eq!(parsed, command);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_truncated_command_body_is_an_error() {
        let mut buf = BytesMut::new();
        let header = CommandHeader::reliable(0xFF, 1);
        Command::Connect(Connect::outgoing(1)).encode(&header, &mut buf);

        let mut slice = &buf[..buf.len() - 1];
        assert_eq!(
            Command::parse(&mut slice),
            Err(WireError::Truncated("command body"))
        );

        let mut slice = &buf[..3];
        assert_eq!(
            Command::parse(&mut slice),
            Err(WireError::Truncated("command header"))
        );
    }

    #[test]
    fn test_unknown_command_number_parses_to_none() {
        // Send-unreliable (7) with a plausible header: not modeled.
        let raw = [0x07u8, 0x00, 0x00, 0x01, 0xDE, 0xAD];
        let mut slice = &raw[..];
        assert_eq!(Command::parse(&mut slice), Ok(None));
    }
}
