//! Protocol header handling and datagram assembly/parsing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::wire::command::{Command, CommandHeader};

/// Peer id carried before the remote side assigns one.
pub const PEER_ID_UNASSIGNED: u16 = 0x0FFF;
/// Session id carried before the handshake assigns one.
pub const SESSION_UNASSIGNED: u8 = 0xFF;
/// Channel id for commands that address the peer rather than a channel.
pub const CHANNEL_NONE: u8 = 0xFF;

// Protocol header flag bits and field masks. The leading u16 packs the
// sent-time flag, the compressed flag, a 2-bit session id, and the peer id.
const HEADER_FLAG_SENT_TIME: u16 = 1 << 15;
const HEADER_FLAG_COMPRESSED: u16 = 1 << 14;
const HEADER_SESSION_SHIFT: u16 = 12;
const HEADER_SESSION_MASK: u16 = 0x3;
const HEADER_PEER_ID_MASK: u16 = 0x0FFF;

/// Errors from encoding or parsing wire data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated packet: missing {0}")]
    Truncated(&'static str),

    #[error("compressed packets are not supported")]
    Compressed,
}

/// The per-datagram protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Peer id on the receiving host, [`PEER_ID_UNASSIGNED`] before the
    /// handshake completes.
    pub peer_id: u16,
    /// 2-bit session id; only the low two bits are encoded.
    pub session_id: u8,
    /// Send timestamp (low 16 bits of the sender clock, milliseconds).
    /// Present whenever the datagram carries commands that want an ack.
    pub sent_time: Option<u16>,
}

impl PacketHeader {
    /// Header for the initial connect datagram: no peer or session
    /// assigned yet, sent time included so the ack can echo it.
    pub fn connecting(sent_time: u16) -> Self {
        Self {
            peer_id: PEER_ID_UNASSIGNED,
            session_id: 0,
            sent_time: Some(sent_time),
        }
    }

    /// Header for a datagram addressed to an established peer.
    pub fn assigned(peer_id: u16, session_id: u8, sent_time: u16) -> Self {
        Self {
            peer_id,
            session_id,
            sent_time: Some(sent_time),
        }
    }

    fn encode(&self, buf: &mut BytesMut) {
        let mut field = self.peer_id & HEADER_PEER_ID_MASK;
        field |= ((self.session_id as u16) & HEADER_SESSION_MASK) << HEADER_SESSION_SHIFT;
        if self.sent_time.is_some() {
            field |= HEADER_FLAG_SENT_TIME;
        }
        buf.put_u16(field);
        if let Some(sent_time) = self.sent_time {
            buf.put_u16(sent_time);
        }
    }

    fn parse(buf: &mut &[u8]) -> Result<Self, WireError> {
        if buf.remaining() < 2 {
            return Err(WireError::Truncated("packet header"));
        }
        let field = buf.get_u16();
        // The probe configures no compressor.
        if field & HEADER_FLAG_COMPRESSED != 0 {
            return Err(WireError::Compressed);
        }
        let sent_time = if field & HEADER_FLAG_SENT_TIME != 0 {
            if buf.remaining() < 2 {
                return Err(WireError::Truncated("sent time"));
            }
            Some(buf.get_u16())
        } else {
            None
        };
        Ok(Self {
            peer_id: field & HEADER_PEER_ID_MASK,
            session_id: ((field >> HEADER_SESSION_SHIFT) & HEADER_SESSION_MASK) as u8,
            sent_time,
        })
    }
}

/// One command pulled out of a datagram, with its per-command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCommand {
    pub header: CommandHeader,
    pub command: Command,
}

/// A parsed datagram: the protocol header plus every modeled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub header: PacketHeader,
    pub commands: Vec<ParsedCommand>,
}

/// Parse a received datagram.
///
/// A datagram may bundle several commands back-to-back (the reference
/// implementation sends the connect-ack and the verify-connect in one
/// datagram). The walk stops at the first command number the probe does
/// not model; truncated input is an error.
pub fn parse_datagram(mut buf: &[u8]) -> Result<Datagram, WireError> {
    let header = PacketHeader::parse(&mut buf)?;
    let mut commands = Vec::new();
    while !buf.is_empty() {
        match Command::parse(&mut buf)? {
            Some((header, command)) => commands.push(ParsedCommand { header, command }),
            None => break,
        }
    }
    Ok(Datagram { header, commands })
}

/// Builder assembling an outgoing datagram: protocol header first, then
/// any number of commands.
pub struct DatagramBuilder {
    buf: BytesMut,
}

impl DatagramBuilder {
    pub fn new(header: PacketHeader) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        header.encode(&mut buf);
        Self { buf }
    }

    /// Append one command (header + body).
    pub fn command(mut self, header: CommandHeader, command: &Command) -> Self {
        command.encode(&header, &mut self.buf);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::command::{Acknowledge, Connect, VerifyConnect};

    #[test]
    fn test_packet_header_roundtrip() {
        let header = PacketHeader::assigned(42, 2, 0x1234);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), 4);

        let mut slice = &buf[..];
        let parsed = PacketHeader::parse(&mut slice).unwrap();
        assert_eq!(parsed, header);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_packet_header_without_sent_time() {
        let header = PacketHeader {
            peer_id: 7,
            session_id: 0,
            sent_time: None,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), 2);

        let mut slice = &buf[..];
        assert_eq!(PacketHeader::parse(&mut slice).unwrap(), header);
    }

    #[test]
    fn test_compressed_packets_are_rejected() {
        let buf = [0x40u8, 0x00];
        assert_eq!(parse_datagram(&buf), Err(WireError::Compressed));
    }

    #[test]
    fn test_truncated_header_is_an_error() {
        assert_eq!(
            parse_datagram(&[0x80]),
            Err(WireError::Truncated("packet header"))
        );
        // Sent-time flag set but no sent time follows.
        assert_eq!(
            parse_datagram(&[0x8F, 0xFF]),
            Err(WireError::Truncated("sent time"))
        );
    }

    #[test]
    fn test_connect_datagram_is_52_bytes() {
        let packet = DatagramBuilder::new(PacketHeader::connecting(0))
            .command(
                CommandHeader::reliable(CHANNEL_NONE, 1),
                &Command::Connect(Connect::outgoing(1)),
            )
            .finish();
        assert_eq!(packet.len(), 52);
    }

    #[test]
    fn test_multi_command_datagram_parses() {
        let request = Connect::outgoing(99);
        let verify = VerifyConnect {
            outgoing_peer_id: 0,
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
            connect_id: request.connect_id,
        };
        let packet = DatagramBuilder::new(PacketHeader::assigned(0, 0, 5))
            .command(
                CommandHeader::unreliable(CHANNEL_NONE, 0),
                &Command::Acknowledge(Acknowledge {
                    received_reliable_seq: 1,
                    received_sent_time: 0,
                }),
            )
            .command(
                CommandHeader::reliable(CHANNEL_NONE, 1),
                &Command::VerifyConnect(verify),
            )
            .finish();

        let datagram = parse_datagram(&packet).unwrap();
        assert_eq!(datagram.header.sent_time, Some(5));
        assert_eq!(datagram.commands.len(), 2);
        assert!(matches!(
            datagram.commands[0].command,
            Command::Acknowledge(_)
        ));
        assert_eq!(
            datagram.commands[1].command,
            Command::VerifyConnect(verify)
        );
        assert!(datagram.commands[1].header.wants_ack());
    }

    #[test]
    fn test_unknown_command_stops_the_walk() {
        let mut buf = BytesMut::new();
        PacketHeader::assigned(0, 0, 0).encode(&mut buf);
        Command::Ping.encode(&CommandHeader::unreliable(CHANNEL_NONE, 0), &mut buf);
        // Command number 12 (send-fragment) is outside the modeled set.
        buf.extend_from_slice(&[0x0C, 0x00, 0x00, 0x02, 0xAA, 0xBB]);

        let datagram = parse_datagram(&buf).unwrap();
        assert_eq!(datagram.commands.len(), 1);
        assert_eq!(datagram.commands[0].command, Command::Ping);
    }

    #[test]
    fn test_header_only_datagram_has_no_commands() {
        let mut buf = BytesMut::new();
        PacketHeader::assigned(3, 1, 0).encode(&mut buf);
        let datagram = parse_datagram(&buf).unwrap();
        assert!(datagram.commands.is_empty());
    }
}
