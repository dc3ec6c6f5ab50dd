//! Minimal ENet wire-protocol support.
//!
//! The probe speaks just enough of the ENet protocol to perform a connect
//! handshake: the protocol header, the connect / verify-connect commands,
//! and the acknowledge / disconnect / ping commands that can show up in a
//! reply. Channels, fragmentation, compression, and the data-transfer
//! commands are deliberately out of scope.
//!
//! All multi-byte fields are big-endian. Command sizes include the 4-byte
//! command header, matching the reference protocol tables.

mod command;
mod packet;

pub use command::{
    Acknowledge, Command, CommandHeader, Connect, Disconnect, VerifyConnect, COMMAND_ACKNOWLEDGE,
    COMMAND_CONNECT, COMMAND_DISCONNECT, COMMAND_FLAG_ACKNOWLEDGE, COMMAND_FLAG_UNSEQUENCED,
    COMMAND_PING, COMMAND_VERIFY_CONNECT, MAXIMUM_CHANNEL_COUNT, MINIMUM_CHANNEL_COUNT,
};
pub use packet::{
    parse_datagram, Datagram, DatagramBuilder, PacketHeader, ParsedCommand, WireError,
    CHANNEL_NONE, PEER_ID_UNASSIGNED, SESSION_UNASSIGNED,
};
