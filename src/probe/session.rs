//! One reliable-UDP handshake attempt.
//!
//! The session binds an ephemeral socket, `connect()`s it to the target
//! (so ICMP unreachable errors surface as `ECONNREFUSED` and datagrams
//! from other sources never reach us), sends the connect request, and
//! services replies until the deadline. While the request is
//! unacknowledged it is retransmitted on a fixed cadence.

use crate::probe::ProbeOutcome;
use crate::wire::{
    parse_datagram, Acknowledge, Command, CommandHeader, Connect, DatagramBuilder, PacketHeader,
    VerifyConnect, CHANNEL_NONE,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

/// Initial reliable sequence number of the connect command.
const CONNECT_SEQ: u16 = 1;

/// Errors preventing the handshake from being attempted or completed.
///
/// These are local failures (socket setup, send, receive), not verdicts
/// about the peer; the runner treats them as peer-unavailable.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to set up probe socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to send connect request: {0}")]
    Send(#[source] io::Error),

    #[error("socket receive failed: {0}")]
    Recv(#[source] io::Error),
}

/// A single in-flight handshake toward one target address.
pub struct ProbeSession {
    socket: UdpSocket,
    target: SocketAddr,
    request: Connect,
    timeout: Duration,
    resend_interval: Duration,
    started: Instant,
}

impl ProbeSession {
    /// Bind an ephemeral local endpoint and aim it at `target`.
    pub async fn connect(
        target: SocketAddr,
        timeout: Duration,
        resend_interval: Duration,
    ) -> Result<Self, ProbeError> {
        let bind_ip: IpAddr = if target.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let bind_addr = SocketAddr::new(bind_ip, 0);
        let socket = UdpSocket::bind(bind_addr).await.map_err(ProbeError::Socket)?;
        socket.connect(target).await.map_err(ProbeError::Socket)?;

        Ok(Self {
            socket,
            target,
            request: Connect::outgoing(rand::random()),
            timeout,
            resend_interval,
            started: Instant::now(),
        })
    }

    /// Drive the handshake to an outcome within the configured window.
    pub async fn run(self) -> Result<ProbeOutcome, ProbeError> {
        let deadline = self.started + self.timeout;

        match self.send_connect().await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                return Ok(ProbeOutcome::Refused);
            }
            Err(e) => return Err(ProbeError::Send(e)),
        }

        let mut acknowledged = false;
        let mut next_resend = Instant::now() + self.resend_interval;
        let mut buf = vec![0u8; 2048];

        loop {
            let wait_until = if acknowledged {
                deadline
            } else {
                deadline.min(next_resend)
            };

            match timeout_at(wait_until, self.socket.recv(&mut buf)).await {
                // Nothing arrived before the nearer of deadline and resend.
                Err(_elapsed) => {
                    if wait_until >= deadline {
                        return Ok(ProbeOutcome::TimedOut);
                    }
                    match self.send_connect().await {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                            return Ok(ProbeOutcome::Refused);
                        }
                        Err(e) => return Err(ProbeError::Send(e)),
                    }
                    next_resend = Instant::now() + self.resend_interval;
                }

                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Ok(ProbeOutcome::Refused);
                }
                Ok(Err(e)) => return Err(ProbeError::Recv(e)),

                Ok(Ok(n)) => {
                    if let Some(outcome) = self.handle_datagram(&buf[..n], &mut acknowledged).await?
                    {
                        return Ok(outcome);
                    }
                }
            }
        }
    }

    /// Low 16 bits of the session clock, in milliseconds.
    fn sent_time(&self) -> u16 {
        self.started.elapsed().as_millis() as u16
    }

    async fn send_connect(&self) -> io::Result<()> {
        let packet = DatagramBuilder::new(PacketHeader::connecting(self.sent_time()))
            .command(
                CommandHeader::reliable(CHANNEL_NONE, CONNECT_SEQ),
                &Command::Connect(self.request),
            )
            .finish();
        trace!(peer = %self.target, bytes = packet.len(), "sending connect request");
        self.socket.send(&packet).await.map(|_| ())
    }

    async fn handle_datagram(
        &self,
        data: &[u8],
        acknowledged: &mut bool,
    ) -> Result<Option<ProbeOutcome>, ProbeError> {
        let datagram = match parse_datagram(data) {
            Ok(datagram) => datagram,
            Err(e) => {
                // Not our protocol, or damaged in transit. Keep waiting.
                debug!(error = %e, "ignoring unparseable datagram");
                return Ok(None);
            }
        };

        for parsed in &datagram.commands {
            match parsed.command {
                Command::Acknowledge(ack) => {
                    if ack.received_reliable_seq == CONNECT_SEQ {
                        trace!("connect request acknowledged");
                        *acknowledged = true;
                    }
                }

                Command::VerifyConnect(verify) => {
                    if !verify.matches(&self.request) {
                        // The reference behavior zombies the peer on a bad
                        // verify-connect; to the caller that is a disconnect.
                        debug!(
                            connect_id = verify.connect_id,
                            expected = self.request.connect_id,
                            "verify-connect failed the acceptance check"
                        );
                        return Ok(Some(ProbeOutcome::Disconnected));
                    }
                    self.acknowledge(&datagram.header, parsed.header, &verify)
                        .await?;
                    return Ok(Some(ProbeOutcome::Connected));
                }

                Command::Disconnect(_) => {
                    return Ok(Some(ProbeOutcome::Disconnected));
                }

                // The handshake neither sends data nor answers pings.
                Command::Connect(_) | Command::Ping => {}
            }
        }

        Ok(None)
    }

    /// The verify-connect carries the acknowledge flag; answer it before
    /// reporting the handshake complete.
    async fn acknowledge(
        &self,
        packet: &PacketHeader,
        command: CommandHeader,
        verify: &VerifyConnect,
    ) -> Result<(), ProbeError> {
        let ack = Command::Acknowledge(Acknowledge {
            received_reliable_seq: command.reliable_seq,
            received_sent_time: packet.sent_time.unwrap_or(0),
        });
        let reply = DatagramBuilder::new(PacketHeader::assigned(
            verify.outgoing_peer_id,
            verify.outgoing_session_id,
            self.sent_time(),
        ))
        .command(CommandHeader::unreliable(command.channel_id, 0), &ack)
        .finish();
        self.socket.send(&reply).await.map_err(ProbeError::Send)?;
        Ok(())
    }
}
