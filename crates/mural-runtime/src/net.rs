#![forbid(unsafe_code)]

//! Outbound side of the coordination network.
//!
//! Sends are fire-and-forget: failures are logged and never retried, the
//! next interaction re-derives whatever a lost message would have changed.

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;

use mural_core::WindowId;
use mural_wire::{Envelope, encode};
use tracing::{trace, warn};

use crate::config::InstallationConfig;

/// Where a node's messages go.
pub trait Outbound {
    /// Send `envelope` to the process hosting `peer`, or to everyone when
    /// `peer` is `None`.
    fn send(&mut self, envelope: &Envelope, peer: Option<WindowId>);
}

/// UDP broadcast with optional unicast per peer window.
#[derive(Debug, Clone)]
pub struct UdpOutbound {
    socket: Arc<UdpSocket>,
    broadcast: SocketAddr,
    peers: BTreeMap<WindowId, SocketAddr>,
}

impl UdpOutbound {
    #[must_use]
    pub fn new(
        socket: Arc<UdpSocket>,
        broadcast: SocketAddr,
        peers: BTreeMap<WindowId, SocketAddr>,
    ) -> Self {
        Self {
            socket,
            broadcast,
            peers,
        }
    }

    /// Outbound over `socket` using the broadcast address and peers of `config`.
    pub fn from_config(socket: Arc<UdpSocket>, config: &InstallationConfig) -> io::Result<Self> {
        let ip: IpAddr = config
            .network
            .broadcast
            .parse()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        socket.set_broadcast(true)?;
        Ok(Self::new(
            socket,
            SocketAddr::new(ip, config.network.port),
            config.peer_addresses(),
        ))
    }
}

impl Outbound for UdpOutbound {
    fn send(&mut self, envelope: &Envelope, peer: Option<WindowId>) {
        let bytes = match encode(envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, kind = envelope.message.kind(), "dropping unencodable message");
                return;
            }
        };
        let target = peer
            .and_then(|p| self.peers.get(&p).copied())
            .unwrap_or(self.broadcast);
        match self.socket.send_to(&bytes, target) {
            Ok(_) => trace!(%target, kind = envelope.message.kind(), len = bytes.len(), "sent"),
            Err(err) => warn!(%target, error = %err, "send failed"),
        }
    }
}

/// Collects sent envelopes in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutbound {
    pub sent: Vec<(Envelope, Option<WindowId>)>,
}

impl RecordingOutbound {
    /// Take everything sent so far.
    pub fn take(&mut self) -> Vec<(Envelope, Option<WindowId>)> {
        std::mem::take(&mut self.sent)
    }
}

impl Outbound for RecordingOutbound {
    fn send(&mut self, envelope: &Envelope, peer: Option<WindowId>) {
        self.sent.push((envelope.clone(), peer));
    }
}

/// Bind the coordination and sensor sockets of a node.
pub fn bind_sockets(config: &InstallationConfig) -> io::Result<(Arc<UdpSocket>, Arc<UdpSocket>)> {
    let ip: IpAddr = config
        .network
        .bind
        .parse()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let coordination = UdpSocket::bind(SocketAddr::new(ip, config.network.port))?;
    let sensor = UdpSocket::bind(SocketAddr::new(ip, config.network.sensor_port))?;
    Ok((Arc::new(coordination), Arc::new(sensor)))
}
