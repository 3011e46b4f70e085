//! # Transport Boundary
//!
//! The only place data crosses threads. The server sees a [`Transport`]:
//! an inbound event queue plus a per-peer send. A client sees a [`Link`].
//!
//! [`ChannelTransport`] implements both sides over bounded
//! `crossbeam-channel` queues. It is used in-process (tests, local play) and
//! as the shape any socket-backed transport has to fit.
//!
//! ## Delivery
//!
//! - Reliable datagrams are never dropped silently; a full queue is logged
//!   as a warning and reported to the caller
//! - Unreliable datagrams are dropped when the queue is full

use std::collections::HashMap;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::protocol::Reliability;
use crate::session::ConnectionId;

/// One encoded message and the channel it travels on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
    /// Encoded message.
    pub bytes: Vec<u8>,
    /// Channel.
    pub reliability: Reliability,
}

/// What the server's I/O side reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer opened a connection.
    Connected(ConnectionId),
    /// A peer went away.
    Disconnected(ConnectionId),
    /// A peer sent a datagram.
    Received {
        /// Sender.
        from: ConnectionId,
        /// The datagram.
        datagram: Datagram,
    },
}

/// Server side of the I/O boundary.
pub trait Transport {
    /// Queues a datagram for one peer. Returns false if it was not queued.
    fn send(&mut self, to: ConnectionId, datagram: Datagram) -> bool;

    /// Next inbound event, if any.
    fn poll_inbound(&mut self) -> Option<TransportEvent>;

    /// Drops a peer: refused at admission or disconnected by the server.
    fn refuse(&mut self, id: ConnectionId);
}

/// Client side of the I/O boundary.
pub trait Link {
    /// Queues a datagram for the server. Returns false if it was not queued.
    fn send(&mut self, datagram: Datagram) -> bool;

    /// Next datagram from the server, if any.
    fn poll(&mut self) -> Option<Datagram>;

    /// Returns false once the server dropped the link.
    fn is_open(&self) -> bool;
}

fn report_full(reliability: Reliability, target: &str) {
    match reliability {
        Reliability::Reliable => tracing::warn!("{} queue full, reliable datagram not queued", target),
        Reliability::Unreliable => tracing::debug!("{} queue full, unreliable datagram dropped", target),
    }
}

/// In-process transport over bounded channels.
///
/// Connection ids start at 1; 0 is the server.
pub struct ChannelTransport {
    inbound_tx: Sender<TransportEvent>,
    inbound_rx: Receiver<TransportEvent>,
    peers: HashMap<ConnectionId, Sender<Datagram>>,
    next_id: u32,
    capacity: usize,
}

impl ChannelTransport {
    /// Creates a transport whose queues each hold `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = bounded(capacity);
        Self {
            inbound_tx,
            inbound_rx,
            peers: HashMap::new(),
            next_id: 1,
            capacity,
        }
    }

    /// Opens a new peer and returns its end of the link.
    pub fn connect(&mut self) -> ChannelEndpoint {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let (to_peer, from_server) = bounded(self.capacity);
        self.peers.insert(id, to_peer);
        if self.inbound_tx.try_send(TransportEvent::Connected(id)).is_err() {
            tracing::warn!("inbound queue full, connect of {:?} lost", id);
        }
        ChannelEndpoint {
            id,
            to_server: self.inbound_tx.clone(),
            from_server,
            open: true,
        }
    }

    /// Number of peers the server can still reach.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, to: ConnectionId, datagram: Datagram) -> bool {
        let Some(peer) = self.peers.get(&to) else {
            tracing::debug!("send to unknown peer {:?}", to);
            return false;
        };
        let reliability = datagram.reliability;
        match peer.try_send(datagram) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                report_full(reliability, "outbound");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.peers.remove(&to);
                false
            }
        }
    }

    fn poll_inbound(&mut self) -> Option<TransportEvent> {
        self.inbound_rx.try_recv().ok()
    }

    fn refuse(&mut self, id: ConnectionId) {
        if self.peers.remove(&id).is_some() {
            tracing::debug!("dropped peer {:?}", id);
        }
    }
}

/// A peer's end of a [`ChannelTransport`]. Dropping it disconnects.
pub struct ChannelEndpoint {
    id: ConnectionId,
    to_server: Sender<TransportEvent>,
    from_server: Receiver<Datagram>,
    open: bool,
}

impl ChannelEndpoint {
    /// Id the transport assigned to this peer.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Link for ChannelEndpoint {
    fn send(&mut self, datagram: Datagram) -> bool {
        if !self.open {
            return false;
        }
        let reliability = datagram.reliability;
        let event = TransportEvent::Received {
            from: self.id,
            datagram,
        };
        match self.to_server.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                report_full(reliability, "inbound");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.open = false;
                false
            }
        }
    }

    fn poll(&mut self) -> Option<Datagram> {
        match self.from_server.try_recv() {
            Ok(datagram) => Some(datagram),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.open = false;
                None
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) {
        if self.open {
            let _ = self
                .to_server
                .try_send(TransportEvent::Disconnected(self.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datagram(byte: u8, reliability: Reliability) -> Datagram {
        Datagram {
            bytes: vec![byte],
            reliability,
        }
    }

    #[test]
    fn test_connect_then_exchange() {
        let mut transport = ChannelTransport::new(8);
        let mut endpoint = transport.connect();
        assert_eq!(endpoint.id(), ConnectionId(1));
        assert_eq!(
            transport.poll_inbound(),
            Some(TransportEvent::Connected(ConnectionId(1)))
        );

        assert!(endpoint.send(datagram(7, Reliability::Reliable)));
        assert_eq!(
            transport.poll_inbound(),
            Some(TransportEvent::Received {
                from: ConnectionId(1),
                datagram: datagram(7, Reliability::Reliable)
            })
        );

        assert!(transport.send(ConnectionId(1), datagram(9, Reliability::Unreliable)));
        assert_eq!(endpoint.poll(), Some(datagram(9, Reliability::Unreliable)));
        assert_eq!(endpoint.poll(), None);
        assert!(endpoint.is_open());
    }

    #[test]
    fn test_refused_peer_sees_closed_link() {
        let mut transport = ChannelTransport::new(8);
        let mut endpoint = transport.connect();
        transport.refuse(endpoint.id());
        assert_eq!(endpoint.poll(), None);
        assert!(!endpoint.is_open());
        assert!(!transport.send(endpoint.id(), datagram(1, Reliability::Reliable)));
        assert_eq!(transport.peer_count(), 0);
    }

    #[test]
    fn test_drop_reports_disconnect() {
        let mut transport = ChannelTransport::new(8);
        let endpoint = transport.connect();
        let id = endpoint.id();
        drop(endpoint);
        transport.poll_inbound();
        assert_eq!(transport.poll_inbound(), Some(TransportEvent::Disconnected(id)));
    }

    #[test]
    fn test_full_queue_drops() {
        let mut transport = ChannelTransport::new(1);
        let mut endpoint = transport.connect();
        assert!(transport.send(endpoint.id(), datagram(1, Reliability::Unreliable)));
        assert!(!transport.send(endpoint.id(), datagram(2, Reliability::Unreliable)));
        assert_eq!(endpoint.poll(), Some(datagram(1, Reliability::Unreliable)));
    }
}
