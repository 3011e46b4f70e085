//! # VANGUARD Networking
//!
//! Everything between the component stores and the socket.
//!
//! ## Architecture
//!
//! - **Protocol**: 16-byte header + event-specific payload, little-endian
//! - **Session**: per-connection state machine, lobbies, accounts
//! - **Replication**: dirty components out, GUID-keyed components in
//! - **Prediction**: client history of local steps, reconciled on update
//! - **Transport**: inbound/outbound queues, the only cross-thread handoff
//!
//! ## Authority Model
//!
//! ```text
//! CLIENT                               SERVER
//!   |--- C_INPUT (tick, actions) ------->|
//!   |     predict locally                | <- session gate: IN_GAME only
//!   |                                    | <- gameplay systems
//!   |<-- S_SNAPSHOT (guid, type, bytes) -| <- dirty drain
//!   |     reconcile                      |
//! ```
//!
//! The client never decides outcomes. Anything it sends before its
//! connection reaches the right state is answered with `S_NOT_AUTHORIZED`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vanguard_networking::{ArenaRules, ChannelTransport, GameServer, ServerConfig};
//!
//! let config = ServerConfig::load("server.toml")?;
//! let mut transport = ChannelTransport::new(config.queue_capacity);
//! let endpoint = transport.connect();
//! let mut server = GameServer::new(config.clone(), transport, ArenaRules::new(config.gameplay));
//! loop {
//!     server.tick();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod error;
pub mod prediction;
pub mod protocol;
pub mod replication;
pub mod server;
pub mod session;
pub mod transport;

pub use client::{ClientEvent, GameClient, LobbyView};
pub use config::{ClientConfig, ServerConfig};
pub use error::{
    ConfigError, ProtocolError, ProtocolResult, ReplicationError, ReplicationResult, SessionError,
    SessionResult,
};
pub use prediction::{Correction, PredictedStep, PredictionHistory};
pub use protocol::{GameEvent, Message, MessageHeader, Reliability, ScoreUpdate};
pub use replication::{Applied, GuidSource, ReplicationReceiver, ReplicationSender, ScopedMessage};
pub use server::{ArenaRules, GameRules, GameServer, RulesEvent, ServerWorld};
pub use session::{ConnectionId, LobbyId, SessionManager, SessionState};
pub use transport::{ChannelEndpoint, ChannelTransport, Datagram, Link, Transport, TransportEvent};

/// Default server tick rate (updates per second).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Default number of simultaneous connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 20;

/// Default lobby size.
pub const DEFAULT_MAX_PLAYERS: usize = 4;
