//! # Networking Error Types
//!
//! One enum per concern. None of these cross a tick boundary: the caller
//! logs them and skips the unit of work, except admission failures which
//! refuse the connection.

use thiserror::Error;
use vanguard_core::ComponentTypeId;

use crate::protocol::GameEvent;
use crate::session::{ConnectionId, LobbyId, SessionState};

/// Errors decoding a message off the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than a header.
    #[error("message truncated: need {needed} bytes, got {got}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes received.
        got: usize,
    },

    /// Event id outside the known enum.
    #[error("unknown event id {0}")]
    UnknownEvent(u32),

    /// Header size field disagrees with the datagram.
    #[error("payload size mismatch: header says {declared}, datagram carries {actual}")]
    SizeMismatch {
        /// Size announced by the header.
        declared: u32,
        /// Bytes actually following the header.
        actual: usize,
    },

    /// Payload does not parse as the event's layout.
    #[error("malformed {0:?} payload")]
    BadPayload(GameEvent),
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors applying a replicated component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// No deserializer registered for the type id.
    #[error("no deserializer for component type {0}")]
    UnknownWireType(ComponentTypeId),

    /// The GUID was already destroyed on this peer.
    #[error("entity {0:#018x} was already destroyed")]
    StaleGuid(u64),

    /// Payload did not decode as the registered type.
    #[error("malformed {component} payload for entity {guid:#018x}")]
    Malformed {
        /// Target GUID.
        guid: u64,
        /// Component name.
        component: &'static str,
    },
}

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Errors raised by the session state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The connection has not reached the state the request needs.
    #[error("requires {required:?}, connection is {current:?}")]
    StateViolation {
        /// Minimum state.
        required: SessionState,
        /// Actual state.
        current: SessionState,
    },

    /// Connection limit reached.
    #[error("server full ({max} connections)")]
    CapacityExceeded {
        /// Configured maximum.
        max: usize,
    },

    /// Bad credentials, taken username or unknown token.
    #[error("authentication failed: {0}")]
    AuthFailure(&'static str),

    /// No such connection.
    #[error("unknown connection {0:?}")]
    UnknownConnection(ConnectionId),

    /// No such lobby.
    #[error("lobby {0:?} not found")]
    LobbyNotFound(LobbyId),

    /// The lobby cannot take another player.
    #[error("lobby {0:?} is full")]
    LobbyFull(LobbyId),

    /// The connection already sits in a lobby.
    #[error("already in a lobby")]
    AlreadyInLobby,

    /// Only the host may do this.
    #[error("only the host can do that")]
    NotHost,

    /// The target is not in the requester's lobby.
    #[error("{0:?} is not in this lobby")]
    NotInLobby(ConnectionId),

    /// Someone in the lobby is not ready.
    #[error("not every player is ready")]
    PlayersNotReady,

    /// The lobby is playing.
    #[error("match in progress")]
    MatchInProgress,
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for the expected table.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but make no sense.
    #[error("invalid config: {0}")]
    Invalid(String),
}
