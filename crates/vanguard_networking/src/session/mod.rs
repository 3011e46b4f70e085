//! # Session State Machine
//!
//! Decides, per connection, which messages are accepted. Gameplay traffic is
//! refused until the connection is `IN_GAME`; lobby traffic until it is
//! `LOGGED_IN`; and so on. Lobbies live in an arena keyed by [`LobbyId`] and
//! each connection keeps the id of the lobby it sits in.

mod accounts;
mod lobby;
mod manager;
mod state;

pub use accounts::AccountStore;
pub use lobby::{Departure, Lobby, LobbyId, LobbyState};
pub use manager::{Connection, Dispatch, Outgoing, SessionEvent, SessionManager};
pub use state::{floor_of, SessionState};

/// Connection identifier assigned by the transport. `0` is the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// The server itself, as the origin of every server message.
    pub const SERVER: Self = Self(0);
}
