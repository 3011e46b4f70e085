//! Lobbies.

use super::ConnectionId;
use crate::error::{SessionError, SessionResult};
use crate::protocol::LobbySummary;

/// Lobby identifier. Allocated monotonically, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LobbyId(pub u32);

/// Whether a lobby is gathering players or playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LobbyState {
    /// Accepting joins.
    #[default]
    WaitingForPlayers,
    /// Match running; joins refused.
    InGame,
}

/// What a departure did to the lobby.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Departure {
    /// The connection was not an occupant.
    NotPresent,
    /// Someone else is still host.
    Left,
    /// The host left; the earliest remaining joiner took over.
    HostChanged(ConnectionId),
    /// Nobody is left; the lobby should be deleted.
    Emptied,
}

/// A group of connections that start a match together.
#[derive(Clone, Debug)]
pub struct Lobby {
    /// Lobby id.
    pub id: LobbyId,
    /// Display name.
    pub name: String,
    occupants: Vec<ConnectionId>,
    host: ConnectionId,
    /// Waiting or playing.
    pub state: LobbyState,
    /// Capacity.
    pub max_players: usize,
}

impl Lobby {
    /// Creates a lobby with `host` as its only occupant.
    #[must_use]
    pub fn new(id: LobbyId, name: String, host: ConnectionId, max_players: usize) -> Self {
        Self {
            id,
            name,
            occupants: vec![host],
            host,
            state: LobbyState::WaitingForPlayers,
            max_players,
        }
    }

    /// Current host.
    #[inline]
    #[must_use]
    pub const fn host(&self) -> ConnectionId {
        self.host
    }

    /// Occupants in join order.
    #[inline]
    #[must_use]
    pub fn occupants(&self) -> &[ConnectionId] {
        &self.occupants
    }

    /// Returns true if no one else can join.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupants.len() >= self.max_players
    }

    /// Returns true if the lobby takes joins right now.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == LobbyState::WaitingForPlayers && !self.is_full()
    }

    /// Adds a connection at the end of the join order.
    ///
    /// # Errors
    ///
    /// `MatchInProgress` while playing, `LobbyFull` at capacity,
    /// `AlreadyInLobby` if `who` is already an occupant.
    pub fn join(&mut self, who: ConnectionId) -> SessionResult<()> {
        if self.state == LobbyState::InGame {
            return Err(SessionError::MatchInProgress);
        }
        if self.occupants.contains(&who) {
            return Err(SessionError::AlreadyInLobby);
        }
        if self.is_full() {
            return Err(SessionError::LobbyFull(self.id));
        }
        self.occupants.push(who);
        Ok(())
    }

    /// Removes a connection, migrating the host if needed.
    pub fn leave(&mut self, who: ConnectionId) -> Departure {
        let Some(position) = self.occupants.iter().position(|&id| id == who) else {
            return Departure::NotPresent;
        };
        self.occupants.remove(position);
        match self.occupants.first() {
            None => Departure::Emptied,
            Some(&next) if self.host == who => {
                self.host = next;
                Departure::HostChanged(next)
            }
            Some(_) => Departure::Left,
        }
    }

    /// Listing row.
    #[must_use]
    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            id: self.id.0,
            name: self.name.clone(),
            players: u32::try_from(self.occupants.len()).unwrap_or(u32::MAX),
            max_players: u32::try_from(self.max_players).unwrap_or(u32::MAX),
            in_game: self.state == LobbyState::InGame,
        }
    }
}
