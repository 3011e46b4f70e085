//! Client-side picture of the lobby it sits in.

use crate::protocol::{LobbyJoined, PlayerInfo};
use crate::session::{ConnectionId, LobbyId};

/// Lobby roster as last told by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbyView {
    /// Lobby id.
    pub id: LobbyId,
    /// Display name.
    pub name: String,
    /// Current host.
    pub host: ConnectionId,
    /// Occupants in join order.
    pub players: Vec<PlayerInfo>,
}

impl From<LobbyJoined> for LobbyView {
    fn from(joined: LobbyJoined) -> Self {
        Self {
            id: LobbyId(joined.lobby_id),
            name: joined.name,
            host: ConnectionId(joined.host),
            players: joined.players,
        }
    }
}

impl LobbyView {
    /// Adds or replaces an occupant.
    pub fn upsert(&mut self, player: PlayerInfo) {
        match self.players.iter_mut().find(|known| known.id == player.id) {
            Some(known) => *known = player,
            None => self.players.push(player),
        }
    }

    /// Removes an occupant.
    pub fn remove(&mut self, player: ConnectionId) {
        self.players.retain(|known| known.id != player.0);
    }

    /// Sets an occupant's ready flag.
    pub fn set_ready(&mut self, player: ConnectionId, ready: bool) {
        if let Some(known) = self.players.iter_mut().find(|known| known.id == player.0) {
            known.ready = ready;
        }
    }

    /// Clears every ready flag, as after a match.
    pub fn unready_all(&mut self) {
        for player in &mut self.players {
            player.ready = false;
        }
    }

    /// Returns true if every occupant is ready.
    #[must_use]
    pub fn all_ready(&self) -> bool {
        self.players.iter().all(|player| player.ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32) -> PlayerInfo {
        PlayerInfo {
            id,
            username: format!("p{id}"),
            ready: false,
        }
    }

    #[test]
    fn test_roster_updates() {
        let mut view = LobbyView::from(LobbyJoined {
            lobby_id: 3,
            name: "room".to_owned(),
            host: 1,
            players: vec![player(1)],
        });
        view.upsert(player(2));
        view.upsert(player(2));
        assert_eq!(view.players.len(), 2);

        view.set_ready(ConnectionId(1), true);
        assert!(!view.all_ready());
        view.set_ready(ConnectionId(2), true);
        assert!(view.all_ready());

        view.remove(ConnectionId(1));
        view.unready_all();
        assert_eq!(view.players, vec![player(2)]);
    }
}
