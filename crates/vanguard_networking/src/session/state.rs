//! Connection states and per-event state floors.

use crate::protocol::GameEvent;

/// Lifecycle of one connection.
///
/// ```text
/// NONE -> WAITING_UDP_PING -> CONNECTED -> LOGGED_IN -> IN_LOBBY <-> READY -> IN_GAME
///                                                            any -> DISCONNECTED
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Not accepted yet.
    #[default]
    None = 0,
    /// Accepted on the reliable channel, unreliable channel unconfirmed.
    WaitingUdpPing = 1,
    /// Both channels up.
    Connected = 2,
    /// Authenticated.
    LoggedIn = 3,
    /// Sitting in a lobby.
    InLobby = 4,
    /// Ready for the host to start.
    Ready = 5,
    /// Playing.
    InGame = 6,
    /// Terminal.
    Disconnected = 7,
}

impl SessionState {
    /// Parses the wire form.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::WaitingUdpPing),
            2 => Some(Self::Connected),
            3 => Some(Self::LoggedIn),
            4 => Some(Self::InLobby),
            5 => Some(Self::Ready),
            6 => Some(Self::InGame),
            7 => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// Returns true if this state satisfies `floor`. A disconnected
    /// connection satisfies nothing.
    #[inline]
    #[must_use]
    pub const fn meets(self, floor: Self) -> bool {
        !matches!(self, Self::Disconnected) && self as u8 >= floor as u8
    }

    /// Corrective prompt for a connection that is below `floor`.
    #[must_use]
    pub const fn prompt_for(floor: Self) -> &'static str {
        match floor {
            Self::None | Self::WaitingUdpPing | Self::Connected => {
                "confirm the unreliable channel first"
            }
            Self::LoggedIn => "authenticate first",
            Self::InLobby | Self::Ready => "join a lobby first",
            Self::InGame => "wait for the match to start",
            Self::Disconnected => "reconnect",
        }
    }
}

/// Minimum state a connection needs to send `event`, or `None` if clients
/// may never send it.
#[must_use]
pub const fn floor_of(event: GameEvent) -> Option<SessionState> {
    let floor = match event {
        GameEvent::CPingServer | GameEvent::CDisconnect | GameEvent::CConfirmUdp => {
            SessionState::WaitingUdpPing
        }
        GameEvent::CRegister | GameEvent::CLogin | GameEvent::CLoginToken => {
            SessionState::Connected
        }
        GameEvent::CListRooms
        | GameEvent::CJoinRoom
        | GameEvent::CJoinRandomLobby
        | GameEvent::CNewLobby
        | GameEvent::CRoomLeave => SessionState::LoggedIn,
        GameEvent::CReady
        | GameEvent::CCancelReady
        | GameEvent::CGameStart
        | GameEvent::CTeamChat
        | GameEvent::CVoicePacket
        | GameEvent::CKickPlayer => SessionState::InLobby,
        GameEvent::CInput => SessionState::InGame,
        _ => return None,
    };
    Some(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floors_are_ordered() {
        assert!(SessionState::InGame.meets(SessionState::InLobby));
        assert!(SessionState::Ready.meets(SessionState::InLobby));
        assert!(!SessionState::InLobby.meets(SessionState::InGame));
        assert!(!SessionState::Disconnected.meets(SessionState::None));
    }

    #[test]
    fn test_every_client_event_has_a_floor() {
        for event in GameEvent::ALL {
            assert_eq!(floor_of(event).is_some(), event.is_client_event(), "{event:?}");
        }
        assert_eq!(floor_of(GameEvent::CInput), Some(SessionState::InGame));
    }

    #[test]
    fn test_wire_form() {
        for value in 0..8 {
            assert_eq!(SessionState::from_u8(value).map(|s| s as u8), Some(value));
        }
        assert_eq!(SessionState::from_u8(8), None);
    }
}
