//! Event ids and their delivery channel.

/// Delivery guarantee of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reliability {
    /// Ordered, never dropped.
    Reliable,
    /// Best effort; may be dropped under load.
    Unreliable,
}

/// Every message kind on the wire. `C` events travel client to server,
/// `S` events server to client.
///
/// The numeric value is the `event` field of the header; new events are
/// only ever appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GameEvent {
    /// Placeholder, never sent.
    None = 0,
    /// Transport-level connect notice.
    ConnectionPlayer = 1,
    /// Connection id assigned on accept.
    SSendId = 2,
    /// Latency check.
    CPingServer = 3,
    /// Latency check echo.
    SPingServer = 4,
    /// Account creation.
    CRegister = 5,
    /// Account created, carries a token.
    SRegisterOk = 6,
    /// Account creation refused.
    SRegisterKo = 7,
    /// Password login.
    CLogin = 8,
    /// Token login.
    CLoginToken = 9,
    /// Token unknown.
    SInvalidToken = 10,
    /// Logged in, carries a fresh token.
    SLoginOk = 11,
    /// Credentials refused.
    SLoginKo = 12,
    /// Graceful disconnect.
    CDisconnect = 13,
    /// Unreliable channel confirmed.
    SConfirmUdp = 14,
    /// First datagram on the unreliable channel.
    CConfirmUdp = 15,
    /// Lobby listing request.
    CListRooms = 16,
    /// Lobby listing.
    SRoomsList = 17,
    /// Join a lobby by id.
    CJoinRoom = 18,
    /// Join any open lobby.
    CJoinRandomLobby = 19,
    /// Join accepted, carries the lobby roster.
    SRoomJoined = 20,
    /// Another player joined.
    SPlayerJoined = 21,
    /// Join refused.
    SRoomNotJoined = 22,
    /// Leave the current lobby.
    CRoomLeave = 23,
    /// Another player left.
    SPlayerLeave = 24,
    /// Leave accepted.
    SRoomLeave = 25,
    /// Another player was kicked.
    SPlayerKicked = 26,
    /// You were kicked.
    SRoomKicked = 27,
    /// Host changed, carries the new host id.
    SNewHost = 28,
    /// Create a lobby.
    CNewLobby = 29,
    /// Lobby created, carries its id.
    SConfirmNewLobby = 30,
    /// Mark ready.
    CReady = 31,
    /// Someone is ready.
    SReadyReturn = 32,
    /// Host asks to start the match.
    CGameStart = 33,
    /// Match started.
    SGameStart = 34,
    /// Withdraw readiness.
    CCancelReady = 35,
    /// Someone withdrew readiness.
    SCancelReadyBroadcast = 36,
    /// Per-tick player input.
    CInput = 37,
    /// One replicated component.
    SSnapshot = 38,
    /// Lobby chat line.
    CTeamChat = 39,
    /// Lobby chat fan-out.
    STeamChat = 40,
    /// Voice frame.
    CVoicePacket = 41,
    /// Voice frame fan-out.
    SVoiceRelay = 42,
    /// A player entity died.
    SPlayerDeath = 43,
    /// Score change notice.
    SScoreUpdate = 44,
    /// Match ended.
    SGameOver = 45,
    /// Back in the lobby after a match.
    SReturnToLobby = 46,
    /// Start refused, carries the reason.
    SGameStartKo = 47,
    /// Request below the connection's state floor.
    SNotAuthorized = 48,
    /// Replicated entity destroyed, carries its GUID.
    SEntityDestroy = 49,
    /// GUID of the entity the client controls.
    SAssignPlayerEntity = 50,
    /// Host removes a player from the lobby, carries their id.
    CKickPlayer = 51,
}

impl GameEvent {
    /// Every event, indexed by its numeric value.
    pub const ALL: [Self; 52] = [
        Self::None,
        Self::ConnectionPlayer,
        Self::SSendId,
        Self::CPingServer,
        Self::SPingServer,
        Self::CRegister,
        Self::SRegisterOk,
        Self::SRegisterKo,
        Self::CLogin,
        Self::CLoginToken,
        Self::SInvalidToken,
        Self::SLoginOk,
        Self::SLoginKo,
        Self::CDisconnect,
        Self::SConfirmUdp,
        Self::CConfirmUdp,
        Self::CListRooms,
        Self::SRoomsList,
        Self::CJoinRoom,
        Self::CJoinRandomLobby,
        Self::SRoomJoined,
        Self::SPlayerJoined,
        Self::SRoomNotJoined,
        Self::CRoomLeave,
        Self::SPlayerLeave,
        Self::SRoomLeave,
        Self::SPlayerKicked,
        Self::SRoomKicked,
        Self::SNewHost,
        Self::CNewLobby,
        Self::SConfirmNewLobby,
        Self::CReady,
        Self::SReadyReturn,
        Self::CGameStart,
        Self::SGameStart,
        Self::CCancelReady,
        Self::SCancelReadyBroadcast,
        Self::CInput,
        Self::SSnapshot,
        Self::CTeamChat,
        Self::STeamChat,
        Self::CVoicePacket,
        Self::SVoiceRelay,
        Self::SPlayerDeath,
        Self::SScoreUpdate,
        Self::SGameOver,
        Self::SReturnToLobby,
        Self::SGameStartKo,
        Self::SNotAuthorized,
        Self::SEntityDestroy,
        Self::SAssignPlayerEntity,
        Self::CKickPlayer,
    ];

    /// Parses a header event id.
    #[inline]
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Channel this event travels on.
    #[must_use]
    pub const fn reliability(self) -> Reliability {
        match self {
            Self::CInput
            | Self::SSnapshot
            | Self::CVoicePacket
            | Self::SVoiceRelay
            | Self::CConfirmUdp => Reliability::Unreliable,
            _ => Reliability::Reliable,
        }
    }

    /// Returns true for events a client may send.
    #[must_use]
    pub const fn is_client_event(self) -> bool {
        matches!(
            self,
            Self::CPingServer
                | Self::CRegister
                | Self::CLogin
                | Self::CLoginToken
                | Self::CDisconnect
                | Self::CConfirmUdp
                | Self::CListRooms
                | Self::CJoinRoom
                | Self::CJoinRandomLobby
                | Self::CRoomLeave
                | Self::CNewLobby
                | Self::CReady
                | Self::CGameStart
                | Self::CCancelReady
                | Self::CInput
                | Self::CTeamChat
                | Self::CVoicePacket
                | Self::CKickPlayer
        )
    }
}
