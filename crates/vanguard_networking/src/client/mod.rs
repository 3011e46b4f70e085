//! # Game Client
//!
//! Client side of a session: lobby requests out, server messages in, a
//! replicated world plus prediction for the local player.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         frame(dt, input)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  1. poll link ──▶ lobby/session messages ──▶ ClientEvent     │
//! │               ──▶ S_SNAPSHOT ──▶ ReplicationReceiver         │
//! │                     local player Transform ──▶ reconcile     │
//! │  2. predict local step, record it, send C_INPUT             │
//! │  3. health system (client effects only)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client mirrors its session state from what the server confirms; it
//! never moves itself forward on its own.

mod view;

pub use view::LobbyView;

use vanguard_core::{Component, Entity, Registry, ResourceManager};
use vanguard_shared::systems::health_system;
use vanguard_shared::{
    step_player, Capabilities, GameplayEvent, InputSnapshot, Role, Transform,
};

use crate::config::ClientConfig;
use crate::prediction::{Correction, PredictedStep, PredictionHistory};
use crate::protocol::{
    ChatMessage, ComponentPacket, Credentials, GameEvent, InputPacket, LobbyJoined,
    LobbySummary, LoginReply, Message, NotAuthorized, PlayerInfo, RoomsList, ScoreUpdate,
    VoiceFrame,
};
use crate::replication::ReplicationReceiver;
use crate::session::{ConnectionId, LobbyId, SessionState};
use crate::transport::{Datagram, Link};

/// What a frame surfaced to the application.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// The server assigned our connection id.
    Connected(ConnectionId),
    /// The unreliable channel is confirmed; authentication may start.
    UdpConfirmed,
    /// Registration or login succeeded. Keep the token for reconnects.
    LoggedIn {
        /// Token for `C_LOGIN_TOKEN`.
        token: String,
    },
    /// Registration, login or token login was refused.
    LoginFailed(GameEvent),
    /// Reply to a room listing.
    Rooms(Vec<LobbySummary>),
    /// A lobby we asked for was created.
    LobbyCreated(LobbyId),
    /// We are inside a lobby; see [`GameClient::lobby`].
    JoinedLobby(LobbyId),
    /// A join or create request was refused.
    JoinFailed,
    /// Someone entered our lobby.
    PlayerJoined(PlayerInfo),
    /// Someone left our lobby.
    PlayerLeft(ConnectionId),
    /// The host removed someone from our lobby.
    PlayerKicked(ConnectionId),
    /// The lobby changed host.
    NewHost(ConnectionId),
    /// A player toggled ready.
    ReadyChanged {
        /// The player.
        player: ConnectionId,
        /// New flag.
        ready: bool,
    },
    /// We left the lobby.
    LeftLobby,
    /// The host removed us from the lobby.
    Kicked,
    /// The match started.
    MatchStarted(LobbyId),
    /// The host's start request was refused.
    StartRefused(String),
    /// The server told us which entity we control.
    AssignedEntity(u64),
    /// A lobby chat line.
    Chat(ChatMessage),
    /// Voice from another player.
    Voice(VoiceFrame),
    /// A player died.
    PlayerDied(u64),
    /// A player's score changed.
    ScoreChanged(ScoreUpdate),
    /// The match is over.
    GameOver,
    /// Back in the lobby after a match.
    ReturnedToLobby,
    /// A request was sent before the connection could make it.
    NotAuthorized(NotAuthorized),
    /// Ping echo carrying the tick it was sent at.
    Pong(u32),
    /// The local player was corrected by the server.
    Corrected(Correction),
    /// A replicated entity took damage.
    Damaged {
        /// Local entity.
        entity: Entity,
        /// Hit points lost.
        amount: i32,
    },
    /// The link is gone.
    Disconnected,
}

/// Networked client over a link `L`.
pub struct GameClient<L: Link> {
    config: ClientConfig,
    link: L,
    id: Option<ConnectionId>,
    state: SessionState,
    registry: Registry,
    receiver: ReplicationReceiver,
    assets: ResourceManager<String>,
    lobby: Option<LobbyView>,
    local_guid: Option<u64>,
    tick: u32,
    open: bool,
}

impl<L: Link> GameClient<L> {
    /// Creates a client over an open link.
    #[must_use]
    pub fn new(config: ClientConfig, link: L) -> Self {
        Self {
            config,
            link,
            id: None,
            state: SessionState::None,
            registry: Registry::new(),
            receiver: ReplicationReceiver::with_shared_components(),
            assets: ResourceManager::new(|path| Some(path.to_owned())),
            lobby: None,
            local_guid: None,
            tick: 0,
            open: true,
        }
    }

    /// Connection id, once the server sent it.
    #[must_use]
    pub const fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    /// Session state as confirmed by the server.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Current lobby.
    #[must_use]
    pub const fn lobby(&self) -> Option<&LobbyView> {
        self.lobby.as_ref()
    }

    /// Replicated world.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Texture names seen in replicated sprites.
    #[must_use]
    pub const fn assets(&self) -> &ResourceManager<String> {
        &self.assets
    }

    /// Tick the next input will carry.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.tick
    }

    /// GUID of the entity we control.
    #[must_use]
    pub const fn local_guid(&self) -> Option<u64> {
        self.local_guid
    }

    /// Local entity we control, once replicated.
    #[must_use]
    pub fn local_entity(&self) -> Option<Entity> {
        self.local_guid
            .and_then(|guid| self.receiver.local_entity(guid))
            .filter(|&entity| self.registry.is_alive(entity))
    }

    /// Local entity for a server GUID.
    #[must_use]
    pub fn entity_of(&self, guid: u64) -> Option<Entity> {
        self.receiver.local_entity(guid)
    }

    /// Transform of the entity we control.
    #[must_use]
    pub fn local_transform(&self) -> Option<Transform> {
        let entity = self.local_entity()?;
        self.registry.get::<Transform>(entity).ok().copied()
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    fn send(&mut self, message: Message) -> bool {
        let message = message
            .from_origin(self.id.map_or(0, |id| id.0))
            .at_tick(self.tick);
        let datagram = Datagram {
            bytes: message.encode(),
            reliability: message.reliability(),
        };
        self.link.send(datagram)
    }

    /// Confirms the unreliable channel.
    pub fn confirm_udp(&mut self) -> bool {
        self.send(Message::new(GameEvent::CConfirmUdp))
    }

    /// Creates an account and logs in.
    pub fn register(&mut self, username: &str, password: &str) -> bool {
        let credentials = Credentials::new(username, password);
        self.send(Message::with_payload(GameEvent::CRegister, &credentials))
    }

    /// Logs in with a password.
    pub fn login(&mut self, username: &str, password: &str) -> bool {
        let credentials = Credentials::new(username, password);
        self.send(Message::with_payload(GameEvent::CLogin, &credentials))
    }

    /// Logs in with a token from an earlier session.
    pub fn login_with_token(&mut self, token: &str) -> bool {
        self.send(Message::with_payload(GameEvent::CLoginToken, &token.to_owned()))
    }

    /// Asks for the lobby list.
    pub fn list_rooms(&mut self) -> bool {
        self.send(Message::new(GameEvent::CListRooms))
    }

    /// Joins a lobby by id.
    pub fn join_room(&mut self, lobby: LobbyId) -> bool {
        self.send(Message::with_payload(GameEvent::CJoinRoom, &lobby.0))
    }

    /// Asks the server to remove `player` from our lobby. Host only.
    pub fn kick(&mut self, player: ConnectionId) -> bool {
        self.send(Message::with_payload(GameEvent::CKickPlayer, &player.0))
    }

    /// Joins the first lobby with room.
    pub fn join_random(&mut self) -> bool {
        self.send(Message::new(GameEvent::CJoinRandomLobby))
    }

    /// Creates a lobby and becomes its host.
    pub fn create_lobby(&mut self, name: &str) -> bool {
        self.send(Message::with_payload(GameEvent::CNewLobby, &name.to_owned()))
    }

    /// Leaves the current lobby.
    pub fn leave_lobby(&mut self) -> bool {
        self.send(Message::new(GameEvent::CRoomLeave))
    }

    /// Marks ourselves ready.
    pub fn ready(&mut self) -> bool {
        self.send(Message::new(GameEvent::CReady))
    }

    /// Withdraws ready.
    pub fn cancel_ready(&mut self) -> bool {
        self.send(Message::new(GameEvent::CCancelReady))
    }

    /// Asks to start the match. Host only.
    pub fn start_game(&mut self) -> bool {
        self.send(Message::new(GameEvent::CGameStart))
    }

    /// Sends a chat line to the lobby.
    pub fn chat(&mut self, text: &str) -> bool {
        self.send(Message::with_payload(GameEvent::CTeamChat, &text.to_owned()))
    }

    /// Sends a voice frame to the rest of the lobby.
    pub fn voice(&mut self, data: Vec<u8>) -> bool {
        self.send(Message::with_payload(GameEvent::CVoicePacket, &data))
    }

    /// Pings the server; the echo comes back as [`ClientEvent::Pong`].
    pub fn ping(&mut self) -> bool {
        let tick = self.tick;
        self.send(Message::with_payload(GameEvent::CPingServer, &tick))
    }

    /// Says goodbye. The server drops the session.
    pub fn disconnect(&mut self) -> bool {
        let sent = self.send(Message::new(GameEvent::CDisconnect));
        self.state = SessionState::Disconnected;
        sent
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Handles everything the server sent, without simulating.
    pub fn poll(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Some(datagram) = self.link.poll() {
            match Message::decode(&datagram.bytes) {
                Ok(message) => self.handle(&message, &mut events),
                Err(err) => tracing::debug!("dropping datagram from server: {}", err),
            }
        }
        if self.open && !self.link.is_open() {
            self.open = false;
            self.state = SessionState::Disconnected;
            events.push(ClientEvent::Disconnected);
        }
        events
    }

    /// One client frame: handle server messages, then, in a match, predict
    /// the local player with `input` and send it.
    pub fn frame(&mut self, dt: f32, input: InputSnapshot) -> Vec<ClientEvent> {
        let mut events = self.poll();
        if self.state != SessionState::InGame {
            return events;
        }

        if let Some(entity) = self.local_entity() {
            self.predict(entity, dt, input);
        }
        let packet = InputPacket {
            tick: self.tick,
            input,
        };
        self.send(Message::with_payload(GameEvent::CInput, &packet));
        self.tick = self.tick.wrapping_add(1);

        let mut gameplay = Vec::new();
        health_system(
            &mut self.registry,
            Capabilities::for_role(Role::Client),
            &self.config.gameplay,
            dt,
            &mut gameplay,
        );
        events.extend(gameplay.into_iter().filter_map(|event| match event {
            GameplayEvent::Damaged { entity, amount } => Some(ClientEvent::Damaged { entity, amount }),
            GameplayEvent::Died { .. } | GameplayEvent::Scored { .. } => None,
        }));
        events
    }

    fn predict(&mut self, entity: Entity, dt: f32, input: InputSnapshot) {
        let Ok(current) = self.registry.get::<Transform>(entity).copied() else {
            return;
        };
        let next = step_player(&current, input, self.config.gameplay.player_speed, dt);
        if let Ok(transform) = self.registry.get_mut::<Transform>(entity) {
            *transform = next;
        }
        if !self.registry.has::<PredictionHistory>(entity) {
            let history = PredictionHistory::new(self.config.history_capacity, self.config.snap_threshold);
            if let Err(err) = self.registry.add(entity, history) {
                tracing::warn!("no prediction history for {}: {}", entity, err);
                return;
            }
        }
        if let Ok(history) = self.registry.get_mut::<PredictionHistory>(entity) {
            history.record(PredictedStep {
                tick: self.tick,
                input,
                dt,
                state: next,
            });
        }
    }

    fn reconcile(&mut self, entity: Entity, tick: u32) -> Option<Correction> {
        let authoritative = self.registry.get::<Transform>(entity).ok().copied()?;
        let history = self.registry.get_mut::<PredictionHistory>(entity).ok()?;
        let correction = history.reconcile(authoritative, tick, self.config.gameplay.player_speed);
        if let Ok(transform) = self.registry.get_mut::<Transform>(entity) {
            *transform = correction.state();
        }
        Some(correction)
    }

    fn reset_world(&mut self) {
        self.registry = Registry::new();
        self.receiver = ReplicationReceiver::with_shared_components();
        self.local_guid = None;
    }

    fn is_me(&self, id: u32) -> bool {
        self.id.is_some_and(|me| me.0 == id)
    }

    fn handle(&mut self, message: &Message, events: &mut Vec<ClientEvent>) {
        // Inputs are tagged with the server tick they are meant for.
        self.tick = self.tick.max(message.tick.wrapping_add(1));

        match message.event {
            GameEvent::SSnapshot => self.on_snapshot(message, events),
            GameEvent::SEntityDestroy => {
                if let Ok(guid) = message.read::<u64>() {
                    self.receiver.apply_destroy(&mut self.registry, guid);
                }
            }
            _ => self.handle_session(message, events),
        }
    }

    fn on_snapshot(&mut self, message: &Message, events: &mut Vec<ClientEvent>) {
        let packet = match message.read::<ComponentPacket>() {
            Ok(packet) => packet,
            Err(err) => {
                tracing::debug!("bad snapshot: {}", err);
                return;
            }
        };
        let applied = match self
            .receiver
            .apply(&mut self.registry, &packet, message.tick, &mut self.assets)
        {
            Ok(applied) => applied,
            Err(err) => {
                tracing::debug!("snapshot dropped: {}", err);
                return;
            }
        };
        let Some(entity) = applied.entity() else {
            return;
        };
        if Some(packet.guid) == self.local_guid && packet.component_type == Transform::TYPE_ID {
            if let Some(correction) = self.reconcile(entity, message.tick) {
                if matches!(correction, Correction::Snap { replayed, .. } if replayed > 0) {
                    events.push(ClientEvent::Corrected(correction));
                }
            }
        }
    }

    fn handle_session(&mut self, message: &Message, events: &mut Vec<ClientEvent>) {
        let event = match message.event {
            GameEvent::SSendId => message.read::<u32>().ok().map(|id| {
                self.id = Some(ConnectionId(id));
                self.state = SessionState::WaitingUdpPing;
                ClientEvent::Connected(ConnectionId(id))
            }),
            GameEvent::SConfirmUdp => {
                self.state = SessionState::Connected;
                Some(ClientEvent::UdpConfirmed)
            }
            GameEvent::SLoginOk | GameEvent::SRegisterOk => {
                message.read::<LoginReply>().ok().map(|reply| {
                    self.state = SessionState::LoggedIn;
                    ClientEvent::LoggedIn { token: reply.token }
                })
            }
            GameEvent::SLoginKo | GameEvent::SRegisterKo | GameEvent::SInvalidToken => {
                Some(ClientEvent::LoginFailed(message.event))
            }
            GameEvent::SRoomsList => message
                .read::<RoomsList>()
                .ok()
                .map(|rooms| ClientEvent::Rooms(rooms.0)),
            GameEvent::SConfirmNewLobby => message
                .read::<u32>()
                .ok()
                .map(|id| ClientEvent::LobbyCreated(LobbyId(id))),
            GameEvent::SRoomJoined => message.read::<LobbyJoined>().ok().map(|joined| {
                let view = LobbyView::from(joined);
                let id = view.id;
                self.lobby = Some(view);
                self.state = SessionState::InLobby;
                ClientEvent::JoinedLobby(id)
            }),
            GameEvent::SRoomNotJoined => Some(ClientEvent::JoinFailed),
            GameEvent::SPlayerJoined => message.read::<PlayerInfo>().ok().map(|player| {
                if let Some(lobby) = &mut self.lobby {
                    lobby.upsert(player.clone());
                }
                ClientEvent::PlayerJoined(player)
            }),
            GameEvent::SPlayerLeave | GameEvent::SPlayerKicked => {
                let kicked = message.event == GameEvent::SPlayerKicked;
                message.read::<u32>().ok().map(|id| {
                    if let Some(lobby) = &mut self.lobby {
                        lobby.remove(ConnectionId(id));
                    }
                    if kicked {
                        ClientEvent::PlayerKicked(ConnectionId(id))
                    } else {
                        ClientEvent::PlayerLeft(ConnectionId(id))
                    }
                })
            }
            GameEvent::SNewHost => message.read::<u32>().ok().map(|id| {
                if let Some(lobby) = &mut self.lobby {
                    lobby.host = ConnectionId(id);
                }
                ClientEvent::NewHost(ConnectionId(id))
            }),
            GameEvent::SReadyReturn | GameEvent::SCancelReadyBroadcast => {
                let ready = message.event == GameEvent::SReadyReturn;
                message.read::<u32>().ok().map(|id| {
                    if let Some(lobby) = &mut self.lobby {
                        lobby.set_ready(ConnectionId(id), ready);
                    }
                    if self.is_me(id) {
                        self.state = if ready {
                            SessionState::Ready
                        } else {
                            SessionState::InLobby
                        };
                    }
                    ClientEvent::ReadyChanged {
                        player: ConnectionId(id),
                        ready,
                    }
                })
            }
            GameEvent::SRoomLeave | GameEvent::SRoomKicked => {
                self.lobby = None;
                self.state = SessionState::LoggedIn;
                if message.event == GameEvent::SRoomKicked {
                    Some(ClientEvent::Kicked)
                } else {
                    Some(ClientEvent::LeftLobby)
                }
            }
            GameEvent::SGameStart => message.read::<u32>().ok().map(|id| {
                self.reset_world();
                self.state = SessionState::InGame;
                ClientEvent::MatchStarted(LobbyId(id))
            }),
            GameEvent::SGameStartKo => message.read::<String>().ok().map(ClientEvent::StartRefused),
            GameEvent::SAssignPlayerEntity => message.read::<u64>().ok().map(|guid| {
                self.local_guid = Some(guid);
                ClientEvent::AssignedEntity(guid)
            }),
            GameEvent::STeamChat => message.read::<ChatMessage>().ok().map(ClientEvent::Chat),
            GameEvent::SVoiceRelay => message.read::<VoiceFrame>().ok().map(ClientEvent::Voice),
            GameEvent::SPlayerDeath => message.read::<u64>().ok().map(ClientEvent::PlayerDied),
            GameEvent::SScoreUpdate => message
                .read::<ScoreUpdate>()
                .ok()
                .map(ClientEvent::ScoreChanged),
            GameEvent::SGameOver => Some(ClientEvent::GameOver),
            GameEvent::SReturnToLobby => {
                self.reset_world();
                if let Some(lobby) = &mut self.lobby {
                    lobby.unready_all();
                }
                self.state = SessionState::InLobby;
                Some(ClientEvent::ReturnedToLobby)
            }
            GameEvent::SNotAuthorized => message
                .read::<NotAuthorized>()
                .ok()
                .map(ClientEvent::NotAuthorized),
            GameEvent::SPingServer => message.read::<u32>().ok().map(ClientEvent::Pong),
            other => {
                tracing::debug!("ignoring {:?}", other);
                None
            }
        };

        events.extend(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelTransport, Transport, TransportEvent};

    fn client() -> (ChannelTransport, GameClient<crate::ChannelEndpoint>) {
        let mut transport = ChannelTransport::new(32);
        let endpoint = transport.connect();
        assert!(matches!(transport.poll_inbound(), Some(TransportEvent::Connected(_))));
        (transport, GameClient::new(ClientConfig::default(), endpoint))
    }

    fn deliver(transport: &mut ChannelTransport, to: ConnectionId, message: &Message) {
        transport.send(
            to,
            Datagram {
                bytes: message.encode(),
                reliability: message.reliability(),
            },
        );
    }

    #[test]
    fn test_session_mirror_follows_server() {
        let (mut transport, mut client) = client();
        let me = ConnectionId(1);
        deliver(&mut transport, me, &Message::with_payload(GameEvent::SSendId, &1u32));
        deliver(&mut transport, me, &Message::new(GameEvent::SConfirmUdp));
        let events = client.poll();
        assert_eq!(events, vec![ClientEvent::Connected(me), ClientEvent::UdpConfirmed]);
        assert_eq!(client.state(), SessionState::Connected);

        let joined = LobbyJoined {
            lobby_id: 4,
            name: "room".to_owned(),
            host: 1,
            players: vec![PlayerInfo {
                id: 1,
                username: "ada".to_owned(),
                ready: false,
            }],
        };
        deliver(&mut transport, me, &Message::with_payload(GameEvent::SRoomJoined, &joined));
        deliver(&mut transport, me, &Message::with_payload(GameEvent::SReadyReturn, &1u32));
        client.poll();
        assert_eq!(client.state(), SessionState::Ready);
        assert!(client.lobby().unwrap().all_ready());
    }

    #[test]
    fn test_kick_notices_update_the_mirror() {
        let (mut transport, mut client) = client();
        let me = ConnectionId(2);
        let joined = LobbyJoined {
            lobby_id: 4,
            name: "room".to_owned(),
            host: 1,
            players: vec![
                PlayerInfo {
                    id: 1,
                    username: "ada".to_owned(),
                    ready: false,
                },
                PlayerInfo {
                    id: 2,
                    username: "bob".to_owned(),
                    ready: false,
                },
                PlayerInfo {
                    id: 3,
                    username: "eve".to_owned(),
                    ready: false,
                },
            ],
        };
        deliver(&mut transport, me, &Message::with_payload(GameEvent::SRoomJoined, &joined));
        deliver(&mut transport, me, &Message::with_payload(GameEvent::SPlayerKicked, &3u32));
        let events = client.poll();
        assert_eq!(events.last(), Some(&ClientEvent::PlayerKicked(ConnectionId(3))));
        assert_eq!(client.lobby().unwrap().players.len(), 2);

        deliver(&mut transport, me, &Message::new(GameEvent::SRoomKicked));
        assert_eq!(client.poll(), vec![ClientEvent::Kicked]);
        assert!(client.lobby().is_none());
        assert_eq!(client.state(), SessionState::LoggedIn);
    }

    #[test]
    fn test_score_update_surfaces() {
        let (mut transport, mut client) = client();
        let update = ScoreUpdate { guid: 9, score: 120 };
        deliver(
            &mut transport,
            ConnectionId(1),
            &Message::with_payload(GameEvent::SScoreUpdate, &update),
        );
        assert_eq!(client.poll(), vec![ClientEvent::ScoreChanged(update)]);
    }

    #[test]
    fn test_tick_follows_server() {
        let (mut transport, mut client) = client();
        deliver(
            &mut transport,
            ConnectionId(1),
            &Message::new(GameEvent::SConfirmUdp).at_tick(41),
        );
        client.poll();
        assert_eq!(client.tick(), 42);
    }

    #[test]
    fn test_no_input_outside_match() {
        let (mut transport, mut client) = client();
        client.frame(0.1, InputSnapshot::NONE);
        assert!(transport.poll_inbound().is_none());
    }

    #[test]
    fn test_closed_link_reported_once() {
        let (mut transport, mut client) = client();
        transport.refuse(ConnectionId(1));
        assert_eq!(client.poll(), vec![ClientEvent::Disconnected]);
        assert!(client.poll().is_empty());
        assert_eq!(client.state(), SessionState::Disconnected);
    }
}
