//! # Session Manager
//!
//! Server-side owner of every connection, lobby and account.
//!
//! ```text
//! inbound Message ──> channel check ──> state floor ──> handler
//!                          │                 │              │
//!                       Rejected      S_NOT_AUTHORIZED   outbox / events
//! ```
//!
//! Handlers never send directly. Replies are queued in an outbox the server
//! flushes once per tick, and lifecycle changes the gameplay layer cares
//! about (match start, player loss) are queued as [`SessionEvent`]s.

use std::collections::BTreeMap;

use rand::distributions::Alphanumeric;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::accounts::AccountStore;
use super::lobby::{Departure, Lobby, LobbyId, LobbyState};
use super::state::{floor_of, SessionState};
use super::ConnectionId;
use crate::config::ServerConfig;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{
    ChatMessage, Credentials, GameEvent, LobbyJoined, LoginReply, Message, NotAuthorized,
    PlayerInfo, Reliability, RoomsList, VoiceFrame,
};

/// Length of issued login tokens.
const TOKEN_LENGTH: usize = 10;

/// Per-connection session record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    /// Transport id.
    pub id: ConnectionId,
    /// Lifecycle state.
    pub state: SessionState,
    /// Account name once authenticated.
    pub username: Option<String>,
    /// Lobby the connection sits in.
    pub lobby: Option<LobbyId>,
}

/// A message queued for one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outgoing {
    /// Recipient.
    pub to: ConnectionId,
    /// The message.
    pub message: Message,
}

/// Outcome of [`SessionManager::handle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Consumed by the session layer.
    Handled,
    /// Accepted gameplay traffic; the caller routes it to the game rules.
    Forward,
    /// Refused; any reply is already queued.
    Rejected,
}

/// Lifecycle changes the gameplay layer reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A lobby entered `IN_GAME`.
    MatchStarted {
        /// The lobby.
        lobby: LobbyId,
        /// Occupants in join order.
        players: Vec<ConnectionId>,
    },
    /// A player dropped out of a running match.
    PlayerLeft {
        /// The player.
        connection: ConnectionId,
        /// The lobby they left.
        lobby: LobbyId,
    },
    /// A match is over, either ended or abandoned.
    MatchEnded(LobbyId),
}

/// Connection, lobby and account authority.
#[derive(Debug)]
pub struct SessionManager {
    connections: BTreeMap<ConnectionId, Connection>,
    lobbies: BTreeMap<LobbyId, Lobby>,
    accounts: AccountStore,
    rng: ChaCha8Rng,
    next_lobby: u32,
    max_connections: usize,
    max_players: usize,
    outbox: Vec<Outgoing>,
    events: Vec<SessionEvent>,
}

impl SessionManager {
    /// Creates a manager. `seed` drives token generation and the account
    /// digest key.
    #[must_use]
    pub fn new(max_connections: usize, max_players: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let accounts = AccountStore::new(rng.gen(), rng.gen());
        Self {
            connections: BTreeMap::new(),
            lobbies: BTreeMap::new(),
            accounts,
            rng,
            next_lobby: 1,
            max_connections,
            max_players,
            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Creates a manager from server limits.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.max_connections,
            config.max_players_per_lobby,
            config.seed,
        )
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if nobody is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Session record of a connection.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Current state of a connection.
    #[must_use]
    pub fn state_of(&self, id: ConnectionId) -> Option<SessionState> {
        self.connections.get(&id).map(|connection| connection.state)
    }

    /// A lobby by id.
    #[must_use]
    pub fn lobby(&self, id: LobbyId) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    /// Lobbies in creation order.
    pub fn lobbies(&self) -> impl Iterator<Item = &Lobby> {
        self.lobbies.values()
    }

    /// Lobby a connection sits in.
    #[must_use]
    pub fn lobby_of(&self, id: ConnectionId) -> Option<LobbyId> {
        self.connections.get(&id).and_then(|connection| connection.lobby)
    }

    /// Connections that may receive replication, with their lobby.
    pub fn in_game(&self) -> impl Iterator<Item = (ConnectionId, Option<LobbyId>)> + '_ {
        self.connections
            .values()
            .filter(|connection| connection.state == SessionState::InGame)
            .map(|connection| (connection.id, connection.lobby))
    }

    /// Takes every queued reply.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes every queued lifecycle event.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Queues a message for one connection.
    pub fn send(&mut self, to: ConnectionId, message: Message) {
        self.outbox.push(Outgoing { to, message });
    }

    /// Queues a message for every occupant of a lobby, optionally skipping one.
    pub fn broadcast_lobby(
        &mut self,
        lobby: LobbyId,
        message: &Message,
        except: Option<ConnectionId>,
    ) {
        let Some(lobby) = self.lobbies.get(&lobby) else {
            return;
        };
        for &to in lobby.occupants() {
            if Some(to) != except {
                self.outbox.push(Outgoing {
                    to,
                    message: message.clone(),
                });
            }
        }
    }

    /// Admits a new transport connection in `WAITING_UDP_PING`.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` at the connection limit; nothing is allocated.
    pub fn accept(&mut self, id: ConnectionId) -> SessionResult<()> {
        if self.connections.len() >= self.max_connections {
            tracing::warn!("refusing {:?}: {} connections", id, self.max_connections);
            return Err(SessionError::CapacityExceeded {
                max: self.max_connections,
            });
        }
        self.connections.insert(
            id,
            Connection {
                id,
                state: SessionState::WaitingUdpPing,
                username: None,
                lobby: None,
            },
        );
        self.send(id, Message::with_payload(GameEvent::SSendId, &id.0));
        tracing::info!("accepted {:?}", id);
        Ok(())
    }

    /// Drops a connection, leaving its lobby first.
    ///
    /// # Returns
    ///
    /// `true` if the connection existed.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        if !self.connections.contains_key(&id) {
            return false;
        }
        self.remove_from_lobby(id, GameEvent::SPlayerLeave);
        if let Some(mut connection) = self.connections.remove(&id) {
            connection.state = SessionState::Disconnected;
            tracing::info!("{:?} disconnected ({:?})", id, connection.username);
        }
        self.outbox.retain(|outgoing| outgoing.to != id);
        true
    }

    /// Runs one inbound message through the state machine.
    pub fn handle(
        &mut self,
        origin: ConnectionId,
        message: &Message,
        reliability: Reliability,
    ) -> Dispatch {
        let Some(state) = self.state_of(origin) else {
            tracing::warn!("{:?} from unknown connection {:?}", message.event, origin);
            return Dispatch::Rejected;
        };
        let Some(floor) = floor_of(message.event) else {
            tracing::warn!("{:?} sent server-only event {:?}", origin, message.event);
            return Dispatch::Rejected;
        };
        if reliability != message.reliability() {
            tracing::warn!("{:?} sent {:?} on the wrong channel", origin, message.event);
            return Dispatch::Rejected;
        }
        if !state.meets(floor) {
            self.refuse(origin, floor, state, SessionState::prompt_for(floor));
            return Dispatch::Rejected;
        }

        match message.event {
            GameEvent::CPingServer => {
                let echo = Message {
                    payload: message.payload.clone(),
                    ..Message::new(GameEvent::SPingServer)
                };
                self.send(origin, echo);
                Dispatch::Handled
            }
            GameEvent::CDisconnect => {
                self.disconnect(origin);
                Dispatch::Handled
            }
            GameEvent::CConfirmUdp => self.on_confirm_udp(origin, state),
            GameEvent::CRegister => self.on_register(origin, state, message),
            GameEvent::CLogin => self.on_login(origin, state, message),
            GameEvent::CLoginToken => self.on_login_token(origin, state, message),
            GameEvent::CListRooms => {
                let rooms = RoomsList(self.lobbies.values().map(Lobby::summary).collect());
                self.send(origin, Message::with_payload(GameEvent::SRoomsList, &rooms));
                Dispatch::Handled
            }
            GameEvent::CJoinRoom => match message.read::<u32>() {
                Ok(lobby) => self.join_lobby(origin, LobbyId(lobby)),
                Err(err) => malformed(origin, &err),
            },
            GameEvent::CJoinRandomLobby => {
                let open = self.lobbies.values().find(|lobby| lobby.is_open());
                match open.map(|lobby| lobby.id) {
                    Some(lobby) => self.join_lobby(origin, lobby),
                    None => {
                        self.send(origin, Message::new(GameEvent::SRoomNotJoined));
                        Dispatch::Rejected
                    }
                }
            }
            GameEvent::CNewLobby => self.on_new_lobby(origin, message),
            GameEvent::CRoomLeave => self.on_room_leave(origin, state),
            GameEvent::CReady => self.on_ready(origin, state),
            GameEvent::CCancelReady => self.on_cancel_ready(origin, state),
            GameEvent::CGameStart => self.on_game_start(origin),
            GameEvent::CTeamChat => self.on_team_chat(origin, message),
            GameEvent::CVoicePacket => self.on_voice(origin, message),
            GameEvent::CKickPlayer => match message.read::<u32>() {
                Ok(target) => self.on_kick(origin, ConnectionId(target)),
                Err(err) => malformed(origin, &err),
            },
            GameEvent::CInput => Dispatch::Forward,
            other => {
                tracing::warn!("{:?} has a floor but no handler", other);
                Dispatch::Rejected
            }
        }
    }

    /// Ends a running match: the lobby reopens and every occupant is back
    /// in `IN_LOBBY`, unready.
    ///
    /// # Errors
    ///
    /// `LobbyNotFound` for an unknown lobby, `StateViolation` if the lobby
    /// is not playing.
    pub fn end_match(&mut self, lobby: LobbyId) -> SessionResult<()> {
        let entry = self
            .lobbies
            .get_mut(&lobby)
            .ok_or(SessionError::LobbyNotFound(lobby))?;
        if entry.state != LobbyState::InGame {
            return Err(SessionError::StateViolation {
                required: SessionState::InGame,
                current: SessionState::InLobby,
            });
        }
        entry.state = LobbyState::WaitingForPlayers;
        let players = entry.occupants().to_vec();

        for &player in &players {
            self.set_state(player, SessionState::InLobby);
            self.send(player, Message::new(GameEvent::SGameOver));
            self.send(player, Message::new(GameEvent::SReturnToLobby));
        }
        self.events.push(SessionEvent::MatchEnded(lobby));
        tracing::info!("match in {:?} ended", lobby);
        Ok(())
    }

    fn set_state(&mut self, id: ConnectionId, state: SessionState) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.state = state;
        }
    }

    fn refuse(
        &mut self,
        to: ConnectionId,
        required: SessionState,
        current: SessionState,
        prompt: &str,
    ) {
        tracing::debug!("{:?} needs {:?}, is {:?}", to, required, current);
        let refusal = NotAuthorized {
            required,
            current,
            prompt: prompt.to_owned(),
        };
        self.send(to, Message::with_payload(GameEvent::SNotAuthorized, &refusal));
    }

    fn player_info(&self, id: ConnectionId) -> PlayerInfo {
        let connection = self.connections.get(&id);
        PlayerInfo {
            id: id.0,
            username: connection
                .and_then(|connection| connection.username.clone())
                .unwrap_or_default(),
            ready: connection.is_some_and(|connection| connection.state == SessionState::Ready),
        }
    }

    fn roster(&self, lobby: LobbyId) -> Option<LobbyJoined> {
        let lobby = self.lobbies.get(&lobby)?;
        Some(LobbyJoined {
            lobby_id: lobby.id.0,
            name: lobby.name.clone(),
            host: lobby.host().0,
            players: lobby
                .occupants()
                .iter()
                .map(|&id| self.player_info(id))
                .collect(),
        })
    }

    fn is_online(&self, username: &str) -> bool {
        self.connections
            .values()
            .any(|connection| connection.username.as_deref() == Some(username))
    }

    fn new_token(&mut self) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    fn on_confirm_udp(&mut self, origin: ConnectionId, state: SessionState) -> Dispatch {
        if state == SessionState::WaitingUdpPing {
            self.set_state(origin, SessionState::Connected);
            self.send(origin, Message::new(GameEvent::SConfirmUdp));
            tracing::debug!("{:?} confirmed the unreliable channel", origin);
        }
        Dispatch::Handled
    }

    fn log_in(&mut self, origin: ConnectionId, username: &str, reply: GameEvent) {
        let token = self.new_token();
        self.accounts.issue_token(username, token.clone());
        if let Some(connection) = self.connections.get_mut(&origin) {
            connection.state = SessionState::LoggedIn;
            connection.username = Some(username.to_owned());
        }
        let reply_payload = LoginReply {
            id: origin.0,
            token,
        };
        self.send(origin, Message::with_payload(reply, &reply_payload));
        tracing::info!("{:?} logged in as {}", origin, username);
    }

    fn on_register(&mut self, origin: ConnectionId, state: SessionState, message: &Message) -> Dispatch {
        let credentials = match message.read::<Credentials>() {
            Ok(credentials) => credentials,
            Err(err) => return malformed(origin, &err),
        };
        let result = if state == SessionState::Connected {
            self.accounts
                .register(&credentials.username, &credentials.password)
        } else {
            Err(SessionError::AuthFailure("already logged in"))
        };
        match result {
            Ok(()) => {
                self.log_in(origin, &credentials.username, GameEvent::SRegisterOk);
                Dispatch::Handled
            }
            Err(err) => {
                tracing::debug!("{:?} register refused: {}", origin, err);
                self.send(origin, Message::new(GameEvent::SRegisterKo));
                Dispatch::Rejected
            }
        }
    }

    fn on_login(&mut self, origin: ConnectionId, state: SessionState, message: &Message) -> Dispatch {
        let credentials = match message.read::<Credentials>() {
            Ok(credentials) => credentials,
            Err(err) => return malformed(origin, &err),
        };
        let result = if state != SessionState::Connected {
            Err(SessionError::AuthFailure("already logged in"))
        } else if self.is_online(&credentials.username) {
            Err(SessionError::AuthFailure("account in use"))
        } else {
            self.accounts
                .verify(&credentials.username, &credentials.password)
        };
        match result {
            Ok(()) => {
                self.log_in(origin, &credentials.username, GameEvent::SLoginOk);
                Dispatch::Handled
            }
            Err(err) => {
                tracing::debug!("{:?} login refused: {}", origin, err);
                self.send(origin, Message::new(GameEvent::SLoginKo));
                Dispatch::Rejected
            }
        }
    }

    fn on_login_token(&mut self, origin: ConnectionId, state: SessionState, message: &Message) -> Dispatch {
        let token = match message.read::<String>() {
            Ok(token) => token,
            Err(err) => return malformed(origin, &err),
        };
        let username = self.accounts.redeem(&token).map(str::to_owned);
        match username {
            Some(username) if state == SessionState::Connected && !self.is_online(&username) => {
                self.log_in(origin, &username, GameEvent::SLoginOk);
                Dispatch::Handled
            }
            _ => {
                tracing::debug!("{:?} presented an unusable token", origin);
                self.send(origin, Message::new(GameEvent::SInvalidToken));
                Dispatch::Rejected
            }
        }
    }

    fn try_join(&mut self, origin: ConnectionId, lobby: LobbyId) -> SessionResult<()> {
        if self.lobby_of(origin).is_some() {
            return Err(SessionError::AlreadyInLobby);
        }
        self.lobbies
            .get_mut(&lobby)
            .ok_or(SessionError::LobbyNotFound(lobby))?
            .join(origin)?;
        if let Some(connection) = self.connections.get_mut(&origin) {
            connection.lobby = Some(lobby);
            connection.state = SessionState::InLobby;
        }
        Ok(())
    }

    fn join_lobby(&mut self, origin: ConnectionId, lobby: LobbyId) -> Dispatch {
        if let Err(err) = self.try_join(origin, lobby) {
            tracing::debug!("{:?} could not join {:?}: {}", origin, lobby, err);
            self.send(origin, Message::new(GameEvent::SRoomNotJoined));
            return Dispatch::Rejected;
        }
        if let Some(roster) = self.roster(lobby) {
            self.send(origin, Message::with_payload(GameEvent::SRoomJoined, &roster));
        }
        let joined = Message::with_payload(GameEvent::SPlayerJoined, &self.player_info(origin));
        self.broadcast_lobby(lobby, &joined, Some(origin));
        tracing::info!("{:?} joined {:?}", origin, lobby);
        Dispatch::Handled
    }

    fn on_new_lobby(&mut self, origin: ConnectionId, message: &Message) -> Dispatch {
        let name = match message.read::<String>() {
            Ok(name) => name,
            Err(err) => return malformed(origin, &err),
        };
        if self.lobby_of(origin).is_some() {
            self.send(origin, Message::new(GameEvent::SRoomNotJoined));
            return Dispatch::Rejected;
        }

        let id = LobbyId(self.next_lobby);
        self.next_lobby += 1;
        self.lobbies
            .insert(id, Lobby::new(id, name, origin, self.max_players));
        if let Some(connection) = self.connections.get_mut(&origin) {
            connection.lobby = Some(id);
            connection.state = SessionState::InLobby;
        }

        self.send(origin, Message::with_payload(GameEvent::SConfirmNewLobby, &id.0));
        if let Some(roster) = self.roster(id) {
            self.send(origin, Message::with_payload(GameEvent::SRoomJoined, &roster));
        }
        tracing::info!("{:?} created {:?}", origin, id);
        Dispatch::Handled
    }

    /// Takes `who` out of their lobby and tells the rest with `notice`.
    fn remove_from_lobby(&mut self, who: ConnectionId, notice: GameEvent) {
        let Some(lobby_id) = self
            .connections
            .get_mut(&who)
            .and_then(|connection| connection.lobby.take())
        else {
            return;
        };
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            return;
        };
        let playing = lobby.state == LobbyState::InGame;
        let departure = lobby.leave(who);

        if playing {
            self.events.push(SessionEvent::PlayerLeft {
                connection: who,
                lobby: lobby_id,
            });
        }

        let left = Message::with_payload(notice, &who.0);
        match departure {
            Departure::NotPresent => {
                tracing::warn!("{:?} pointed at {:?} but was not inside", who, lobby_id);
            }
            Departure::Left => self.broadcast_lobby(lobby_id, &left, None),
            Departure::HostChanged(host) => {
                self.broadcast_lobby(lobby_id, &left, None);
                let new_host = Message::with_payload(GameEvent::SNewHost, &host.0);
                self.broadcast_lobby(lobby_id, &new_host, None);
                tracing::info!("{:?} is the new host of {:?}", host, lobby_id);
            }
            Departure::Emptied => {
                self.lobbies.remove(&lobby_id);
                if playing {
                    self.events.push(SessionEvent::MatchEnded(lobby_id));
                }
                tracing::info!("{:?} closed", lobby_id);
            }
        }
    }

    fn on_room_leave(&mut self, origin: ConnectionId, state: SessionState) -> Dispatch {
        if state == SessionState::InGame {
            self.refuse(origin, SessionState::InLobby, state, "finish the match first");
            return Dispatch::Rejected;
        }
        if self.lobby_of(origin).is_none() {
            self.refuse(
                origin,
                SessionState::InLobby,
                state,
                SessionState::prompt_for(SessionState::InLobby),
            );
            return Dispatch::Rejected;
        }
        self.remove_from_lobby(origin, GameEvent::SPlayerLeave);
        self.set_state(origin, SessionState::LoggedIn);
        self.send(origin, Message::new(GameEvent::SRoomLeave));
        Dispatch::Handled
    }

    fn try_kick(&self, origin: ConnectionId, target: ConnectionId) -> SessionResult<LobbyId> {
        let lobby_id = self
            .lobby_of(origin)
            .ok_or(SessionError::StateViolation {
                required: SessionState::InLobby,
                current: SessionState::LoggedIn,
            })?;
        let lobby = self
            .lobbies
            .get(&lobby_id)
            .ok_or(SessionError::LobbyNotFound(lobby_id))?;
        if lobby.state == LobbyState::InGame {
            return Err(SessionError::MatchInProgress);
        }
        if lobby.host() != origin {
            return Err(SessionError::NotHost);
        }
        if target == origin || self.lobby_of(target) != Some(lobby_id) {
            return Err(SessionError::NotInLobby(target));
        }
        Ok(lobby_id)
    }

    fn on_kick(&mut self, origin: ConnectionId, target: ConnectionId) -> Dispatch {
        match self.try_kick(origin, target) {
            Ok(lobby) => {
                self.remove_from_lobby(target, GameEvent::SPlayerKicked);
                self.set_state(target, SessionState::LoggedIn);
                self.send(target, Message::new(GameEvent::SRoomKicked));
                tracing::info!("{:?} kicked {:?} from {:?}", origin, target, lobby);
                Dispatch::Handled
            }
            Err(err) => {
                tracing::debug!("{:?} cannot kick {:?}: {}", origin, target, err);
                Dispatch::Rejected
            }
        }
    }

    fn on_ready(&mut self, origin: ConnectionId, state: SessionState) -> Dispatch {
        if state != SessionState::InLobby {
            return Dispatch::Handled;
        }
        self.set_state(origin, SessionState::Ready);
        if let Some(lobby) = self.lobby_of(origin) {
            let ready = Message::with_payload(GameEvent::SReadyReturn, &origin.0);
            self.broadcast_lobby(lobby, &ready, None);
        }
        Dispatch::Handled
    }

    fn on_cancel_ready(&mut self, origin: ConnectionId, state: SessionState) -> Dispatch {
        if state != SessionState::Ready {
            return Dispatch::Handled;
        }
        self.set_state(origin, SessionState::InLobby);
        if let Some(lobby) = self.lobby_of(origin) {
            let unready = Message::with_payload(GameEvent::SCancelReadyBroadcast, &origin.0);
            self.broadcast_lobby(lobby, &unready, None);
        }
        Dispatch::Handled
    }

    fn try_start(&mut self, origin: ConnectionId) -> SessionResult<LobbyId> {
        let lobby_id = self
            .lobby_of(origin)
            .ok_or(SessionError::StateViolation {
                required: SessionState::InLobby,
                current: SessionState::LoggedIn,
            })?;
        let lobby = self
            .lobbies
            .get(&lobby_id)
            .ok_or(SessionError::LobbyNotFound(lobby_id))?;
        if lobby.state == LobbyState::InGame {
            return Err(SessionError::MatchInProgress);
        }
        if lobby.host() != origin {
            return Err(SessionError::NotHost);
        }
        let all_ready = lobby
            .occupants()
            .iter()
            .all(|&id| self.state_of(id) == Some(SessionState::Ready));
        if !all_ready {
            return Err(SessionError::PlayersNotReady);
        }
        let players = lobby.occupants().to_vec();

        if let Some(lobby) = self.lobbies.get_mut(&lobby_id) {
            lobby.state = LobbyState::InGame;
        }
        for &player in &players {
            self.set_state(player, SessionState::InGame);
        }
        let start = Message::with_payload(GameEvent::SGameStart, &lobby_id.0);
        self.broadcast_lobby(lobby_id, &start, None);
        self.events.push(SessionEvent::MatchStarted {
            lobby: lobby_id,
            players,
        });
        Ok(lobby_id)
    }

    fn on_game_start(&mut self, origin: ConnectionId) -> Dispatch {
        match self.try_start(origin) {
            Ok(lobby) => {
                tracing::info!("match started in {:?}", lobby);
                Dispatch::Handled
            }
            Err(err) => {
                tracing::debug!("{:?} cannot start: {}", origin, err);
                let reason = err.to_string();
                self.send(origin, Message::with_payload(GameEvent::SGameStartKo, &reason));
                Dispatch::Rejected
            }
        }
    }

    fn on_team_chat(&mut self, origin: ConnectionId, message: &Message) -> Dispatch {
        let text = match message.read::<String>() {
            Ok(text) => text,
            Err(err) => return malformed(origin, &err),
        };
        let Some(lobby) = self.lobby_of(origin) else {
            return Dispatch::Rejected;
        };
        let chat = ChatMessage {
            from: origin.0,
            text,
        };
        self.broadcast_lobby(lobby, &Message::with_payload(GameEvent::STeamChat, &chat), None);
        Dispatch::Handled
    }

    fn on_voice(&mut self, origin: ConnectionId, message: &Message) -> Dispatch {
        let data = match message.read::<Vec<u8>>() {
            Ok(data) => data,
            Err(err) => return malformed(origin, &err),
        };
        let Some(lobby) = self.lobby_of(origin) else {
            return Dispatch::Rejected;
        };
        let frame = VoiceFrame {
            from: origin.0,
            data,
        };
        let relay = Message::with_payload(GameEvent::SVoiceRelay, &frame);
        self.broadcast_lobby(lobby, &relay, Some(origin));
        Dispatch::Handled
    }
}

fn malformed(origin: ConnectionId, err: &crate::error::ProtocolError) -> Dispatch {
    tracing::warn!("{:?}: {}", origin, err);
    Dispatch::Rejected
}
