//! # Game Server
//!
//! The authoritative side. One call to [`GameServer::tick`] is one server
//! step:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Inbound      │──▶│ Session      │──▶│ Game Rules   │──▶│ Outbound     │
//! │ accept/drop  │   │ state gate   │   │ systems      │   │ replies      │
//! │ decode       │   │ lobby events │   │ deaths       │   │ replication  │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! Nothing here blocks or panics: undecodable datagrams and refused
//! requests are logged and dropped, the tick always completes.

mod rules;
mod world;

pub use rules::{ArenaRules, GameRules, RulesEvent};
pub use world::ServerWorld;

use crate::config::ServerConfig;
use crate::protocol::{GameEvent, InputPacket, Message, ScoreUpdate};
use crate::replication::ReplicationSender;
use crate::session::{ConnectionId, Dispatch, LobbyId, SessionEvent, SessionManager};
use crate::transport::{Datagram, Transport, TransportEvent};

/// Authoritative server over a transport `T`, running rules `R`.
pub struct GameServer<T: Transport, R: GameRules> {
    config: ServerConfig,
    transport: T,
    session: SessionManager,
    world: ServerWorld,
    rules: R,
    sender: ReplicationSender,
    tick: u32,
}

impl<T: Transport, R: GameRules> GameServer<T, R> {
    /// Creates a server.
    #[must_use]
    pub fn new(config: ServerConfig, transport: T, rules: R) -> Self {
        tracing::info!(
            "server up: {} Hz, {} connections, {} players per lobby",
            config.tick_rate,
            config.max_connections,
            config.max_players_per_lobby
        );
        Self {
            session: SessionManager::from_config(&config),
            world: ServerWorld::new(config.seed),
            config,
            transport,
            rules,
            sender: ReplicationSender::new(),
            tick: 0,
        }
    }

    /// Tick the next call to [`tick`](Self::tick) will run.
    #[inline]
    #[must_use]
    pub const fn current_tick(&self) -> u32 {
        self.tick
    }

    /// Server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Connection and lobby state.
    #[must_use]
    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Authoritative world.
    #[must_use]
    pub const fn world(&self) -> &ServerWorld {
        &self.world
    }

    /// Authoritative world, for spawning outside the rules.
    pub fn world_mut(&mut self) -> &mut ServerWorld {
        &mut self.world
    }

    /// Game rules.
    #[must_use]
    pub const fn rules(&self) -> &R {
        &self.rules
    }

    /// Game rules and world together, for driving rules from outside a tick.
    pub fn rules_mut(&mut self) -> (&mut R, &mut ServerWorld) {
        (&mut self.rules, &mut self.world)
    }

    /// Transport, for opening in-process connections.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Replication counters.
    #[must_use]
    pub const fn replication(&self) -> &ReplicationSender {
        &self.sender
    }

    /// Ends a running match on request of the host application.
    ///
    /// # Errors
    ///
    /// Whatever [`SessionManager::end_match`] refuses.
    pub fn end_match(&mut self, lobby: LobbyId) -> crate::SessionResult<()> {
        self.session.end_match(lobby)?;
        self.process_session_events();
        Ok(())
    }

    /// Runs one server step.
    pub fn tick(&mut self) {
        self.drain_inbound();
        self.process_session_events();

        let dt = self.config.tick_duration();
        for event in self.rules.tick(&mut self.world, dt) {
            match event {
                RulesEvent::PlayerDied { lobby, player, guid } => {
                    tracing::info!("{:?} died in {:?}", player, lobby);
                    let death = Message::with_payload(GameEvent::SPlayerDeath, &guid);
                    self.session.broadcast_lobby(lobby, &death, None);
                }
                RulesEvent::ScoreChanged { lobby, guid, total } => {
                    let update = Message::with_payload(
                        GameEvent::SScoreUpdate,
                        &ScoreUpdate { guid, score: total },
                    );
                    self.session.broadcast_lobby(lobby, &update, None);
                }
                RulesEvent::MatchOver(lobby) => {
                    if let Err(err) = self.session.end_match(lobby) {
                        tracing::warn!("cannot end match in {:?}: {}", lobby, err);
                    }
                }
            }
        }
        self.process_session_events();

        self.flush_outbox();
        self.replicate();
        self.tick = self.tick.wrapping_add(1);
    }

    fn drain_inbound(&mut self) {
        while let Some(event) = self.transport.poll_inbound() {
            match event {
                TransportEvent::Connected(id) => {
                    if let Err(err) = self.session.accept(id) {
                        tracing::warn!("{:?} refused: {}", id, err);
                        self.transport.refuse(id);
                    }
                }
                TransportEvent::Disconnected(id) => {
                    self.session.disconnect(id);
                    self.transport.refuse(id);
                }
                TransportEvent::Received { from, datagram } => self.receive(from, &datagram),
            }
        }
    }

    fn receive(&mut self, from: ConnectionId, datagram: &Datagram) {
        let message = match Message::decode(&datagram.bytes) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!("dropping datagram from {:?}: {}", from, err);
                return;
            }
        };

        if self.session.handle(from, &message, datagram.reliability) != Dispatch::Forward {
            return;
        }
        if message.event == GameEvent::CInput {
            match message.read::<InputPacket>() {
                Ok(packet) => self.rules.on_input(&mut self.world, from, packet),
                Err(err) => tracing::debug!("bad input from {:?}: {}", from, err),
            }
        }
    }

    fn process_session_events(&mut self) {
        for event in self.session.drain_events() {
            match event {
                SessionEvent::MatchStarted { lobby, players } => {
                    let assigned = self.rules.on_match_start(&mut self.world, lobby, &players);
                    // Everyone entering the game needs the full state, not just this tick's changes.
                    self.world.registry.mark_all_dirty();
                    for (player, guid) in assigned {
                        self.session.send(
                            player,
                            Message::with_payload(GameEvent::SAssignPlayerEntity, &guid),
                        );
                    }
                }
                SessionEvent::PlayerLeft { connection, lobby } => {
                    self.rules.on_player_left(&mut self.world, connection, lobby);
                }
                SessionEvent::MatchEnded(lobby) => {
                    self.rules.on_match_ended(&mut self.world, lobby);
                }
            }
        }
    }

    fn flush_outbox(&mut self) {
        for outgoing in self.session.drain_outbox() {
            let message = outgoing
                .message
                .from_origin(ConnectionId::SERVER.0)
                .at_tick(self.tick);
            let datagram = Datagram {
                bytes: message.encode(),
                reliability: message.reliability(),
            };
            self.transport.send(outgoing.to, datagram);
        }
    }

    fn replicate(&mut self) {
        let messages = self
            .sender
            .collect(&mut self.world.registry, &self.world.assets, self.tick);
        if messages.is_empty() {
            return;
        }

        let audience: Vec<(ConnectionId, Option<LobbyId>)> = self.session.in_game().collect();
        for scoped in messages {
            let datagram = Datagram {
                bytes: scoped.message.encode(),
                reliability: scoped.message.reliability(),
            };
            for &(to, lobby) in &audience {
                let visible = match scoped.scope {
                    Some(scope) => lobby == Some(LobbyId(scope.0)),
                    None => true,
                };
                if visible {
                    self.transport.send(to, datagram.clone());
                }
            }
        }
    }
}
