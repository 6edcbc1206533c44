//! The single event loop that owns all room state.
//!
//! Connections, client messages, and fired timers arrive as [`Event`]s and
//! are handled one at a time, so every session mutation runs to completion
//! before the next event is looked at.

use crate::config::ServerConfig;
use crate::games::GameCategory;
use crate::games::ludo::{ActionError, Color, DiceSource, GameRng, PieceSlot};
use crate::hub::{ConnectionHub, Outbound};
use crate::lobby::{LobbyRegistry, generate_room_code, private_room_id};
use crate::matchmaking::MatchmakingQueue;
use crate::profile_service::OutcomeRecorder;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::scheduler::{Scheduler, Timer, TokioScheduler};
use crate::session::{ConnectionId, Identity, Participant, SessionRegistry};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// Input to the coordinator loop.
#[derive(Debug)]
pub enum Event {
    /// A transport connection opened.
    Connected {
        /// New connection id.
        connection: ConnectionId,
        /// Identity verified from the connection token.
        identity: Option<Identity>,
        /// Channel to the connection's writer.
        outbound: Outbound,
    },
    /// A parsed client frame.
    Message {
        /// Sender.
        connection: ConnectionId,
        /// Frame content.
        message: ClientMessage,
    },
    /// A client frame that did not parse.
    Malformed {
        /// Sender.
        connection: ConnectionId,
        /// Parser complaint.
        reason: String,
    },
    /// A transport connection closed.
    Disconnected {
        /// Closed connection.
        connection: ConnectionId,
    },
    /// A delayed step came due.
    Timer(Timer),
    /// Health probe.
    Status {
        /// Where to send the answer.
        reply: oneshot::Sender<HealthStatus>,
    },
}

/// Body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `ok` while the loop runs.
    pub status: String,
    /// Open connections.
    pub active_connections: usize,
    /// Live sessions.
    pub active_games: usize,
}

/// Owner of sessions, connections, queues, lobbies, and timers.
pub struct Coordinator<S: Scheduler = TokioScheduler> {
    pub(crate) config: ServerConfig,
    pub(crate) sessions: SessionRegistry,
    pub(crate) hub: ConnectionHub,
    pub(crate) matchmaking: MatchmakingQueue,
    pub(crate) lobbies: LobbyRegistry,
    pub(crate) dice: Box<dyn DiceSource>,
    pub(crate) scheduler: S,
    pub(crate) recorder: Option<Box<dyn OutcomeRecorder>>,
    next_room: u64,
}

impl<S: Scheduler> Coordinator<S> {
    /// Creates a coordinator with dice seeded from the config, or from entropy.
    #[instrument(skip_all)]
    pub fn new(config: ServerConfig, scheduler: S) -> Self {
        let dice: Box<dyn DiceSource> = match config.dice_seed() {
            Some(seed) => Box::new(GameRng::seeded(*seed)),
            None => Box::new(GameRng::from_entropy()),
        };
        info!(seeded = config.dice_seed().is_some(), "Creating coordinator");
        Self {
            config,
            sessions: SessionRegistry::new(),
            hub: ConnectionHub::new(),
            matchmaking: MatchmakingQueue::new(),
            lobbies: LobbyRegistry::new(),
            dice,
            scheduler,
            recorder: None,
            next_room: 0,
        }
    }

    /// Replaces the dice source.
    pub fn with_dice(mut self, dice: Box<dyn DiceSource>) -> Self {
        self.dice = dice;
        self
    }

    /// Enables outcome recording.
    pub fn with_recorder(mut self, recorder: Box<dyn OutcomeRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Live sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Live sessions, mutably. Used to set up scenarios.
    #[cfg(any(test, feature = "test-util"))]
    pub fn sessions_mut(&mut self) -> &mut SessionRegistry {
        &mut self.sessions
    }

    /// Open connections and room audiences.
    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Open private rooms.
    pub fn lobbies(&self) -> &LobbyRegistry {
        &self.lobbies
    }

    /// Matchmaking queues.
    pub fn matchmaking(&self) -> &MatchmakingQueue {
        &self.matchmaking
    }

    /// The timer scheduler.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Current health numbers.
    pub fn status(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            active_connections: self.hub.connection_count(),
            active_games: self.sessions.len(),
        }
    }

    /// Handles one event to completion.
    #[instrument(skip_all)]
    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Connected {
                connection,
                identity,
                outbound,
            } => self.hub.connect(connection, identity, outbound),
            Event::Message {
                connection,
                message,
            } => {
                if let Err(kind) = self.handle_message(connection, message) {
                    warn!(%connection, ?kind, "Action rejected");
                    self.hub.send(connection, ServerMessage::error(kind));
                }
            }
            Event::Malformed { connection, reason } => {
                warn!(%connection, %reason, "Malformed frame");
                self.hub
                    .send(connection, ServerMessage::error(ActionError::InvalidRequest));
            }
            Event::Disconnected { connection } => self.on_disconnect(connection),
            Event::Timer(timer) => self.on_timer(timer),
            Event::Status { reply } => {
                if reply.send(self.status()).is_err() {
                    debug!("Health probe went away");
                }
            }
        }
    }

    /// Runs until the event channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<Event>,
        mut timers: mpsc::UnboundedReceiver<Timer>,
    ) {
        info!("Coordinator running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                Some(timer) = timers.recv() => self.handle(Event::Timer(timer)),
            }
        }
        info!("Coordinator stopped");
    }

    fn handle_message(
        &mut self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), ActionError> {
        debug!(%connection, ?message, "Client message");
        match message {
            ClientMessage::FindMatch {
                category,
                group_size,
            } => {
                self.on_find_match(connection, category, group_size);
                Ok(())
            }
            ClientMessage::CancelMatchmaking => {
                self.matchmaking.remove(connection);
                self.hub.send(connection, ServerMessage::MatchmakingCancelled);
                Ok(())
            }
            ClientMessage::CreateRoom { max_players } => {
                self.on_create_room(connection, max_players);
                Ok(())
            }
            ClientMessage::JoinRoom { room_code } => self.on_join_room(connection, &room_code),
            ClientMessage::StartGame {
                room_id,
                fill_with_automated,
            } => self.on_start_game(connection, &room_id, fill_with_automated),
            ClientMessage::RollRequest { room_id } => self.on_roll_request(connection, &room_id),
            ClientMessage::MoveRequest {
                room_id,
                piece_slot,
            } => self.on_move_request(connection, &room_id, piece_slot),
            ClientMessage::LeaveGame { room_id } => self.on_leave_game(connection, &room_id),
            ClientMessage::VoiceSignal { room_id, signal } => {
                self.on_voice_signal(connection, room_id, signal)
            }
        }
    }

    #[instrument(skip(self))]
    fn on_find_match(
        &mut self,
        connection: ConnectionId,
        category: GameCategory,
        group_size: Option<usize>,
    ) {
        let size = self.config.group_size_for(category, group_size);
        let identity = self.hub.identity(connection).cloned();
        let queue_size = self.matchmaking.enqueue(connection, identity, category, size);
        self.hub.send(connection, ServerMessage::Searching { queue_size });

        let Some(group) = self.matchmaking.dequeue_group(category, size) else {
            return;
        };

        self.next_room += 1;
        let room_id = format!("{}-{}", category, self.next_room);
        let participants: Vec<Participant> = group
            .into_iter()
            .map(|entry| Participant::human(entry.connection, entry.identity))
            .collect();

        let session = match self
            .sessions
            .create_session(room_id.clone(), category, participants)
        {
            Ok(session) => session,
            Err(e) => {
                error!(%room_id, error = %e, "Failed to create matched session");
                return;
            }
        };

        let snapshot = session.snapshot();
        for (seat, participant) in session.participants().iter().enumerate() {
            if let Some(member) = participant.connection() {
                self.hub.join_room(&room_id, member);
                self.hub.send(
                    member,
                    ServerMessage::MatchFound {
                        room_id: room_id.clone(),
                        color: Color::ALL[seat],
                        snapshot: snapshot.clone(),
                    },
                );
            }
        }
        info!(%room_id, seats = snapshot.seats.len(), "Match formed");
        self.schedule_next_step(&room_id);
    }

    #[instrument(skip(self))]
    fn on_create_room(&mut self, connection: ConnectionId, max_players: Option<usize>) {
        let capacity = self
            .config
            .room_capacity_for(GameCategory::Ludo, max_players);
        let mut rng = rand::thread_rng();
        let code = loop {
            let code = generate_room_code(&mut rng);
            if !self.lobbies.code_in_use(&code) && !self.sessions.contains(&private_room_id(&code))
            {
                break code;
            }
        };

        let identity = self.hub.identity(connection).cloned();
        let lobby = self.lobbies.create(code, connection, identity, capacity);
        let message = ServerMessage::RoomCreated {
            room_id: lobby.room_id.clone(),
            room_code: lobby.code.clone(),
            max_players: lobby.max_players,
        };
        let room_id = lobby.room_id.clone();
        self.hub.join_room(&room_id, connection);
        self.hub.send(connection, message);
    }

    #[instrument(skip(self))]
    fn on_join_room(&mut self, connection: ConnectionId, room_code: &str) -> Result<(), ActionError> {
        let identity = self.hub.identity(connection).cloned();
        let lobby = self.lobbies.join(room_code, connection, identity)?;
        let room_id = lobby.room_id.clone();
        let message = player_list(lobby);
        self.hub.join_room(&room_id, connection);
        self.hub.broadcast(&room_id, &message);
        Ok(())
    }

    #[instrument(skip(self))]
    fn on_start_game(
        &mut self,
        connection: ConnectionId,
        room_id: &str,
        fill: bool,
    ) -> Result<(), ActionError> {
        let category = GameCategory::Ludo;
        let (lobby, participants) =
            self.lobbies.start(room_id, connection, fill, category.min_players())?;

        let session = self
            .sessions
            .create_session(lobby.room_id.clone(), category, participants)
            .map_err(|e| {
                error!(room_id, error = %e, "Failed to create private session");
                ActionError::InvalidRequest
            })?;

        let snapshot = session.snapshot();
        let automated: Vec<Color> = snapshot
            .seats
            .iter()
            .filter(|seat| seat.automated)
            .map(|seat| seat.color)
            .collect();
        for (seat, participant) in session.participants().iter().enumerate() {
            if let Some(member) = participant.connection() {
                self.hub.send(
                    member,
                    ServerMessage::GameStarted {
                        room_id: room_id.to_string(),
                        color: Color::ALL[seat],
                        snapshot: snapshot.clone(),
                        automated: automated.clone(),
                    },
                );
            }
        }
        self.schedule_next_step(room_id);
        Ok(())
    }

    #[instrument(skip(self))]
    fn on_roll_request(&mut self, connection: ConnectionId, room_id: &str) -> Result<(), ActionError> {
        let session = self.sessions.require_mut(room_id)?;
        let roll = session.roll(connection, self.dice.as_mut())?;
        let instance = session.instance();
        self.hub
            .broadcast(room_id, &ServerMessage::roll_result(session, &roll));

        if roll.valid_slots.is_empty() {
            debug!(room_id, dice = roll.dice, "No legal move, skipping soon");
            self.scheduler.schedule(
                self.config.auto_skip_delay(),
                Timer::AutoSkip {
                    room_id: room_id.to_string(),
                    instance,
                },
            );
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn on_move_request(
        &mut self,
        connection: ConnectionId,
        room_id: &str,
        slot: PieceSlot,
    ) -> Result<(), ActionError> {
        let session = self.sessions.require_mut(room_id)?;
        let turn = session.move_piece(connection, slot)?;
        self.hub
            .broadcast(room_id, &ServerMessage::move_result(session, &turn));

        if turn.game_over() {
            self.finish_game(room_id);
        } else {
            self.schedule_next_step(room_id);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn on_leave_game(&mut self, connection: ConnectionId, room_id: &str) -> Result<(), ActionError> {
        let session = self
            .sessions
            .get(room_id)
            .ok_or(ActionError::SessionNotFound)?;
        if !session.has_connection(connection) {
            return Err(ActionError::InvalidRequest);
        }
        self.close_session(room_id, connection);
        Ok(())
    }

    /// Relays a signaling payload to everyone else listening to the room.
    #[instrument(skip(self, signal))]
    fn on_voice_signal(
        &mut self,
        connection: ConnectionId,
        room_id: String,
        signal: serde_json::Value,
    ) -> Result<(), ActionError> {
        let members = self.hub.room_members(&room_id);
        if members.is_empty() {
            return Err(ActionError::SessionNotFound);
        }
        if !members.contains(&connection) {
            return Err(ActionError::InvalidRequest);
        }
        debug!(%room_id, listeners = members.len() - 1, "Relaying voice signal");
        let message = ServerMessage::VoiceSignal {
            room_id: room_id.clone(),
            signal,
        };
        self.hub.broadcast_except(&room_id, connection, &message);
        Ok(())
    }

    #[instrument(skip(self))]
    fn on_disconnect(&mut self, connection: ConnectionId) {
        self.matchmaking.remove(connection);
        self.hub.disconnect(connection);

        for room_id in self.lobbies.remove_member(connection) {
            if let Some(lobby) = self.lobbies.get(&room_id) {
                let message = player_list(lobby);
                self.hub.broadcast(&room_id, &message);
            }
        }

        for room_id in self.sessions.rooms_with_connection(connection) {
            self.close_session(&room_id, connection);
        }
    }

    /// Deletes a session because a participant left; the rest are told.
    fn close_session(&mut self, room_id: &str, leaving: ConnectionId) {
        self.scheduler.cancel_room(room_id);
        if self.sessions.remove(room_id).is_some() {
            info!(room_id, %leaving, "Session closed by departure");
            self.hub.broadcast_except(
                room_id,
                leaving,
                &ServerMessage::ParticipantLeft {
                    room_id: room_id.to_string(),
                },
            );
        }
        self.hub.close_room(room_id);
    }
}

fn player_list(lobby: &crate::lobby::Lobby) -> ServerMessage {
    ServerMessage::PlayerJoined {
        room_id: lobby.room_id.clone(),
        room_code: lobby.code.clone(),
        players: lobby.member_names(),
        max_players: lobby.max_players,
    }
}
