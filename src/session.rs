//! Game session management: participants, sessions and the room registry.

use crate::games::GameCategory;
use crate::games::ludo::{
    ActionError, Color, DiceSource, LudoGame, Phase, PieceSlot, RollOutcome, SeatPieces,
    TurnOutcome,
};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a room; one live session per room.
pub type RoomId = String;

/// Process-unique identifier for a transport connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("conn-{_0}")]
pub struct ConnectionId(pub u64);

/// A verified player identity, resolved from a connection token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_new::new)]
pub struct Identity {
    /// Persistent user id.
    user_id: i32,
    /// Display name.
    display_name: String,
}

/// A seat holder: a live connection or an automated marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Participant {
    /// Player behind a transport connection.
    Human {
        /// Connection the player acts through.
        connection: ConnectionId,
        /// Verified identity, if the connection presented a valid token.
        identity: Option<Identity>,
    },
    /// Server-driven player.
    Automated {
        /// Display label, e.g. `AI-1`.
        label: String,
    },
}

impl Participant {
    /// Creates a human participant.
    pub fn human(connection: ConnectionId, identity: Option<Identity>) -> Self {
        Self::Human {
            connection,
            identity,
        }
    }

    /// Creates the `n`th automated participant (1-based label).
    pub fn automated(n: usize) -> Self {
        Self::Automated {
            label: format!("AI-{n}"),
        }
    }

    /// Returns true for automated participants.
    pub fn is_automated(&self) -> bool {
        matches!(self, Self::Automated { .. })
    }

    /// Connection of a human participant.
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            Self::Human { connection, .. } => Some(*connection),
            Self::Automated { .. } => None,
        }
    }

    /// Verified identity of a human participant.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Human { identity, .. } => identity.as_ref(),
            Self::Automated { .. } => None,
        }
    }

    /// Name shown to other players.
    pub fn display_name(&self) -> String {
        match self {
            Self::Human {
                identity: Some(identity),
                ..
            } => identity.display_name().clone(),
            Self::Human { connection, .. } => connection.to_string(),
            Self::Automated { label } => label.clone(),
        }
    }
}

/// Public view of one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    /// Seat color.
    pub color: Color,
    /// Display name.
    pub name: String,
    /// True for automated participants.
    pub automated: bool,
}

/// State broadcast when a session forms and on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Room the session lives in.
    pub room_id: RoomId,
    /// Seats in turn order.
    pub seats: Vec<SeatView>,
    /// Piece positions per seat.
    pub pieces: Vec<SeatPieces>,
    /// Color of the acting participant.
    pub acting_participant: Color,
    /// Lifecycle state, including any pending roll.
    pub phase: Phase,
}

/// A live game: the aggregate root for one room.
#[derive(Debug, Clone)]
pub struct Session {
    room_id: RoomId,
    instance: u64,
    category: GameCategory,
    participants: Vec<Participant>,
    game: LudoGame,
}

impl Session {
    /// Room id.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Process-unique instance number; distinguishes reuses of a room id.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Game category.
    pub fn category(&self) -> GameCategory {
        self.category
    }

    /// Participants in turn order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// The game state.
    pub fn game(&self) -> &LudoGame {
        &self.game
    }

    /// The game state, mutably.
    pub fn game_mut(&mut self) -> &mut LudoGame {
        &mut self.game
    }

    /// Participant whose turn it is.
    pub fn acting_participant(&self) -> &Participant {
        &self.participants[self.game.turn()]
    }

    /// True if the acting participant is automated and the game is live.
    pub fn awaits_automated(&self) -> bool {
        !self.game.is_over() && self.acting_participant().is_automated()
    }

    /// Seat held by a connection, if any.
    pub fn seat_of(&self, connection: ConnectionId) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.connection() == Some(connection))
    }

    /// True if the connection holds a seat.
    pub fn has_connection(&self, connection: ConnectionId) -> bool {
        self.seat_of(connection).is_some()
    }

    /// Connections of all human participants.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.participants
            .iter()
            .filter_map(Participant::connection)
            .collect()
    }

    /// Color of a seat.
    pub fn color_of(&self, seat: usize) -> Color {
        Color::ALL[seat]
    }

    /// Rolls for the participant behind `connection`.
    ///
    /// # Errors
    ///
    /// [`ActionError::InvalidTurn`] if the connection holds no seat or it is
    /// not that seat's turn, or the game is not awaiting a roll.
    #[instrument(skip(self, dice), fields(room_id = %self.room_id))]
    pub fn roll(
        &mut self,
        connection: ConnectionId,
        dice: &mut dyn DiceSource,
    ) -> Result<RollOutcome, ActionError> {
        let seat = self.require_seat(connection)?;
        self.game.roll(seat, dice)
    }

    /// Moves a piece for the participant behind `connection`.
    ///
    /// # Errors
    ///
    /// [`ActionError::InvalidTurn`] for unknown or non-acting connections, or
    /// any error from the turn state machine.
    #[instrument(skip(self), fields(room_id = %self.room_id))]
    pub fn move_piece(
        &mut self,
        connection: ConnectionId,
        slot: PieceSlot,
    ) -> Result<TurnOutcome, ActionError> {
        let seat = self.require_seat(connection)?;
        self.game.move_piece(seat, slot)
    }

    /// Builds the public snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            room_id: self.room_id.clone(),
            seats: self
                .participants
                .iter()
                .enumerate()
                .map(|(seat, p)| SeatView {
                    color: self.color_of(seat),
                    name: p.display_name(),
                    automated: p.is_automated(),
                })
                .collect(),
            pieces: self.game.board().seats().to_vec(),
            acting_participant: self.game.acting_color(),
            phase: self.game.phase(),
        }
    }

    fn require_seat(&self, connection: ConnectionId) -> Result<usize, ActionError> {
        self.seat_of(connection).ok_or_else(|| {
            warn!(%connection, room_id = %self.room_id, "Connection holds no seat in this room");
            ActionError::InvalidTurn
        })
    }
}

/// Reason a session could not be created.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CreateSessionError {
    /// A live session already owns the room id.
    #[display("Session already exists: {_0}")]
    AlreadyExists(#[error(not(source))] RoomId),
    /// The participant count is outside what the category supports.
    #[display("Unsupported participant count: {_0}")]
    ParticipantCount(#[error(not(source))] usize),
}

/// Maps room ids to their single live session.
///
/// Owned by the coordinator; nothing else holds session state.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<RoomId, Session>,
    next_instance: u64,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating session registry");
        Self::default()
    }

    /// Creates the session for a room from a finalized participant list.
    ///
    /// Participants are seated in list order; seat `i` plays `Color::ALL[i]`.
    #[instrument(skip(self, participants), fields(count = participants.len()))]
    pub fn create_session(
        &mut self,
        room_id: RoomId,
        category: GameCategory,
        participants: Vec<Participant>,
    ) -> Result<&mut Session, CreateSessionError> {
        if self.sessions.contains_key(&room_id) {
            warn!(%room_id, "Session already exists");
            return Err(CreateSessionError::AlreadyExists(room_id));
        }
        let count = participants.len();
        if count < category.min_players() || count > category.max_players() {
            warn!(%room_id, count, "Unsupported participant count");
            return Err(CreateSessionError::ParticipantCount(count));
        }

        self.next_instance += 1;
        let session = Session {
            room_id: room_id.clone(),
            instance: self.next_instance,
            category,
            participants,
            game: LudoGame::new(count),
        };

        info!(%room_id, instance = session.instance, %category, count, "Created session");
        Ok(self.sessions.entry(room_id).or_insert(session))
    }

    /// Gets a session by room id.
    pub fn get(&self, room_id: &str) -> Option<&Session> {
        self.sessions.get(room_id)
    }

    /// Gets a session mutably.
    ///
    /// # Errors
    ///
    /// [`ActionError::SessionNotFound`] if the room has no live session.
    #[instrument(skip(self))]
    pub fn require_mut(&mut self, room_id: &str) -> Result<&mut Session, ActionError> {
        self.sessions.get_mut(room_id).ok_or_else(|| {
            debug!(room_id, "Session not found");
            ActionError::SessionNotFound
        })
    }

    /// Gets a session only if it is still the given instance.
    pub fn get_instance_mut(&mut self, room_id: &str, instance: u64) -> Option<&mut Session> {
        self.sessions
            .get_mut(room_id)
            .filter(|session| session.instance == instance)
    }

    /// Removes a session, returning it if it existed.
    #[instrument(skip(self))]
    pub fn remove(&mut self, room_id: &str) -> Option<Session> {
        let removed = self.sessions.remove(room_id);
        if removed.is_some() {
            info!(room_id, "Removed session");
        }
        removed
    }

    /// Rooms in which the connection holds a seat.
    pub fn rooms_with_connection(&self, connection: ConnectionId) -> Vec<RoomId> {
        self.sessions
            .values()
            .filter(|s| s.has_connection(connection))
            .map(|s| s.room_id.clone())
            .collect()
    }

    /// True if the room has a live session.
    pub fn contains(&self, room_id: &str) -> bool {
        self.sessions.contains_key(room_id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
