//! Wire messages exchanged over a connection.
//!
//! Frames are JSON objects tagged by `type` in kebab-case, for example
//! `{"type":"move-request","room_id":"ludo-3","piece_slot":2}`.

use crate::games::GameCategory;
use crate::games::ludo::{
    ActionError, Capture, Color, PieceSlot, RollOutcome, SeatPieces, SkipOutcome, TurnOutcome,
};
use crate::session::{RoomId, Session, SessionSnapshot};
use serde::{Deserialize, Serialize};

/// Messages a participant sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join the matchmaking queue for a category.
    FindMatch {
        /// Requested game category.
        category: GameCategory,
        /// Requested group size; the server default applies when absent.
        #[serde(default)]
        group_size: Option<usize>,
    },
    /// Leave the matchmaking queue.
    CancelMatchmaking,
    /// Open a private room with a shareable code.
    CreateRoom {
        /// Seats in the room; the server default applies when absent.
        #[serde(default)]
        max_players: Option<usize>,
    },
    /// Join a private room by code.
    JoinRoom {
        /// Code shown to the host.
        room_code: String,
    },
    /// Start a private room (host only).
    StartGame {
        /// Room to start.
        room_id: RoomId,
        /// Fill empty seats with automated participants.
        #[serde(default)]
        fill_with_automated: bool,
    },
    /// Roll the die.
    RollRequest {
        /// Room of the session.
        room_id: RoomId,
    },
    /// Move a piece with the pending roll.
    MoveRequest {
        /// Room of the session.
        room_id: RoomId,
        /// Piece to move.
        piece_slot: PieceSlot,
    },
    /// Leave a running game.
    LeaveGame {
        /// Room to leave.
        room_id: RoomId,
    },
    /// Opaque voice-chat signaling payload for the other room members.
    VoiceSignal {
        /// Room whose members receive the payload.
        room_id: RoomId,
        /// Passed through untouched.
        signal: serde_json::Value,
    },
}

/// Messages the server sends to one connection or a whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Queued; waiting for more players.
    Searching {
        /// Current queue length.
        queue_size: usize,
    },
    /// Matchmaking formed a session.
    MatchFound {
        /// Room of the new session.
        room_id: RoomId,
        /// Color assigned to the recipient.
        color: Color,
        /// Initial state.
        snapshot: SessionSnapshot,
    },
    /// A private room was opened.
    RoomCreated {
        /// Room id.
        room_id: RoomId,
        /// Shareable code.
        room_code: String,
        /// Seats in the room.
        max_players: usize,
    },
    /// Someone joined a private room.
    PlayerJoined {
        /// Room id.
        room_id: RoomId,
        /// Shareable code.
        room_code: String,
        /// Members in join order.
        players: Vec<String>,
        /// Seats in the room.
        max_players: usize,
    },
    /// A private room turned into a session.
    GameStarted {
        /// Room id.
        room_id: RoomId,
        /// Color assigned to the recipient.
        color: Color,
        /// Initial state.
        snapshot: SessionSnapshot,
        /// Colors played by automated participants.
        automated: Vec<Color>,
    },
    /// The acting participant rolled.
    RollResult {
        /// Value shown.
        dice_value: u8,
        /// Who rolled.
        acting_participant: Color,
        /// Pieces that may move.
        valid_slots: Vec<PieceSlot>,
    },
    /// A piece moved.
    MoveResult {
        /// All piece positions after the move.
        pieces: Vec<SeatPieces>,
        /// Piece sent back to base, if any.
        captured: Option<Capture>,
        /// Who moved.
        acting_participant: Color,
        /// Who acts next.
        next_participant: Color,
        /// True if the move ended the game.
        game_over: bool,
        /// Winner when the game is over.
        winner: Option<Color>,
    },
    /// A turn passed without a move.
    SkipResult {
        /// All piece positions.
        pieces: Vec<SeatPieces>,
        /// Who acts next.
        next_participant: Color,
    },
    /// A participant left or disconnected; the session is closed.
    ParticipantLeft {
        /// Room that closed.
        room_id: RoomId,
    },
    /// Matchmaking request withdrawn.
    MatchmakingCancelled,
    /// Voice-chat signaling relayed from another room member.
    VoiceSignal {
        /// Room the payload came through.
        room_id: RoomId,
        /// Payload as sent.
        signal: serde_json::Value,
    },
    /// The recipient's last action was rejected.
    ActionError {
        /// Error kind.
        kind: ActionError,
        /// Human-readable description.
        message: String,
    },
}

impl ServerMessage {
    /// Builds a roll broadcast.
    pub fn roll_result(session: &Session, roll: &RollOutcome) -> Self {
        Self::RollResult {
            dice_value: roll.dice,
            acting_participant: session.color_of(roll.seat),
            valid_slots: roll.valid_slots.clone(),
        }
    }

    /// Builds a move broadcast.
    pub fn move_result(session: &Session, turn: &TurnOutcome) -> Self {
        Self::MoveResult {
            pieces: session.game().board().seats().to_vec(),
            captured: turn.outcome.captured,
            acting_participant: session.color_of(turn.acting_seat),
            next_participant: session.color_of(turn.next_seat),
            game_over: turn.game_over(),
            winner: turn.winner.map(|seat| session.color_of(seat)),
        }
    }

    /// Builds a skip broadcast.
    pub fn skip_result(session: &Session, skip: &SkipOutcome) -> Self {
        Self::SkipResult {
            pieces: session.game().board().seats().to_vec(),
            next_participant: session.color_of(skip.next_seat),
        }
    }

    /// Builds the single-recipient error message.
    pub fn error(kind: ActionError) -> Self {
        Self::ActionError {
            kind,
            message: kind.to_string(),
        }
    }
}
