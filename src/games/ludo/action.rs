//! Action outcomes and the error kinds reported back to the acting client.
//!
//! Every engine operation returns a `Result` whose success side carries the
//! full effect of the action, so callers cannot forget the failure path.

use super::track::{Color, Position};
use serde::{Deserialize, Serialize};

/// Identifier of a piece within its owner's set (0-3).
pub type PieceSlot = u8;

/// Reason an action was rejected.
///
/// All kinds are recovered locally and reported only to the originating
/// actor as an `action-error` message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display, derive_more::Error,
)]
#[serde(rename_all = "kebab-case")]
pub enum ActionError {
    /// Action from a non-acting participant or in the wrong lifecycle state.
    #[display("Not your turn")]
    InvalidTurn,

    /// The piece slot does not exist.
    #[display("Invalid piece")]
    InvalidPiece,

    /// A piece in base can only enter the board on a 6.
    #[display("Need 6 to start")]
    NeedSixToStart,

    /// The move overshoots the finished slot or targets a finished piece.
    #[display("Invalid move")]
    InvalidMove,

    /// The room has no live session.
    #[display("Game not found")]
    SessionNotFound,

    /// The private room has no free seat.
    #[display("Room is full")]
    RoomFull,

    /// No private room matches the code or id.
    #[display("Room not found")]
    RoomNotFound,

    /// Only the room host may start the game.
    #[display("Only host can start the game")]
    NotHost,

    /// A game needs at least two participants.
    #[display("Not enough players")]
    NotEnoughPlayers,

    /// The inbound message could not be understood.
    #[display("Invalid request")]
    InvalidRequest,
}

/// An opposing piece sent back to base by a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// Owner of the captured piece.
    pub color: Color,
    /// Slot of the captured piece, which is also the base slot it returns to.
    pub slot: PieceSlot,
    /// Main-loop cell where the capture happened.
    pub cell: u8,
}

/// Effect of one successful piece move on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Color of the moved piece.
    pub color: Color,
    /// Slot of the moved piece.
    pub slot: PieceSlot,
    /// Position before the move.
    pub from: Position,
    /// Position after the move.
    pub to: Position,
    /// Piece sent back to base, if any.
    pub captured: Option<Capture>,
    /// The moved piece reached its finished slot with this move.
    pub finished: bool,
    /// The mover now has all four pieces finished.
    pub won: bool,
}

/// Result of a successful roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Seat that rolled.
    pub seat: usize,
    /// Value shown on the die (1-6).
    pub dice: u8,
    /// Piece slots that can legally move with this value.
    pub valid_slots: Vec<PieceSlot>,
}

/// Result of a successful move through the turn state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Board-level effect of the move.
    pub outcome: MoveOutcome,
    /// Seat that moved.
    pub acting_seat: usize,
    /// Seat that acts next (the same seat on a bonus turn or a win).
    pub next_seat: usize,
    /// The acting seat earned another turn.
    pub bonus: bool,
    /// Winning seat if the move ended the game.
    pub winner: Option<usize>,
}

impl TurnOutcome {
    /// Returns true if the move ended the game.
    pub fn game_over(&self) -> bool {
        self.winner.is_some()
    }
}

/// Result of skipping a turn with no legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipOutcome {
    /// Seat whose turn was skipped.
    pub skipped_seat: usize,
    /// Seat that acts next.
    pub next_seat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(ActionError::RoomFull);
        assert_eq!(err.to_string(), "Room is full");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_action_error_wire_name() {
        let value = serde_json::to_value(ActionError::NeedSixToStart).unwrap();
        assert_eq!(value, "need-six-to-start");
    }
}
