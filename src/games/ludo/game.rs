//! Turn state machine layered over the board engine.
//!
//! ```text
//! AwaitingRoll --roll--> AwaitingMove{dice} --move--> AwaitingRoll (same or next seat)
//!                                           \--skip--> AwaitingRoll (next seat)
//!                                            \--winning move--> Finished
//! ```

use super::action::{ActionError, PieceSlot, RollOutcome, SkipOutcome, TurnOutcome};
use super::board::Board;
use super::dice::DiceSource;
use super::track::{Color, ENTRY_ROLL};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Lifecycle state of a game.
///
/// The pending die value only exists while a move is awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Phase {
    /// The acting seat must roll.
    AwaitingRoll,
    /// The acting seat rolled and must move or be skipped.
    AwaitingMove {
        /// Pending die value.
        dice: u8,
    },
    /// Terminal: a seat has finished all pieces.
    Finished {
        /// Winning seat.
        winner: usize,
    },
}

/// A four-color race game: board plus turn bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LudoGame {
    board: Board,
    turn: usize,
    phase: Phase,
}

impl LudoGame {
    /// Creates a game for `seat_count` participants (2-4), seat 0 acting first.
    #[instrument]
    pub fn new(seat_count: usize) -> Self {
        Self::from_board(Board::new(seat_count))
    }

    /// Starts a game on a prepared board, seat 0 acting first.
    #[instrument(skip(board), fields(seats = board.seat_count()))]
    pub fn from_board(board: Board) -> Self {
        info!("Starting ludo game");
        Self {
            board,
            turn: 0,
            phase: Phase::AwaitingRoll,
        }
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the board mutably, for scenario setup.
    #[cfg(any(test, feature = "test-util"))]
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    /// Seat whose turn it is.
    pub fn turn(&self) -> usize {
        self.turn
    }

    /// Color of the acting seat.
    pub fn acting_color(&self) -> Color {
        Color::ALL[self.turn]
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Pending die value, present iff a move is awaited.
    pub fn pending_dice(&self) -> Option<u8> {
        match self.phase {
            Phase::AwaitingMove { dice } => Some(dice),
            _ => None,
        }
    }

    /// Winning seat once the game is over.
    pub fn winner(&self) -> Option<usize> {
        match self.phase {
            Phase::Finished { winner } => Some(winner),
            _ => None,
        }
    }

    /// Returns true once the game has reached its terminal state.
    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    /// Makes `seat` the acting seat. Used to set up scenarios.
    #[cfg(any(test, feature = "test-util"))]
    #[instrument(skip(self))]
    pub fn set_turn(&mut self, seat: usize) -> Result<(), ActionError> {
        if seat >= self.board.seat_count() || self.is_over() {
            return Err(ActionError::InvalidTurn);
        }
        self.turn = seat;
        self.phase = Phase::AwaitingRoll;
        Ok(())
    }

    /// Valid slots for the pending roll; empty when no roll is pending.
    pub fn valid_move_slots(&self) -> Vec<PieceSlot> {
        match self.phase {
            Phase::AwaitingMove { dice } => self.board.valid_move_slots(self.turn, dice),
            _ => Vec::new(),
        }
    }

    /// Rolls the die for the acting seat.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidTurn`] unless `seat` is acting and the
    /// game is awaiting a roll.
    #[instrument(skip(self, dice))]
    pub fn roll(
        &mut self,
        seat: usize,
        dice: &mut dyn DiceSource,
    ) -> Result<RollOutcome, ActionError> {
        if self.phase != Phase::AwaitingRoll || seat != self.turn {
            warn!(seat, turn = self.turn, phase = ?self.phase, "Roll rejected");
            return Err(ActionError::InvalidTurn);
        }

        let value = dice.roll_die();
        self.phase = Phase::AwaitingMove { dice: value };
        let valid_slots = self.valid_move_slots();

        info!(seat, dice = value, ?valid_slots, "Dice rolled");
        Ok(RollOutcome {
            seat,
            dice: value,
            valid_slots,
        })
    }

    /// Moves a piece of the acting seat with the pending roll.
    ///
    /// A 6, a capture, or finishing the moved piece keeps the turn with the
    /// same seat (one extra turn, never more). Otherwise the turn passes on.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidTurn`] unless `seat` is acting and a move
    /// is awaited, or any board error from [`Board::apply_move`]. A failed
    /// move leaves the roll pending.
    #[instrument(skip(self))]
    pub fn move_piece(&mut self, seat: usize, slot: PieceSlot) -> Result<TurnOutcome, ActionError> {
        let Phase::AwaitingMove { dice } = self.phase else {
            warn!(seat, phase = ?self.phase, "Move rejected: no pending roll");
            return Err(ActionError::InvalidTurn);
        };
        if seat != self.turn {
            warn!(seat, turn = self.turn, "Move rejected: not this seat's turn");
            return Err(ActionError::InvalidTurn);
        }

        let outcome = self.board.apply_move(seat, slot, dice)?;

        if outcome.won {
            self.phase = Phase::Finished { winner: seat };
            info!(seat, color = %outcome.color, "Game won");
            return Ok(TurnOutcome {
                outcome,
                acting_seat: seat,
                next_seat: seat,
                bonus: false,
                winner: Some(seat),
            });
        }

        let bonus = dice == ENTRY_ROLL || outcome.captured.is_some() || outcome.finished;
        if !bonus {
            self.advance_turn();
        }
        self.phase = Phase::AwaitingRoll;

        debug!(seat, bonus, next = self.turn, "Turn resolved");
        Ok(TurnOutcome {
            outcome,
            acting_seat: seat,
            next_seat: self.turn,
            bonus,
            winner: None,
        })
    }

    /// Passes the turn after a roll with no legal move. Never grants a bonus.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::InvalidTurn`] if no roll is pending or the
    /// pending roll has at least one legal move.
    #[instrument(skip(self))]
    pub fn skip(&mut self) -> Result<SkipOutcome, ActionError> {
        if !matches!(self.phase, Phase::AwaitingMove { .. }) {
            warn!(phase = ?self.phase, "Skip rejected: no pending roll");
            return Err(ActionError::InvalidTurn);
        }
        if !self.valid_move_slots().is_empty() {
            warn!(seat = self.turn, "Skip rejected: legal moves exist");
            return Err(ActionError::InvalidTurn);
        }

        let skipped_seat = self.turn;
        self.advance_turn();
        self.phase = Phase::AwaitingRoll;

        info!(skipped_seat, next = self.turn, "Turn skipped");
        Ok(SkipOutcome {
            skipped_seat,
            next_seat: self.turn,
        })
    }

    fn advance_turn(&mut self) {
        self.turn = (self.turn + 1) % self.board.seat_count();
    }
}
