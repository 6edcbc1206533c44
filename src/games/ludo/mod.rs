//! Four-color race-and-capture board game.

mod action;
mod board;
mod dice;
mod game;
mod track;

pub use action::{
    ActionError, Capture, MoveOutcome, PieceSlot, RollOutcome, SkipOutcome, TurnOutcome,
};
pub use board::{Board, Piece, SeatPieces};
pub use dice::{DiceSource, GameRng};
pub use game::{LudoGame, Phase};
pub use track::{
    Color, ENTRY_ROLL, HOME_LEN, LOOP_LEN, PIECES_PER_PLAYER, Position, SAFE_CELLS, advance,
    simulate,
};
