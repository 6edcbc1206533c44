//! Position model for the four-color race board.
//!
//! The board has three disjoint position spaces:
//!
//! - the shared main loop (cells 0-51, wrapping 51 -> 0),
//! - a per-color home stretch of six cells whose last cell is the finished slot,
//! - a per-color base of four slots, one per piece.
//!
//! Everything here is a pure function of a [`Color`] and a [`Position`].

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Number of cells on the shared main loop.
pub const LOOP_LEN: u8 = 52;

/// Number of cells in each color's home stretch, finished slot included.
pub const HOME_LEN: u8 = 6;

/// Pieces owned by every participant.
pub const PIECES_PER_PLAYER: usize = 4;

/// Die value required to bring a piece out of base.
pub const ENTRY_ROLL: u8 = 6;

/// Main-loop cells on which no capture may occur.
pub const SAFE_CELLS: [u8; 8] = [0, 8, 13, 21, 26, 34, 39, 47];

const START_CELLS: [u8; 4] = [0, 13, 26, 39];
const TURNING_POINTS: [u8; 4] = [50, 11, 24, 37];

/// The four seat colors, in seat order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Color {
    /// Seat 0.
    Red,
    /// Seat 1.
    Blue,
    /// Seat 2.
    Yellow,
    /// Seat 3.
    Green,
}

impl Color {
    /// All colors in seat order.
    pub const ALL: [Color; 4] = [Color::Red, Color::Blue, Color::Yellow, Color::Green];

    /// Returns the color bound to the given seat index.
    pub fn from_seat(seat: usize) -> Option<Self> {
        Self::ALL.get(seat).copied()
    }

    /// Returns the seat index (0-3) of this color.
    pub fn seat(self) -> usize {
        self as usize
    }

    /// Main-loop cell where this color's pieces enter the board.
    pub fn start_cell(self) -> u8 {
        START_CELLS[self.seat()]
    }

    /// Main-loop cell from which this color's next step enters its home stretch.
    pub fn turning_point(self) -> u8 {
        TURNING_POINTS[self.seat()]
    }
}

/// A location in one of the three position spaces.
///
/// The color a position belongs to is implied by the piece's owner, so a
/// piece can never sit in another color's base or home stretch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "space", content = "index", rename_all = "lowercase")]
pub enum Position {
    /// Base slot (0-3), occupied until the piece enters the loop.
    Base(u8),
    /// Shared main-loop cell (0-51).
    Loop(u8),
    /// Home-stretch step (0-5); step 5 is the finished slot.
    Home(u8),
}

impl Position {
    /// The finished slot at the end of every home stretch.
    pub const FINISHED: Position = Position::Home(HOME_LEN - 1);

    /// Returns true for the finished slot.
    pub fn is_finished(self) -> bool {
        self == Self::FINISHED
    }

    /// Returns true while the piece waits in base.
    pub fn is_base(self) -> bool {
        matches!(self, Position::Base(_))
    }

    /// Returns the loop cell if this position is on the main loop.
    pub fn loop_cell(self) -> Option<u8> {
        match self {
            Position::Loop(cell) => Some(cell),
            _ => None,
        }
    }

    /// Returns true when the position is a safe main-loop cell.
    pub fn is_safe(self) -> bool {
        self.loop_cell().is_some_and(|cell| SAFE_CELLS.contains(&cell))
    }
}

/// Computes the single next position for a piece of `color`.
///
/// Returns `None` when no step is possible: the piece is already on the
/// finished slot, still in base, or the position is out of range.
#[instrument(level = "trace")]
pub fn advance(color: Color, position: Position) -> Option<Position> {
    match position {
        Position::Home(step) if step < HOME_LEN - 1 => Some(Position::Home(step + 1)),
        Position::Home(_) => None,
        Position::Base(_) => None,
        Position::Loop(cell) if cell >= LOOP_LEN => None,
        Position::Loop(cell) if cell == color.turning_point() => Some(Position::Home(0)),
        Position::Loop(cell) if cell == LOOP_LEN - 1 => Some(Position::Loop(0)),
        Position::Loop(cell) => Some(Position::Loop(cell + 1)),
    }
}

/// Applies [`advance`] exactly `steps` times.
///
/// Returns `None` as soon as any intermediate step is impossible, which is how
/// a roll that would overshoot the finished slot is rejected.
#[instrument(level = "trace")]
pub fn simulate(color: Color, position: Position, steps: u8) -> Option<Position> {
    (0..steps).try_fold(position, |pos, _| advance(color, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_color() -> impl Strategy<Value = Color> {
        (0usize..4).prop_map(|seat| Color::ALL[seat])
    }

    #[test]
    fn test_loop_wraps_for_every_color() {
        for color in Color::ALL {
            assert_eq!(advance(color, Position::Loop(51)), Some(Position::Loop(0)));
        }
    }

    #[test]
    fn test_turning_point_enters_home() {
        for color in Color::ALL {
            assert_eq!(
                advance(color, Position::Loop(color.turning_point())),
                Some(Position::Home(0))
            );
        }
    }

    #[test]
    fn test_other_colors_pass_turning_point() {
        // Blue turns at 11; red keeps going.
        assert_eq!(advance(Color::Red, Position::Loop(11)), Some(Position::Loop(12)));
        assert_eq!(advance(Color::Blue, Position::Loop(11)), Some(Position::Home(0)));
    }

    #[test]
    fn test_base_does_not_advance() {
        assert_eq!(advance(Color::Green, Position::Base(2)), None);
        assert_eq!(simulate(Color::Green, Position::Base(2), 0), Some(Position::Base(2)));
    }

    #[test]
    fn test_simulate_into_home_stretch() {
        // Red turns at 50: 50 -> H0 -> H1 -> H2
        assert_eq!(simulate(Color::Red, Position::Loop(48), 5), Some(Position::Home(2)));
    }

    #[test]
    fn test_simulate_exact_finish() {
        assert_eq!(simulate(Color::Yellow, Position::Home(2), 3), Some(Position::FINISHED));
    }

    #[test]
    fn test_simulate_overshoot_rejected() {
        assert_eq!(simulate(Color::Yellow, Position::Home(2), 4), None);
        assert_eq!(simulate(Color::Blue, Position::Loop(10), 6), Some(Position::Home(4)));
        assert_eq!(simulate(Color::Blue, Position::Loop(9), 6), Some(Position::Home(3)));
        assert_eq!(simulate(Color::Blue, Position::Loop(11), 7), None);
    }

    #[test]
    fn test_safe_cells_include_start_cells() {
        for color in Color::ALL {
            assert!(Position::Loop(color.start_cell()).is_safe());
        }
        assert!(!Position::Loop(5).is_safe());
        assert!(!Position::Home(0).is_safe());
    }

    proptest! {
        #[test]
        fn prop_home_advance_invalid_only_at_terminal(color in any_color(), step in 0u8..HOME_LEN) {
            let next = advance(color, Position::Home(step));
            prop_assert_eq!(next.is_none(), step == HOME_LEN - 1);
        }

        #[test]
        fn prop_simulate_is_repeated_advance(color in any_color(), cell in 0u8..LOOP_LEN, steps in 0u8..=6) {
            let mut expected = Some(Position::Loop(cell));
            for _ in 0..steps {
                expected = expected.and_then(|p| advance(color, p));
            }
            prop_assert_eq!(simulate(color, Position::Loop(cell), steps), expected);
        }

        #[test]
        fn prop_loop_positions_stay_in_range(color in any_color(), cell in 0u8..LOOP_LEN) {
            match advance(color, Position::Loop(cell)) {
                Some(Position::Loop(next)) => prop_assert!(next < LOOP_LEN),
                Some(Position::Home(step)) => {
                    prop_assert_eq!(step, 0);
                    prop_assert_eq!(cell, color.turning_point());
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
