//! Board engine: one session's piece set, move validation and enactment.

use super::action::{ActionError, Capture, MoveOutcome, PieceSlot};
use super::track::{self, Color, ENTRY_ROLL, PIECES_PER_PLAYER, Position};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// A single piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Slot id within the owner's set (0-3); also the base slot it returns to.
    pub slot: PieceSlot,
    /// Current location.
    pub position: Position,
    /// True once the piece occupies its finished slot. Never reverts.
    pub finished: bool,
}

impl Piece {
    fn in_base(slot: PieceSlot) -> Self {
        Self {
            slot,
            position: Position::Base(slot),
            finished: false,
        }
    }

    fn send_home(&mut self) {
        self.position = Position::Base(self.slot);
    }
}

/// The pieces of one seat, tagged with the seat's color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPieces {
    /// Color bound to the seat.
    pub color: Color,
    /// The seat's four pieces, indexed by slot.
    pub pieces: [Piece; PIECES_PER_PLAYER],
}

impl SeatPieces {
    fn new(color: Color) -> Self {
        Self {
            color,
            pieces: [0, 1, 2, 3].map(Piece::in_base),
        }
    }

    /// Returns true when every piece is finished.
    pub fn all_finished(&self) -> bool {
        self.pieces.iter().all(|p| p.finished)
    }
}

/// Authoritative piece positions for one session.
///
/// Seat `i` plays color `Color::ALL[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    seats: Vec<SeatPieces>,
}

impl Board {
    /// Creates a board with every piece in base. At most four seats are used.
    #[instrument]
    pub fn new(seat_count: usize) -> Self {
        let seats: Vec<_> = Color::ALL
            .iter()
            .take(seat_count)
            .map(|&color| SeatPieces::new(color))
            .collect();
        debug!(seats = seats.len(), "Created board");
        Self { seats }
    }

    /// Number of seated participants.
    pub fn seat_count(&self) -> usize {
        self.seats.len()
    }

    /// All seats in turn order.
    pub fn seats(&self) -> &[SeatPieces] {
        &self.seats
    }

    /// The pieces of a seat.
    pub fn seat(&self, seat: usize) -> Option<&SeatPieces> {
        self.seats.get(seat)
    }

    /// The color of a seat.
    pub fn color(&self, seat: usize) -> Option<Color> {
        self.seats.get(seat).map(|s| s.color)
    }

    /// Places a piece directly, keeping the finished flag consistent.
    ///
    /// Used to set up scenarios; regular play goes through [`Board::apply_move`].
    #[cfg(any(test, feature = "test-util"))]
    #[instrument(skip(self))]
    pub fn set_position(
        &mut self,
        seat: usize,
        slot: PieceSlot,
        position: Position,
    ) -> Result<(), ActionError> {
        let piece = self.piece_mut(seat, slot)?;
        piece.position = position;
        piece.finished = position.is_finished();
        Ok(())
    }

    /// Returns the slots that can legally move with `dice`.
    ///
    /// A base piece qualifies only on a 6; a piece on the board qualifies iff
    /// the full path stays within its track. Finished pieces never qualify.
    #[instrument(skip(self))]
    pub fn valid_move_slots(&self, seat: usize, dice: u8) -> Vec<PieceSlot> {
        let Some(seat_pieces) = self.seats.get(seat) else {
            return Vec::new();
        };
        let color = seat_pieces.color;

        let slots: Vec<PieceSlot> = seat_pieces
            .pieces
            .iter()
            .filter(|piece| !piece.finished)
            .filter(|piece| {
                if piece.position.is_base() {
                    dice == ENTRY_ROLL
                } else {
                    track::simulate(color, piece.position, dice).is_some()
                }
            })
            .map(|piece| piece.slot)
            .collect();

        debug!(seat, dice, ?slots, "Computed valid move slots");
        slots
    }

    /// Moves a piece by `dice` steps, resolving captures and finishing.
    ///
    /// # Errors
    ///
    /// - [`ActionError::InvalidTurn`] if the seat does not exist.
    /// - [`ActionError::InvalidPiece`] if the slot does not exist.
    /// - [`ActionError::NeedSixToStart`] if a base piece is moved without a 6.
    /// - [`ActionError::InvalidMove`] if the piece is finished or would overshoot.
    ///
    /// On error the board is unchanged.
    #[instrument(skip(self))]
    pub fn apply_move(
        &mut self,
        seat: usize,
        slot: PieceSlot,
        dice: u8,
    ) -> Result<MoveOutcome, ActionError> {
        let color = self.color(seat).ok_or(ActionError::InvalidTurn)?;
        let piece = *self.piece_mut(seat, slot)?;

        if piece.finished {
            warn!(seat, slot, "Attempted to move a finished piece");
            return Err(ActionError::InvalidMove);
        }

        let to = if piece.position.is_base() {
            if dice != ENTRY_ROLL {
                return Err(ActionError::NeedSixToStart);
            }
            Position::Loop(color.start_cell())
        } else {
            track::simulate(color, piece.position, dice).ok_or(ActionError::InvalidMove)?
        };

        let moved = self.piece_mut(seat, slot)?;
        moved.position = to;
        if to.is_finished() {
            moved.finished = true;
        }
        let finished = moved.finished;

        let captured = match to.loop_cell() {
            Some(cell) => self.resolve_capture(seat, cell),
            None => None,
        };

        let won = self.has_won(seat);

        info!(
            %color,
            slot,
            dice,
            from = ?piece.position,
            to = ?to,
            captured = ?captured,
            finished,
            won,
            "Piece moved"
        );

        Ok(MoveOutcome {
            color,
            slot,
            from: piece.position,
            to,
            captured,
            finished,
            won,
        })
    }

    /// Returns true when every piece of the seat is finished.
    pub fn has_won(&self, seat: usize) -> bool {
        self.seats.get(seat).is_some_and(SeatPieces::all_finished)
    }

    /// Sends the first opposing piece on `cell` back to base.
    ///
    /// Safe cells never capture. Two opposing pieces sharing a non-safe cell
    /// should not arise; if it does only the first is taken and a warning is
    /// logged.
    fn resolve_capture(&mut self, attacker: usize, cell: u8) -> Option<Capture> {
        let landing = Position::Loop(cell);
        if landing.is_safe() {
            debug!(cell, "Landing on safe cell, no capture");
            return None;
        }

        let occupants: Vec<(usize, usize)> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(seat, _)| *seat != attacker)
            .flat_map(|(seat, pieces)| {
                pieces
                    .pieces
                    .iter()
                    .enumerate()
                    .filter(|(_, piece)| piece.position == landing)
                    .map(move |(index, _)| (seat, index))
            })
            .collect();

        if occupants.len() > 1 {
            warn!(
                cell,
                count = occupants.len(),
                "Multiple opposing pieces share a non-safe cell; capturing the first only"
            );
        }

        let &(victim_seat, index) = occupants.first()?;
        let victim = &mut self.seats[victim_seat];
        let piece = &mut victim.pieces[index];
        piece.send_home();

        let capture = Capture {
            color: victim.color,
            slot: piece.slot,
            cell,
        };
        info!(?capture, "Captured piece");
        Some(capture)
    }

    fn piece_mut(&mut self, seat: usize, slot: PieceSlot) -> Result<&mut Piece, ActionError> {
        let seat_pieces = self.seats.get_mut(seat).ok_or(ActionError::InvalidTurn)?;
        seat_pieces
            .pieces
            .get_mut(usize::from(slot))
            .ok_or(ActionError::InvalidPiece)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_all_in_base() {
        let board = Board::new(4);
        assert_eq!(board.seat_count(), 4);
        for (seat, pieces) in board.seats().iter().enumerate() {
            assert_eq!(pieces.color, Color::ALL[seat]);
            for piece in &pieces.pieces {
                assert_eq!(piece.position, Position::Base(piece.slot));
                assert!(!piece.finished);
            }
        }
    }

    #[test]
    fn test_base_pieces_need_six() {
        let board = Board::new(2);
        assert!(board.valid_move_slots(0, 5).is_empty());
        assert_eq!(board.valid_move_slots(0, 6), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_enter_board_on_six() {
        let mut board = Board::new(2);
        let outcome = board.apply_move(1, 2, 6).expect("Valid entry");
        assert_eq!(outcome.to, Position::Loop(Color::Blue.start_cell()));
        assert_eq!(board.seat(1).unwrap().pieces[2].position, Position::Loop(13));
    }

    #[test]
    fn test_need_six_leaves_board_unchanged() {
        let mut board = Board::new(2);
        let before = board.clone();
        assert_eq!(board.apply_move(0, 0, 3), Err(ActionError::NeedSixToStart));
        assert_eq!(board, before);
    }

    #[test]
    fn test_unknown_slot_rejected() {
        let mut board = Board::new(2);
        assert_eq!(board.apply_move(0, 4, 6), Err(ActionError::InvalidPiece));
    }

    #[test]
    fn test_finished_piece_cannot_move() {
        let mut board = Board::new(2);
        board.set_position(0, 1, Position::FINISHED).unwrap();
        assert_eq!(board.apply_move(0, 1, 1), Err(ActionError::InvalidMove));
        assert!(!board.valid_move_slots(0, 6).contains(&1));
    }

    #[test]
    fn test_overshoot_rejected() {
        let mut board = Board::new(2);
        board.set_position(0, 0, Position::Home(3)).unwrap();
        assert_eq!(board.apply_move(0, 0, 3), Err(ActionError::InvalidMove));
        assert_eq!(board.seat(0).unwrap().pieces[0].position, Position::Home(3));
    }

    #[test]
    fn test_capture_on_plain_cell() {
        let mut board = Board::new(2);
        board.set_position(0, 0, Position::Loop(2)).unwrap();
        board.set_position(1, 3, Position::Loop(5)).unwrap();

        let outcome = board.apply_move(0, 0, 3).unwrap();
        assert_eq!(
            outcome.captured,
            Some(Capture {
                color: Color::Blue,
                slot: 3,
                cell: 5
            })
        );
        assert_eq!(board.seat(1).unwrap().pieces[3].position, Position::Base(3));
    }

    #[test]
    fn test_no_capture_on_safe_cell() {
        let mut board = Board::new(2);
        board.set_position(0, 0, Position::Loop(5)).unwrap();
        board.set_position(1, 0, Position::Loop(8)).unwrap();

        let outcome = board.apply_move(0, 0, 3).unwrap();
        assert_eq!(outcome.captured, None);
        assert_eq!(board.seat(1).unwrap().pieces[0].position, Position::Loop(8));
    }

    #[test]
    fn test_shared_cell_captures_first_occupant_only() {
        let mut board = Board::new(3);
        board.set_position(0, 0, Position::Loop(7)).unwrap();
        board.set_position(1, 2, Position::Loop(10)).unwrap();
        board.set_position(2, 1, Position::Loop(10)).unwrap();

        let outcome = board.apply_move(0, 0, 3).unwrap();
        assert_eq!(
            outcome.captured,
            Some(Capture {
                color: Color::ALL[1],
                slot: 2,
                cell: 10,
            })
        );
        assert_eq!(board.seat(1).unwrap().pieces[2].position, Position::Base(2));
        assert_eq!(board.seat(2).unwrap().pieces[1].position, Position::Loop(10));
        assert_eq!(board.seat(0).unwrap().pieces[0].position, Position::Loop(10));
    }

    #[test]
    fn test_own_pieces_stack_without_capture() {
        let mut board = Board::new(2);
        board.set_position(0, 0, Position::Loop(2)).unwrap();
        board.set_position(0, 1, Position::Loop(5)).unwrap();

        let outcome = board.apply_move(0, 0, 3).unwrap();
        assert_eq!(outcome.captured, None);
        assert_eq!(board.seat(0).unwrap().pieces[1].position, Position::Loop(5));
    }

    #[test]
    fn test_home_stretch_never_captures() {
        let mut board = Board::new(2);
        board.set_position(0, 0, Position::Loop(49)).unwrap();
        let outcome = board.apply_move(0, 0, 3).unwrap();
        assert_eq!(outcome.to, Position::Home(1));
        assert_eq!(outcome.captured, None);
    }

    #[test]
    fn test_finishing_sets_flag_and_win() {
        let mut board = Board::new(2);
        for slot in 0..3 {
            board.set_position(0, slot, Position::FINISHED).unwrap();
        }
        board.set_position(0, 3, Position::Home(4)).unwrap();

        let outcome = board.apply_move(0, 3, 1).unwrap();
        assert!(outcome.finished);
        assert!(outcome.won);
        assert!(board.has_won(0));
        assert!(!board.has_won(1));
    }
}
