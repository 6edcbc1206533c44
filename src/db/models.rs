//! Database models and domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::instrument;

use crate::db::{DbError, schema};

/// Registered player.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
pub struct User {
    id: i32,
    display_name: String,
    token: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Insertable user row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    display_name: String,
    token: String,
}

/// One recorded game result.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::game_stats)]
#[diesel(belongs_to(User))]
pub struct GameStat {
    id: i32,
    user_id: i32,
    game_type: String,
    outcome: String,
    room_id: String,
    played_at: NaiveDateTime,
}

impl GameStat {
    /// Parses the stored outcome.
    #[instrument(skip(self), fields(outcome = %self.outcome))]
    pub fn parse_outcome(&self) -> Result<GameOutcome, DbError> {
        GameOutcome::from_db_string(self.outcome())
    }
}

/// Insertable game result row.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::game_stats)]
pub struct NewGameStat {
    user_id: i32,
    game_type: String,
    outcome: String,
    room_id: String,
}

/// Game outcome from the player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameOutcome {
    /// Player finished all pieces first.
    Win,
    /// Someone else did.
    Loss,
}

impl GameOutcome {
    /// Outcome for a player given whether they won.
    pub fn from_won(won: bool) -> Self {
        if won { Self::Win } else { Self::Loss }
    }

    /// String stored in the database.
    #[instrument]
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Loss => "loss",
        }
    }

    /// Parses the stored string.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] for anything other than `win` or `loss`.
    #[instrument(skip(s), fields(s = %s))]
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "win" => Ok(Self::Win),
            "loss" => Ok(Self::Loss),
            _ => Err(DbError::new(format!("Invalid outcome: '{}'", s))),
        }
    }
}

/// Win/loss totals for a player.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct AggregatedStats {
    total_games: i32,
    wins: i32,
    losses: i32,
}

impl AggregatedStats {
    /// Win rate as a percentage (0.0 to 100.0).
    #[instrument(skip(self))]
    pub fn win_rate(&self) -> f64 {
        if self.total_games == 0 {
            0.0
        } else {
            (self.wins as f64 / self.total_games as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_strings() {
        assert_eq!(GameOutcome::from_won(true).to_db_string(), "win");
        assert_eq!(GameOutcome::from_db_string("loss").unwrap(), GameOutcome::Loss);
        assert!(GameOutcome::from_db_string("draw").is_err());
    }

    #[test]
    fn test_win_rate() {
        assert_eq!(AggregatedStats::new(0, 0, 0).win_rate(), 0.0);
        assert_eq!(AggregatedStats::new(4, 1, 3).win_rate(), 25.0);
    }
}
