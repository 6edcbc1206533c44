//! SQLite persistence for player identities and game outcomes.

mod error;
mod models;
mod repository;
mod schema;

pub use error::DbError;
pub use models::{AggregatedStats, GameOutcome, GameStat, NewGameStat, NewUser, User};
pub use repository::GameRepository;
