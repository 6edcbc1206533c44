//! Player profiles: token verification and outcome recording.

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info, instrument, warn};

use crate::db::{AggregatedStats, DbError, GameOutcome, GameRepository, GameStat, NewGameStat, User};
use crate::games::GameCategory;
use crate::session::Identity;

const TOKEN_LEN: usize = 32;

/// Resolves connection tokens to identities.
pub trait IdentityVerifier: Send + Sync {
    /// Returns the identity owning `token`, or `None` if the token is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the lookup itself fails.
    fn verify_identity(&self, token: &str) -> Result<Option<Identity>, DbError>;
}

/// Persists game outcomes for verified participants.
pub trait OutcomeRecorder: Send {
    /// Records a win or loss.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] when the write fails.
    fn record_outcome(
        &self,
        identity: &Identity,
        category: GameCategory,
        room_id: &str,
        won: bool,
    ) -> Result<(), DbError>;
}

/// Profile operations over a [`GameRepository`].
#[derive(Debug, Clone)]
pub struct ProfileService {
    repository: GameRepository,
}

impl ProfileService {
    /// Creates a service backed by the given repository.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository) -> Self {
        info!("Creating ProfileService");
        Self { repository }
    }

    /// Opens the database at `db_path` and applies migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or migrated.
    #[instrument]
    pub fn open(db_path: &str) -> Result<Self, DbError> {
        let repository = GameRepository::new(db_path.to_string())?;
        repository.run_migrations()?;
        Ok(Self::new(repository))
    }

    /// Registers a user under a fresh random token.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the name is taken.
    #[instrument(skip(self))]
    pub fn register_user(&self, display_name: String) -> Result<User, DbError> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        self.repository.create_user(display_name, token)
    }

    /// Looks up a user by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn find_user(&self, display_name: &str) -> Result<Option<User>, DbError> {
        self.repository.get_user_by_name(display_name)
    }

    /// Win/loss totals for a user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_stats(&self, user_id: i32) -> Result<AggregatedStats, DbError> {
        self.repository.get_aggregated_stats(user_id)
    }

    /// Game history for a user, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_history(&self, user_id: i32) -> Result<Vec<GameStat>, DbError> {
        self.repository.get_user_stats(user_id)
    }
}

impl IdentityVerifier for ProfileService {
    #[instrument(skip(self, token))]
    fn verify_identity(&self, token: &str) -> Result<Option<Identity>, DbError> {
        let identity = self
            .repository
            .get_user_by_token(token)?
            .map(|user| Identity::new(*user.id(), user.display_name().clone()));
        match &identity {
            Some(identity) => debug!(user_id = identity.user_id(), "Token verified"),
            None => warn!("Unknown token"),
        }
        Ok(identity)
    }
}

impl OutcomeRecorder for ProfileService {
    #[instrument(skip(self, identity), fields(user_id = identity.user_id()))]
    fn record_outcome(
        &self,
        identity: &Identity,
        category: GameCategory,
        room_id: &str,
        won: bool,
    ) -> Result<(), DbError> {
        let stat = NewGameStat::new(
            *identity.user_id(),
            category.to_string(),
            GameOutcome::from_won(won).to_db_string().to_string(),
            room_id.to_string(),
        );
        self.repository.record_game(stat)?;
        Ok(())
    }
}
