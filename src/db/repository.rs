//! Repository over the users and game_stats tables.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument, warn};

use crate::db::{AggregatedStats, DbError, GameStat, NewGameStat, NewUser, User, schema};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database repository; opens a connection per call.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a repository for the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new("Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Creates a user with an access token.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the name or token is taken.
    #[instrument(skip(self, token))]
    pub fn create_user(&self, display_name: String, token: String) -> Result<User, DbError> {
        let mut conn = self.connection()?;

        let user = diesel::insert_into(schema::users::table)
            .values(&NewUser::new(display_name, token))
            .returning(User::as_returning())
            .get_result(&mut conn)?;

        info!(user_id = user.id(), display_name = %user.display_name(), "User created");
        Ok(user)
    }

    /// Gets a user by display name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user_by_name(&self, display_name: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::display_name.eq(display_name))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        debug!(found = user.is_some(), "User lookup by name");
        Ok(user)
    }

    /// Gets a user by access token.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, token))]
    pub fn get_user_by_token(&self, token: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.connection()?;

        let user = schema::users::table
            .filter(schema::users::token.eq(token))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        debug!(found = user.is_some(), "User lookup by token");
        Ok(user)
    }

    /// Lists users ordered by creation.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_users(&self) -> Result<Vec<User>, DbError> {
        let mut conn = self.connection()?;

        let users = schema::users::table
            .order((schema::users::created_at.asc(), schema::users::id.asc()))
            .select(User::as_select())
            .load(&mut conn)?;

        info!(count = users.len(), "Users loaded");
        Ok(users)
    }

    /// Records a completed game result.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, stat), fields(user_id = stat.user_id(), game_type = %stat.game_type(), outcome = %stat.outcome()))]
    pub fn record_game(&self, stat: NewGameStat) -> Result<GameStat, DbError> {
        let mut conn = self.connection()?;

        let game_stat = diesel::insert_into(schema::game_stats::table)
            .values(&stat)
            .returning(GameStat::as_returning())
            .get_result(&mut conn)?;

        info!(
            stat_id = game_stat.id(),
            room_id = %game_stat.room_id(),
            "Game result recorded"
        );
        Ok(game_stat)
    }

    /// Game results of a user, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user_stats(&self, user_id: i32) -> Result<Vec<GameStat>, DbError> {
        let mut conn = self.connection()?;

        let stats = schema::game_stats::table
            .filter(schema::game_stats::user_id.eq(user_id))
            .order((
                schema::game_stats::played_at.desc(),
                schema::game_stats::id.desc(),
            ))
            .select(GameStat::as_select())
            .load(&mut conn)?;

        debug!(count = stats.len(), "User stats loaded");
        Ok(stats)
    }

    /// Win/loss totals for a user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_aggregated_stats(&self, user_id: i32) -> Result<AggregatedStats, DbError> {
        let stats = self.get_user_stats(user_id)?;

        let mut wins = 0;
        let mut losses = 0;
        for stat in &stats {
            match stat.outcome().as_str() {
                "win" => wins += 1,
                "loss" => losses += 1,
                other => warn!(outcome = %other, stat_id = stat.id(), "Unknown outcome value"),
            }
        }

        let aggregated = AggregatedStats::new(stats.len() as i32, wins, losses);
        info!(
            user_id,
            wins,
            losses,
            win_rate = %format!("{:.1}%", aggregated.win_rate()),
            "Aggregated stats computed"
        );
        Ok(aggregated)
    }
}
