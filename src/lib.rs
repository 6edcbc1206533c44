//! Parlor Games library - server-authoritative multiplayer board games
//!
//! Players connect over WebSocket, get matched (or meet in a private room),
//! and play Ludo against each other or against automated participants. The
//! server owns all game state; clients only send intents.
//!
//! # Architecture
//!
//! - **Games**: pure rules engines (currently Ludo)
//! - **Session**: one live game per room, with its participants
//! - **Coordinator**: single event loop owning sessions, queues, lobbies and timers
//! - **Server**: axum WebSocket transport feeding the coordinator
//! - **Db**: SQLite identities and win/loss history
//!
//! # Example
//!
//! ```no_run
//! use parlor_games::{ServerConfig, serve};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default().with_port(3001).apply_env();
//! serve(config).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod coordinator;
mod db;
mod driver;
mod games;
mod hub;
mod lobby;
mod matchmaking;
mod profile_service;
mod protocol;
mod scheduler;
mod server;
mod session;

pub use config::{ConfigError, ServerConfig};
pub use coordinator::{Coordinator, Event, HealthStatus};
pub use db::{AggregatedStats, DbError, GameOutcome, GameRepository, GameStat, NewGameStat, NewUser, User};
pub use games::GameCategory;
pub use games::ludo;
pub use hub::{ConnectionHub, Outbound};
pub use lobby::{Lobby, LobbyMember, LobbyRegistry, generate_room_code, private_room_id};
pub use matchmaking::{MatchmakingQueue, QueueEntry};
pub use profile_service::{IdentityVerifier, OutcomeRecorder, ProfileService};
pub use protocol::{ClientMessage, ServerMessage};
pub use scheduler::{ManualScheduler, Scheduler, Timer, TokioScheduler};
pub use server::{AppState, router, serve};
pub use session::{
    ConnectionId, CreateSessionError, Identity, Participant, RoomId, SeatView, Session,
    SessionRegistry, SessionSnapshot,
};
