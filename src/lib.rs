//! Brain Gym - leaderboard service with passive point-award sessions
//!
//! This crate provides:
//! - A session manager that runs at most one passive award loop per user
//! - SQLite storage for the leaderboard
//! - HTTP API for players and admins, with a live award event stream
//!
//! # Usage
//!
//! As a library:
//! ```ignore
//! use braingym::{Config, Core};
//!
//! let core = Core::new(Config::default())?;
//! core.sessions().start("alice").await?;
//! // ...
//! core.shutdown().await;
//! ```
//!
//! As a standalone server (CLI):
//! ```text
//! braingym --config ~/.braingym/config.toml
//! ```

pub mod api;
pub mod awards;
pub mod config;
pub mod db;
pub mod error;
pub mod exercises;
pub mod leaderboard;

// Re-export main types for convenience
pub use awards::{AwardEvent, SessionManager, TickOutcome};
pub use config::Config;
pub use db::Database;
pub use error::{CoreError, Result, SessionError};
pub use leaderboard::{Leaderboard, LeaderboardEntry, PointStore};

use awards::PointRange;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Composition root: owns the database, the leaderboard and the session registry
pub struct Core {
    /// Configuration
    pub config: Config,

    /// Database connection
    pub db: Arc<Database>,

    leaderboard: Leaderboard,

    sessions: Arc<SessionManager>,

    /// Broadcast channel for award events (from award loops to SSE clients)
    event_tx: broadcast::Sender<AwardEvent>,
}

impl Core {
    /// Create a new Core instance with the given configuration
    pub fn new(config: Config) -> Result<Self> {
        let db_path = config.data_dir().join("braingym.db");
        let db = Database::new(db_path)?;
        Self::with_database(config, Arc::new(db))
    }

    /// Create a Core instance with an existing database
    pub fn with_database(config: Config, db: Arc<Database>) -> Result<Self> {
        let (event_tx, _) = broadcast::channel(256);
        let leaderboard = Leaderboard::new(db.clone());
        let sessions = SessionManager::new(
            Arc::new(leaderboard.clone()),
            &config.awards,
            event_tx.clone(),
        )?;

        Ok(Core {
            config,
            db,
            leaderboard,
            sessions: Arc::new(sessions),
            event_tx,
        })
    }

    /// Start the HTTP API server. Returns once SIGINT/SIGTERM arrives and
    /// every award session has been stopped.
    pub async fn start_api_server(&self) -> Result<()> {
        let addr = self.config.server_addr();
        tracing::info!("Starting API server on {}", addr);

        let state = api::AppState::new(
            self.leaderboard.clone(),
            self.sessions.clone(),
            self.event_tx.clone(),
            PointRange::from_config(&self.config.awards)?,
            self.config.server.api_key.clone(),
        );
        api::serve(addr, state, api::shutdown_signal()).await
    }

    /// Stop every passive award loop
    pub async fn shutdown(&self) {
        tracing::info!("Stopping all auto-point sessions");
        self.sessions.stop_all().await;
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Get the event sender for broadcasting award events
    pub fn event_sender(&self) -> broadcast::Sender<AwardEvent> {
        self.event_tx.clone()
    }
}
