//! Passive point-award sessions
//!
//! [`SessionManager`] owns the registry of running award loops, at most one
//! per normalized username. All registry mutations go through one async
//! mutex, and `start` holds it across the existence check so two concurrent
//! starts for the same user cannot both succeed.
//!
//! Dropping the manager drops every stop sender, which ends the loops at
//! their next select.

mod award_loop;
pub mod points;

pub use award_loop::{AwardEvent, TickOutcome};
pub use points::PointRange;

use crate::config::AwardConfig;
use crate::error::{Result, SessionError};
use crate::leaderboard::{normalize_username, PointStore};
use award_loop::AwardLoop;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;

/// A running award loop
struct Session {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Session {
    /// Signal the loop and hand back its task so the caller can await it
    /// outside the registry lock.
    fn signal(self) -> JoinHandle<()> {
        // Err only means the loop already exited
        let _ = self.stop.send(());
        self.task
    }
}

pub struct SessionManager {
    store: Arc<dyn PointStore>,
    range: PointRange,
    interval: Duration,
    events: broadcast::Sender<AwardEvent>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn PointStore>,
        config: &AwardConfig,
        events: broadcast::Sender<AwardEvent>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(SessionManager {
            store,
            range: PointRange::from_config(config)?,
            interval: config.interval(),
            events,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Subscribe to per-tick award events
    pub fn subscribe(&self) -> broadcast::Receiver<AwardEvent> {
        self.events.subscribe()
    }

    /// Start the passive award loop for `username`.
    ///
    /// Fails with `AlreadyRunning` if a loop exists (the existing one is left
    /// alone), `UserNotFound` if the store does not know the user.
    pub async fn start(&self, username: &str) -> std::result::Result<(), SessionError> {
        let username = normalize_username(username).ok_or(SessionError::InvalidUsername)?;

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&username) {
            return Err(SessionError::AlreadyRunning(username));
        }

        if !self.store.user_exists(&username).await? {
            return Err(SessionError::UserNotFound(username));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let award_loop = AwardLoop::new(
            username.clone(),
            self.store.clone(),
            self.range,
            self.interval,
            self.events.clone(),
        );
        let task = tokio::spawn(award_loop.run(stop_rx));

        sessions.insert(
            username.clone(),
            Session {
                stop: stop_tx,
                task,
            },
        );

        tracing::info!(
            "Auto-point session started for {} (every {:?}, {}-{} points)",
            username,
            self.interval,
            self.range.min(),
            self.range.max()
        );
        Ok(())
    }

    /// Stop the loop for `username`. No-op if none is running.
    ///
    /// Returns once the loop task has exited, so no tick fires afterwards.
    /// A tick already in flight is allowed to finish.
    pub async fn stop(&self, username: &str) {
        let Some(username) = normalize_username(username) else {
            return;
        };

        let task = {
            let mut sessions = self.sessions.lock().await;
            match sessions.remove(&username) {
                Some(session) => session.signal(),
                None => return,
            }
        };

        if let Err(e) = task.await {
            tracing::warn!("Award loop for {} ended abnormally: {}", username, e);
        }
        tracing::info!("Auto-point session stopped for {}", username);
    }

    /// Stop every loop. Used on shutdown; never fails.
    pub async fn stop_all(&self) {
        let tasks: Vec<(String, JoinHandle<()>)> = {
            let mut sessions = self.sessions.lock().await;
            sessions
                .drain()
                .map(|(username, session)| (username, session.signal()))
                .collect()
        };

        let count = tasks.len();
        for (username, task) in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Award loop for {} ended abnormally: {}", username, e);
            }
        }

        if count > 0 {
            tracing::info!("Stopped {} auto-point sessions", count);
        }
    }

    pub async fn is_running(&self, username: &str) -> bool {
        match normalize_username(username) {
            Some(username) => self.sessions.lock().await.contains_key(&username),
            None => false,
        }
    }

    /// Usernames with a running loop, sorted
    pub async fn active_sessions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}
