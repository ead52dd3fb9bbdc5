//! Per-user passive award loop
//!
//! One loop runs as its own tokio task. Every tick it re-checks that the user
//! still exists, draws a point value and hands it to the store. Nothing that
//! happens inside a tick ends the loop; only the stop signal does.

use super::points::PointRange;
use crate::leaderboard::PointStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// Points were added; `total` is the balance after the award
    Awarded { points: i64, total: i64 },
    /// The store no longer knows the user; nothing was awarded
    SkippedMissingUser,
    /// The store failed; the award for this tick is lost
    Failed { error: String },
}

/// Published once per tick on the award event channel
#[derive(Debug, Clone, Serialize)]
pub struct AwardEvent {
    pub username: String,
    #[serde(flatten)]
    pub outcome: TickOutcome,
    pub timestamp: String,
}

pub(crate) struct AwardLoop {
    username: String,
    store: Arc<dyn PointStore>,
    range: PointRange,
    interval: Duration,
    events: broadcast::Sender<AwardEvent>,
    rng: StdRng,
}

impl AwardLoop {
    pub(crate) fn new(
        username: String,
        store: Arc<dyn PointStore>,
        range: PointRange,
        interval: Duration,
        events: broadcast::Sender<AwardEvent>,
    ) -> Self {
        AwardLoop {
            username,
            store,
            range,
            interval,
            events,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Run until `stop` fires or its sender is dropped.
    ///
    /// The first tick lands one full interval after start. Ticks run inline,
    /// so a slow store call delays the loop and missed periods are skipped
    /// rather than stacked up.
    pub(crate) async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {}
            }

            let outcome = self.tick().await;
            self.publish(outcome);
        }

        tracing::debug!("Award loop for {} exited", self.username);
    }

    async fn tick(&mut self) -> TickOutcome {
        match self.store.user_exists(&self.username).await {
            Ok(true) => {}
            Ok(false) => return TickOutcome::SkippedMissingUser,
            Err(e) => {
                return TickOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }

        let points = self.range.draw(&mut self.rng);
        match self.store.add_points(&self.username, points).await {
            Ok(entry) => TickOutcome::Awarded {
                points,
                total: entry.points,
            },
            Err(e) => TickOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    fn publish(&self, outcome: TickOutcome) {
        match &outcome {
            TickOutcome::Awarded { points, total } => {
                tracing::info!("+{} passive points to {} (total {})", points, self.username, total)
            }
            TickOutcome::SkippedMissingUser => {
                tracing::warn!("Skipping passive points: user {} not found", self.username)
            }
            TickOutcome::Failed { error } => {
                tracing::error!("Failed to award passive points to {}: {}", self.username, error)
            }
        }

        // No subscribers is fine
        let _ = self.events.send(AwardEvent {
            username: self.username.clone(),
            outcome,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }
}
