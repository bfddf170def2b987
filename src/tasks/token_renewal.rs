//! Per-user background token renewal.
//!
//! Each user with a persisted token expiry gets one long-lived task that
//! sleeps until the expiry, refreshes, then re-enters the cycle with the new
//! expiry. Tasks are tracked in a registry so re-authentication replaces a
//! user's loop and shutdown can cancel them all cooperatively.

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::DatabaseConnection;
use tokio::sync::{watch, Mutex};

use crate::db::entities::user;
use crate::db::repositories::UserRepository;
use crate::services::spotify::SpotifyService;

pub struct RenewalRegistry {
    tasks: Mutex<HashMap<i32, watch::Sender<bool>>>,
}

impl Default for RenewalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RenewalRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start a renewal loop for the user, replacing (and cancelling) any
    /// existing loop for the same user id.
    pub async fn schedule(
        &self,
        db: DatabaseConnection,
        spotify: SpotifyService,
        user: user::Model,
    ) {
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let mut tasks = self.tasks.lock().await;
        if let Some(previous) = tasks.insert(user.id, cancel_tx) {
            // Dropping the old sender wakes the old loop's cancel branch.
            let _ = previous.send(true);
        }
        drop(tasks);

        tokio::spawn(renewal_loop(db, spotify, user, cancel_rx));
    }

    /// Cooperative cancellation of every renewal loop.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        for (user_id, cancel_tx) in tasks.drain() {
            tracing::debug!("Cancelling renewal task for user {}", user_id);
            let _ = cancel_tx.send(true);
        }
    }

    pub async fn active_count(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

async fn renewal_loop(
    db: DatabaseConnection,
    spotify: SpotifyService,
    mut user: user::Model,
    mut cancel: watch::Receiver<bool>,
) {
    let repo = UserRepository::new(db);

    loop {
        let Some(expires) = user.token_expires else {
            tracing::warn!(
                "User {} has no token expiry, stopping renewal",
                user.spotify_id
            );
            return;
        };

        // Negative remainders (already expired) refresh immediately.
        let remaining = (expires.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default();

        tracing::debug!(
            "Next token refresh for {} in {}s",
            user.spotify_id,
            remaining.as_secs()
        );

        tokio::select! {
            _ = cancel.changed() => {
                tracing::debug!("Renewal loop for {} cancelled", user.spotify_id);
                return;
            }
            _ = tokio::time::sleep(remaining) => {}
        }

        let grant = match spotify.refresh_grant(&user).await {
            Ok(grant) => grant,
            Err(e) => {
                // Deliberately not rescheduled: renewal for this user resumes
                // only after a manual re-login.
                tracing::error!(
                    "Token refresh for {} failed, abandoning renewal until re-auth: {}",
                    user.spotify_id,
                    e
                );
                return;
            }
        };

        user = match repo.apply_refresh(user, &grant).await {
            Ok(updated) => {
                tracing::info!("Refreshed token for {}", updated.spotify_id);
                updated
            }
            Err(e) => {
                tracing::error!("Failed to persist refreshed token: {}", e);
                return;
            }
        };
    }
}
