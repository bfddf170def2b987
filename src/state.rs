use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::services::{SessionSigner, SpotifyService};
use crate::tasks::RenewalRegistry;

/// OAuth state nonces pending a callback, with a 10 minute TTL.
const LOGIN_STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Default)]
pub struct LoginStates {
    pending: Mutex<HashMap<String, Instant>>,
}

impl LoginStates {
    pub async fn issue(&self, state: String) {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, issued| issued.elapsed() < LOGIN_STATE_TTL);
        pending.insert(state, Instant::now());
    }

    /// Single-use: a state validates at most once.
    pub async fn consume(&self, state: &str) -> bool {
        let mut pending = self.pending.lock().await;
        match pending.remove(state) {
            Some(issued) => issued.elapsed() < LOGIN_STATE_TTL,
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub spotify: SpotifyService,
    pub signer: SessionSigner,
    pub renewals: Arc<RenewalRegistry>,
    pub login_states: Arc<LoginStates>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, spotify: SpotifyService) -> Self {
        let signer = SessionSigner::new(config.session_secret.clone());
        Self {
            db,
            config: Arc::new(config),
            spotify,
            signer,
            renewals: Arc::new(RenewalRegistry::new()),
            login_states: Arc::new(LoginStates::default()),
        }
    }
}
