use anyhow::Result;

use crate::db::repositories::UserRepository;
use crate::state::AppState;

pub mod token_renewal;

pub use token_renewal::RenewalRegistry;

/// Spawn one renewal loop per persisted user with a token expiry. Called once
/// at startup.
pub async fn start_renewals(state: &AppState) -> Result<usize> {
    let repo = UserRepository::new(state.db.clone());
    let users = repo.all_with_token_expiry().await?;
    let count = users.len();

    for user in users {
        state
            .renewals
            .schedule(state.db.clone(), state.spotify.clone(), user)
            .await;
    }

    Ok(count)
}
