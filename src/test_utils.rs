//! Test utilities for UnWrapped
//!
//! Provides helpers for creating isolated test environments with:
//! - In-memory SQLite databases (one per test)
//! - AppState factories pointed at mock upstream hosts
//! - Test user generators

use chrono::{Duration, Utc};
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};

use crate::{
    config::Config,
    db::entities::user,
    services::SpotifyService,
    state::AppState,
};

/// Setup an in-memory SQLite database with all migrations applied
///
/// Each call creates a fresh, isolated database perfect for parallel testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    // Run all migrations
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// A Config that never reads the environment
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        spotify_client_id: "test-client-id".to_string(),
        spotify_client_secret: "test-client-secret".to_string(),
        spotify_redirect_uri: "http://localhost:3000/callback".to_string(),
        session_secret: "test-session-secret".to_string(),
        upstream_concurrency: 10,
        upstream_max_retries: 5,
    }
}

/// AppState over a fresh in-memory database, with the Spotify service pointed
/// at the given mock hosts (usually two routes on one wiremock server)
pub async fn setup_test_app_state(accounts_base: &str, api_base: &str) -> AppState {
    setup_test_app_state_with(test_config(), accounts_base, api_base).await
}

pub async fn setup_test_app_state_with(
    config: Config,
    accounts_base: &str,
    api_base: &str,
) -> AppState {
    let db = setup_test_db().await;
    let spotify = SpotifyService::with_base_urls(&config, accounts_base, api_base);
    AppState::new(db, config, spotify)
}

/// Insert a user with valid-looking tokens expiring `expires_in` seconds from
/// now
pub async fn create_test_user(
    db: &DatabaseConnection,
    spotify_id: &str,
    expires_in: i64,
) -> user::Model {
    let now = Utc::now();
    let user = user::ActiveModel {
        key: Set(format!("key-{}", spotify_id)),
        spotify_id: Set(spotify_id.to_string()),
        display_name: Set(Some(format!("Test {}", spotify_id))),
        email: Set(Some(format!("{}@example.com", spotify_id))),
        country: Set(Some("DE".to_string())),
        uri: Set(Some(format!("spotify:user:{}", spotify_id))),
        image: Set(None),
        product: Set(Some("premium".to_string())),
        follower_count: Set(0),
        access_token: Set(Some(format!("access-{}", spotify_id))),
        refresh_token: Set(Some(format!("refresh-{}", spotify_id))),
        token_expires: Set(Some((now + Duration::seconds(expires_in)).into())),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    user.insert(db).await.expect("Failed to insert test user")
}
