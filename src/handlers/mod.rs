pub mod auth;
pub mod health;
pub mod playlists;
pub mod top;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Auth flow
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/me", get(auth::me))

        // Playlist endpoints
        .route("/playlists", get(playlists::list_playlists))
        .route("/playlists/:id/tracks", get(playlists::playlist_tracks))

        // Top stats endpoints
        .route("/top/tracks", get(top::top_tracks))
        .route("/top/artists", get(top::top_artists))
}
