use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    handlers::auth::CurrentUser,
    services::spotify::{Playlist, PlaylistTrack},
    state::AppState,
};

pub const PAGE_SIZE: u32 = 20;

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
}

impl PageQuery {
    pub fn offset(&self) -> u32 {
        self.page * PAGE_SIZE
    }
}

#[derive(Serialize)]
pub struct PlaylistsResponse {
    pub playlists: Vec<Playlist>,
}

#[derive(Serialize)]
pub struct PlaylistTracksResponse {
    pub tracks: Vec<PlaylistTrack>,
}

/// One page (20) of the user's playlists.
pub async fn list_playlists(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PlaylistsResponse>> {
    let playlists = state
        .spotify
        .playlists(&user, PAGE_SIZE, query.offset())
        .await?;

    Ok(Json(PlaylistsResponse { playlists }))
}

/// One page of a playlist's tracks, most recently added first.
pub async fn playlist_tracks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(playlist_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PlaylistTracksResponse>> {
    let mut tracks = state
        .spotify
        .playlist_tracks(&user, &playlist_id, PAGE_SIZE, query.offset())
        .await?;

    tracks.sort_by(|a, b| b.added_at.cmp(&a.added_at));

    Ok(Json(PlaylistTracksResponse { tracks }))
}
