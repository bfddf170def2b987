use std::cmp::Reverse;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    handlers::auth::CurrentUser,
    handlers::playlists::PAGE_SIZE,
    services::spotify::{Artist, TimeRange, Track},
    state::AppState,
};

#[derive(Deserialize)]
pub struct TopQuery {
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default)]
    pub page: u32,
}

#[derive(Serialize)]
pub struct TopTracksResponse {
    pub tracks: Vec<Track>,
}

#[derive(Serialize)]
pub struct TopArtistsResponse {
    pub artists: Vec<Artist>,
}

/// One page of the user's top tracks for a time range, most popular first.
pub async fn top_tracks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TopQuery>,
) -> Result<Json<TopTracksResponse>> {
    let mut tracks = state
        .spotify
        .top_tracks(&user, query.time_range, PAGE_SIZE, query.page * PAGE_SIZE)
        .await?;

    tracks.sort_by_key(|t| Reverse(t.popularity.unwrap_or(0)));

    Ok(Json(TopTracksResponse { tracks }))
}

/// One page of the user's top artists for a time range, most popular first.
pub async fn top_artists(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TopQuery>,
) -> Result<Json<TopArtistsResponse>> {
    let mut artists = state
        .spotify
        .top_artists(&user, query.time_range, PAGE_SIZE, query.page * PAGE_SIZE)
        .await?;

    artists.sort_by_key(|a| Reverse(a.popularity.unwrap_or(0)));

    Ok(Json(TopArtistsResponse { artists }))
}
