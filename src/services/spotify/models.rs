//! Upstream response shapes and the flat value objects served to clients.
//!
//! The raw structs mirror the Spotify payloads with every optional field
//! modeled as `Option`, so missing keys fail at the serde boundary instead of
//! deep inside a handler. The mapping functions flatten them into the value
//! objects; nothing in this module performs I/O.

use serde::{Deserialize, Serialize};

/// Deserialize null or missing as empty vec
pub(crate) fn deserialize_null_as_empty_vec<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Raw upstream shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawImage {
    pub url: String,
    pub height: Option<i32>,
    pub width: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub uri: Option<String>,
    pub product: Option<String>,
    #[serde(default)]
    pub followers: Option<RawFollowers>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawFollowers {
    pub total: Option<i32>,
}

/// Generic `limit`/`offset` page envelope shared by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next: Option<String>,
    pub total: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylist {
    pub id: String,
    pub name: String,
    pub collaborative: bool,
    pub description: Option<String>,
    pub owner: RawPlaylistOwner,
    pub public: Option<bool>,
    pub snapshot_id: String,
    pub tracks: RawPlaylistTracksRef,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylistOwner {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylistTracksRef {
    pub total: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaylistTrack {
    pub track: Option<RawTrack>,
    pub added_at: Option<String>,
    pub added_by: Option<RawAddedBy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAddedBy {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTrack {
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
    pub duration_ms: i32,
    #[serde(default)]
    pub popularity: Option<i32>,
    #[serde(default)]
    pub explicit: bool,
    pub preview_url: Option<String>,
    pub album: RawAlbum,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub artists: Vec<RawArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAlbum {
    pub id: String,
    pub uri: String,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub artists: Vec<RawArtist>,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub images: Vec<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtist {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
    pub images: Vec<RawImage>,
    #[serde(default)]
    pub popularity: Option<i32>,
    #[serde(default)]
    pub followers: Option<RawFollowers>,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Value objects (never persisted)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub collaborative: bool,
    pub description: Option<String>,
    pub owner_id: String,
    pub owner_name: Option<String>,
    pub public: Option<bool>,
    pub snapshot_id: String,
    pub track_count: i32,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub image: Option<String>,
    pub popularity: Option<i32>,
    pub followers: Option<i32>,
    pub genres: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Album {
    pub id: String,
    pub uri: String,
    pub name: Option<String>,
    pub artists: Vec<Artist>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<Artist>,
    pub album: Album,
    pub duration_ms: i32,
    pub popularity: Option<i32>,
    pub explicit: bool,
    pub uri: String,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistTrack {
    #[serde(flatten)]
    pub track: Track,
    pub added_at: Option<String>,
    pub added_by: Option<String>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// First image URL, or `None` when upstream sent no images at all.
fn first_image(images: &[RawImage]) -> Option<String> {
    images.first().map(|i| i.url.clone())
}

pub fn map_playlist(raw: RawPlaylist) -> Playlist {
    Playlist {
        image: first_image(&raw.images),
        id: raw.id,
        name: raw.name,
        collaborative: raw.collaborative,
        description: raw.description,
        owner_id: raw.owner.id,
        owner_name: raw.owner.display_name,
        public: raw.public,
        snapshot_id: raw.snapshot_id,
        track_count: raw.tracks.total,
    }
}

pub fn map_artist(raw: RawArtist) -> Artist {
    Artist {
        image: first_image(&raw.images),
        id: raw.id,
        name: raw.name,
        uri: raw.uri,
        popularity: raw.popularity,
        followers: raw.followers.and_then(|f| f.total),
        genres: raw.genres,
    }
}

pub fn map_album(raw: RawAlbum) -> Album {
    Album {
        image: first_image(&raw.images),
        id: raw.id,
        uri: raw.uri,
        name: raw.name,
        artists: raw.artists.into_iter().map(map_artist).collect(),
    }
}

pub fn map_track(raw: RawTrack) -> Track {
    Track {
        id: raw.id,
        name: raw.name,
        artists: raw.artists.into_iter().map(map_artist).collect(),
        album: map_album(raw.album),
        duration_ms: raw.duration_ms,
        popularity: raw.popularity,
        explicit: raw.explicit,
        uri: raw.uri,
        preview_url: raw.preview_url,
    }
}

/// A playlist entry with a null `track` (removed/local content) maps to `None`.
pub fn map_playlist_track(raw: RawPlaylistTrack) -> Option<PlaylistTrack> {
    let track = raw.track.map(map_track)?;
    Some(PlaylistTrack {
        track,
        added_at: raw.added_at,
        added_by: raw.added_by.and_then(|a| a.id),
    })
}
