use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

use crate::config::Config;
use crate::db::entities::user;
use crate::error::{AppError, Result};

pub mod executor;
pub mod models;

pub use executor::{RequestExecutor, UpstreamRequest};
pub use models::{
    Album, Artist, Page, Playlist, PlaylistTrack, RawArtist, RawPlaylist, RawPlaylistTrack,
    RawProfile, RawTrack, TokenGrant, Track,
};

const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Scopes requested at login.
const SCOPES: &[&str] = &[
    "user-top-read",
    "user-read-recently-played",
    "playlist-read-private",
    "user-read-email",
    "user-read-private",
];

/// Spotify Web API client: OAuth grants plus the paginated data endpoints.
/// All traffic goes through the shared [`RequestExecutor`].
#[derive(Clone)]
pub struct SpotifyService {
    executor: Arc<RequestExecutor>,
    client_id: String,
    redirect_uri: String,
    /// `Basic base64(client_id:client_secret)`, prebuilt once.
    auth_header: String,
    accounts_base: String,
    api_base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    #[default]
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }
}

impl SpotifyService {
    pub fn new(config: &Config) -> Self {
        Self::with_base_urls(config, SPOTIFY_ACCOUNTS_URL, SPOTIFY_API_BASE)
    }

    /// Point the service at alternate hosts. Production uses [`Self::new`];
    /// tests point this at a local mock server.
    pub fn with_base_urls(config: &Config, accounts_base: &str, api_base: &str) -> Self {
        let credentials = format!(
            "{}:{}",
            config.spotify_client_id, config.spotify_client_secret
        );
        Self {
            executor: Arc::new(RequestExecutor::new(
                config.upstream_concurrency,
                config.upstream_max_retries,
            )),
            client_id: config.spotify_client_id.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
            auth_header: format!(
                "Basic {}",
                general_purpose::STANDARD.encode(credentials.as_bytes())
            ),
            accounts_base: accounts_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Authorization URL for the login redirect.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.accounts_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            state
        )
    }

    /// Authorization-code grant followed by a profile fetch with the fresh
    /// bearer token. Persists nothing; an upstream error (e.g. the
    /// `invalid_grant` response) propagates before any user row is touched.
    pub async fn exchange_code(&self, code: &str) -> Result<(RawProfile, TokenGrant)> {
        let grant = self
            .token_request(vec![
                ("grant_type".to_string(), "authorization_code".to_string()),
                ("code".to_string(), code.to_string()),
                ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ])
            .await?;

        let profile = self.profile(&grant.access_token).await?;
        Ok((profile, grant))
    }

    /// Refresh-token grant for an existing user. The caller persists the
    /// resulting tokens.
    pub async fn refresh_grant(&self, user: &user::Model) -> Result<TokenGrant> {
        let refresh_token = user.refresh_token.as_deref().ok_or_else(|| {
            AppError::TokenRefresh(format!("User {} has no refresh token", user.spotify_id))
        })?;

        self.token_request(vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ])
        .await
        .map_err(|e| match e {
            AppError::Upstream { status, body } => {
                AppError::TokenRefresh(format!("upstream {}: {}", status, body))
            }
            other => other,
        })
    }

    async fn token_request(&self, form: Vec<(String, String)>) -> Result<TokenGrant> {
        let value = self
            .executor
            .execute(
                UpstreamRequest::post(format!("{}/api/token", self.accounts_base))
                    .basic(self.auth_header.clone())
                    .form(form),
            )
            .await?;

        Ok(serde_json::from_value(value)?)
    }

    pub async fn profile(&self, access_token: &str) -> Result<RawProfile> {
        let value = self
            .executor
            .execute(UpstreamRequest::get(format!("{}/me", self.api_base)).bearer(access_token))
            .await?;

        Ok(serde_json::from_value(value)?)
    }

    /// One page of the user's playlists.
    pub async fn playlists(
        &self,
        user: &user::Model,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Playlist>> {
        let value = self
            .executor
            .execute(
                self.user_get(user, format!("{}/me/playlists", self.api_base))?
                    .query("limit", limit.to_string())
                    .query("offset", offset.to_string()),
            )
            .await?;

        let page: Page<RawPlaylist> = serde_json::from_value(value)?;
        Ok(page.items.into_iter().map(models::map_playlist).collect())
    }

    /// One page of a playlist's tracks. Entries whose track payload is null
    /// (removed or local content) are dropped.
    pub async fn playlist_tracks(
        &self,
        user: &user::Model,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PlaylistTrack>> {
        let value = self
            .executor
            .execute(
                self.user_get(
                    user,
                    format!("{}/playlists/{}/tracks", self.api_base, playlist_id),
                )?
                .query("limit", limit.to_string())
                .query("offset", offset.to_string()),
            )
            .await?;

        let page: Page<RawPlaylistTrack> = serde_json::from_value(value)?;
        Ok(page
            .items
            .into_iter()
            .filter_map(models::map_playlist_track)
            .collect())
    }

    pub async fn top_tracks(
        &self,
        user: &user::Model,
        time_range: TimeRange,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Track>> {
        let value = self
            .executor
            .execute(
                self.user_get(user, format!("{}/me/top/tracks", self.api_base))?
                    .query("time_range", time_range.as_str())
                    .query("limit", limit.to_string())
                    .query("offset", offset.to_string()),
            )
            .await?;

        let page: Page<RawTrack> = serde_json::from_value(value)?;
        Ok(page.items.into_iter().map(models::map_track).collect())
    }

    pub async fn top_artists(
        &self,
        user: &user::Model,
        time_range: TimeRange,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Artist>> {
        let value = self
            .executor
            .execute(
                self.user_get(user, format!("{}/me/top/artists", self.api_base))?
                    .query("time_range", time_range.as_str())
                    .query("limit", limit.to_string())
                    .query("offset", offset.to_string()),
            )
            .await?;

        let page: Page<RawArtist> = serde_json::from_value(value)?;
        Ok(page.items.into_iter().map(models::map_artist).collect())
    }

    /// Bearer-authenticated GET keyed to the user's identity for per-user
    /// serialization in the executor.
    fn user_get(&self, user: &user::Model, url: String) -> Result<UpstreamRequest> {
        let access_token = user.access_token.as_deref().ok_or_else(|| {
            AppError::Authentication(format!("User {} has no access token", user.spotify_id))
        })?;

        Ok(UpstreamRequest::get(url)
            .bearer(access_token)
            .for_user(user.spotify_id.clone()))
    }
}
