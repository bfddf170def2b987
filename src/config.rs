use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_redirect_uri: String,
    pub session_secret: String,
    pub upstream_concurrency: usize,
    pub upstream_max_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            spotify_client_id: env::var("SPOTIFY_CLIENT_ID")
                .context("SPOTIFY_CLIENT_ID must be set")?,
            spotify_client_secret: env::var("SPOTIFY_CLIENT_SECRET")
                .context("SPOTIFY_CLIENT_SECRET must be set")?,
            spotify_redirect_uri: env::var("SPOTIFY_REDIRECT_URI")
                .context("SPOTIFY_REDIRECT_URI must be set")?,
            session_secret: env::var("SESSION_SECRET")
                .context("SESSION_SECRET must be set")?,
            upstream_concurrency: env::var("UPSTREAM_CONCURRENCY")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("UPSTREAM_CONCURRENCY must be a positive integer")?,
            upstream_max_retries: env::var("UPSTREAM_MAX_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("UPSTREAM_MAX_RETRIES must be a positive integer")?,
        })
    }
}
