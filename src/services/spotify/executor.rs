//! Rate-limited request executor for all upstream Spotify calls.
//!
//! Every outbound request funnels through [`RequestExecutor::execute`], which
//! enforces three things:
//!
//! - a global concurrency cap shared by all users (one process, one upstream
//!   budget), held only for the duration of each HTTP call;
//! - an exclusive per-user lock held across a whole attempt/backoff sequence,
//!   so retries for a rate-limited user never race each other while other
//!   users proceed independently;
//! - bounded 429 handling driven by the upstream `Retry-After` header, with a
//!   pre-emptive quiet period when the last response for that user was a 429.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header::RETRY_AFTER, Client, Method, StatusCode};
use tokio::sync::{Mutex, Semaphore};

use crate::error::{AppError, Result};

const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// A single upstream request. Built by the service layer, consumed by
/// [`RequestExecutor::execute`].
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    /// Stable user identity for per-user serialization. `None` for
    /// pre-authentication calls such as the code exchange.
    pub user: Option<String>,
    pub query: Vec<(String, String)>,
    /// Form-encoded body, used by the token grants.
    pub form: Option<Vec<(String, String)>>,
    /// Full `Authorization` header value (`Bearer ..` or `Basic ..`).
    pub authorization: Option<String>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            user: None,
            query: Vec::new(),
            form: None,
            authorization: None,
        }
    }

    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = Some(form);
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {}", token));
        self
    }

    pub fn basic(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }
}

/// Owns the shared mutable state of the upstream access layer: the global
/// permit set, the lazily-populated per-user lock table, and the per-user
/// recorded `Retry-After` values.
pub struct RequestExecutor {
    client: Client,
    permits: Semaphore,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    retry_after: Mutex<HashMap<String, u64>>,
    max_attempts: u32,
}

impl RequestExecutor {
    pub fn new(concurrency: usize, max_attempts: u32) -> Self {
        Self {
            client: Client::new(),
            permits: Semaphore::new(concurrency.max(1)),
            user_locks: Mutex::new(HashMap::new()),
            retry_after: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Issue a request, serializing per user and retrying on 429 up to the
    /// configured attempt budget. Returns the parsed JSON body on success.
    pub async fn execute(&self, request: UpstreamRequest) -> Result<serde_json::Value> {
        match request.user.clone() {
            Some(user) => {
                let lock = self.user_lock(&user).await;
                let _guard = lock.lock().await;
                self.execute_with_backoff(&request, Some(&user)).await
            }
            None => self.execute_with_backoff(&request, None).await,
        }
    }

    async fn execute_with_backoff(
        &self,
        request: &UpstreamRequest,
        user: Option<&str>,
    ) -> Result<serde_json::Value> {
        // Honor the last known limit before issuing anything new.
        if let Some(user) = user {
            let quiet = self.recorded_retry_after(user).await;
            if quiet > 0 {
                tracing::debug!("Pre-emptive {}s quiet period for user {}", quiet, user);
                tokio::time::sleep(Duration::from_secs(quiet)).await;
            }
        }

        for attempt in 1..=self.max_attempts {
            let response = {
                // Permit covers only the in-flight call; backoff sleeps must
                // not pin a slot of the global budget.
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| AppError::Internal("Upstream permit pool closed".into()))?;
                self.send(request).await?
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after_seconds(&response);
                if let Some(user) = user {
                    self.record_retry_after(user, wait).await;
                }
                tracing::warn!(
                    "Upstream 429 on {} (attempt {}/{}), backing off {}s",
                    request.url,
                    attempt,
                    self.max_attempts,
                    wait
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            // Any non-429 response lifts the recorded limit.
            if let Some(user) = user {
                self.clear_retry_after(user).await;
            }

            let body = response.text().await?;
            if status.as_u16() >= 400 {
                return Err(AppError::Upstream { status, body });
            }

            return serde_json::from_str(&body).map_err(|_| AppError::UpstreamDecode { body });
        }

        Err(AppError::RateLimited {
            attempts: self.max_attempts,
        })
    }

    async fn send(&self, request: &UpstreamRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        if let Some(form) = &request.form {
            builder = builder.form(form);
        }
        if let Some(authorization) = &request.authorization {
            builder = builder.header("Authorization", authorization);
        }

        Ok(builder.send().await?)
    }

    async fn user_lock(&self, user: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Last recorded `Retry-After` for a user, in seconds. Zero when the most
    /// recent response was not a 429.
    pub async fn recorded_retry_after(&self, user: &str) -> u64 {
        self.retry_after
            .lock()
            .await
            .get(user)
            .copied()
            .unwrap_or(0)
    }

    async fn record_retry_after(&self, user: &str, seconds: u64) {
        self.retry_after
            .lock()
            .await
            .insert(user.to_string(), seconds);
    }

    async fn clear_retry_after(&self, user: &str) {
        self.retry_after.lock().await.insert(user.to_string(), 0);
    }
}

/// `Retry-After` in whole seconds, defaulting to 1 when absent or malformed.
fn retry_after_seconds(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
