use axum::{
    async_trait,
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts},
    response::{IntoResponse, Redirect},
    Json,
};
use serde::Deserialize;

use crate::{
    db::entities::user,
    db::repositories::UserRepository,
    error::Result,
    services::session::SESSION_COOKIE,
    state::AppState,
};

/// Session-authenticated user, resolved from the signed cookie. Extraction
/// failure redirects to the login flow instead of erroring.
pub struct CurrentUser(pub user::Model);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let to_login = || Redirect::to("/login");

        let cookie_value = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_cookie_value)
            .ok_or_else(to_login)?;

        let key = state.signer.verify(&cookie_value).ok_or_else(to_login)?;

        let user = UserRepository::new(state.db.clone())
            .find_by_key(&key)
            .await
            .map_err(|_| to_login())?;

        user.map(CurrentUser).ok_or_else(to_login)
    }
}

fn session_cookie_value(header: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: String,
    pub error: Option<String>,
}

/// Start the authorization-code flow: issue a single-use state nonce and
/// redirect the browser to Spotify.
pub async fn login(State(state): State<AppState>) -> impl IntoResponse {
    let nonce = uuid::Uuid::new_v4().to_string();
    state.login_states.issue(nonce.clone()).await;
    Redirect::to(&state.spotify.authorize_url(&nonce))
}

pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackQuery>,
) -> Result<axum::response::Response> {
    if !state.login_states.consume(&params.state).await {
        tracing::warn!("Callback with unknown or expired state");
        return Ok(Redirect::to("/login").into_response());
    }

    let code = match (params.error, params.code) {
        (Some(error), _) => {
            tracing::warn!("Authorization denied by upstream: {}", error);
            return Ok(Redirect::to("/login").into_response());
        }
        (None, Some(code)) => code,
        (None, None) => return Ok(Redirect::to("/login").into_response()),
    };

    // Exchange first; nothing is persisted when upstream rejects the code.
    let (profile, grant) = state.spotify.exchange_code(&code).await?;

    let user = UserRepository::new(state.db.clone())
        .get_or_create(&profile, &grant)
        .await?;

    tracing::info!("User {} logged in", user.spotify_id);

    state
        .renewals
        .schedule(state.db.clone(), state.spotify.clone(), user.clone())
        .await;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE,
        state.signer.sign(&user.key)
    );

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    ([(header::SET_COOKIE, cookie)], Redirect::to("/"))
}

/// The logged-in user's stored profile. Token columns are skipped by the
/// entity's serde attributes.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<user::Model> {
    Json(user)
}
