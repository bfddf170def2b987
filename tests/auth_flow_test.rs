//! Integration tests for the OAuth flow: code exchange, user upsert, and the
//! session cookie round trip through the handlers.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use pretty_assertions::assert_eq;
use sea_orm::EntityTrait;
use serde_json::json;
use tower::util::ServiceExt;
use wiremock::matchers::{body_string_contains, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unwrapped::db::entities::user;
use unwrapped::db::repositories::UserRepository;
use unwrapped::error::AppError;
use unwrapped::handlers;
use unwrapped::services::spotify::{RawProfile, TokenGrant};
use unwrapped::state::AppState;
use unwrapped::test_utils::*;

fn create_test_router(state: &AppState) -> Router {
    Router::new()
        .merge(handlers::routes())
        .with_state(state.clone())
}

fn expected_basic_auth() -> String {
    format!(
        "Basic {}",
        general_purpose::STANDARD.encode("test-client-id:test-client-secret")
    )
}

fn grant_body(access_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-1",
        "scope": "user-top-read",
    })
}

fn profile_body() -> serde_json::Value {
    json!({
        "id": "spotify-user",
        "display_name": "Tester",
        "email": "tester@example.com",
        "country": "DE",
        "uri": "spotify:user:spotify-user",
        "product": "premium",
        "followers": { "total": 5 },
        "images": [],
    })
}

async fn mock_upstream(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header_matcher("Authorization", expected_basic_auth().as_str()))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body("access-1")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/me"))
        .and(header_matcher("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_exchange_code_fetches_profile_with_fresh_token() {
    let server = MockServer::start().await;
    mock_upstream(&server).await;

    let state = setup_test_app_state(&server.uri(), &format!("{}/v1", server.uri())).await;

    let (profile, grant) = state.spotify.exchange_code("auth-code").await.unwrap();

    assert_eq!(profile.id, "spotify-user");
    assert_eq!(grant.access_token, "access-1");
    assert_eq!(grant.expires_in, 3600);
}

#[tokio::test]
async fn test_get_or_create_is_idempotent_on_spotify_id() {
    let server = MockServer::start().await;
    let state = setup_test_app_state(&server.uri(), &format!("{}/v1", server.uri())).await;
    let repo = UserRepository::new(state.db.clone());

    let profile: RawProfile = serde_json::from_value(profile_body()).unwrap();
    let grant: TokenGrant = serde_json::from_value(grant_body("access-1")).unwrap();

    let first = repo.get_or_create(&profile, &grant).await.unwrap();
    // Empty upstream image list is stored as absent, not an error.
    assert_eq!(first.image, None);
    assert!(first.token_expires.is_some());

    let second_grant: TokenGrant = serde_json::from_value(grant_body("access-2")).unwrap();
    let second = repo.get_or_create(&profile, &second_grant).await.unwrap();

    // Same row updated in place: stable identity and session key unchanged.
    assert_eq!(second.id, first.id);
    assert_eq!(second.spotify_id, first.spotify_id);
    assert_eq!(second.key, first.key);
    assert_eq!(second.access_token, Some("access-2".to_string()));

    let all = user::Entity::find().all(&state.db).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_invalid_grant_persists_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .mount(&server)
        .await;

    let state = setup_test_app_state(&server.uri(), &format!("{}/v1", server.uri())).await;

    let err = state.spotify.exchange_code("bad-code").await.unwrap_err();
    match err {
        AppError::Upstream { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected Upstream error, got {:?}", other),
    }

    let all = user::Entity::find().all(&state.db).await.unwrap();
    assert_eq!(all.len(), 0);
}

#[tokio::test]
async fn test_callback_sets_session_cookie_and_me_round_trips() {
    let server = MockServer::start().await;
    mock_upstream(&server).await;

    let state = setup_test_app_state(&server.uri(), &format!("{}/v1", server.uri())).await;
    state.login_states.issue("state-1".to_string()).await;

    let app = create_test_router(&state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/callback?code=auth-code&state=state-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("callback must set the session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let profile: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(profile["spotify_id"], "spotify-user");
    // Token columns never leave the process.
    assert!(profile.get("access_token").is_none());
    assert!(profile.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_callback_rejects_unknown_state() {
    let server = MockServer::start().await;
    let state = setup_test_app_state(&server.uri(), &format!("{}/v1", server.uri())).await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?code=auth-code&state=forged")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
}

#[tokio::test]
async fn test_me_without_session_redirects_to_login() {
    let server = MockServer::start().await;
    let state = setup_test_app_state(&server.uri(), &format!("{}/v1", server.uri())).await;
    let app = create_test_router(&state);

    let response = app
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
}
