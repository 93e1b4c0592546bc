//! Authentication routes
//!
//! Google sign-in plus the session introspection endpoints used by the
//! web client.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::google::GoogleClient;
use super::identity::{clear_session_cookie, exchange_identity, session_cookie};
use super::middleware::{authenticate_token, extract_token_from_headers};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::record_auth_event;

const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_PATH: &str = "/auth/google";
const OAUTH_STATE_TTL_SECONDS: i64 = 600;

/// Create authentication router
///
/// Routes:
/// - GET /auth/google - Redirect to Google
/// - GET /auth/google/callback - OAuth callback
/// - GET /auth/check - Is the caller signed in?
/// - GET /auth/logout - Clear the session cookie
/// - GET /auth/user - Profile of the signed-in user
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(google_redirect))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/check", get(check))
        .route("/auth/logout", get(logout))
        .route("/auth/user", get(current_user))
}

// =============================================================================
// Google OAuth
// =============================================================================

/// GET /auth/google
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to Google with client_id, redirect_uri, scope, state
async fn google_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let url = GoogleClient::new(&state.config.auth.google, &state.http_client)
        .authorize_url(&csrf_state)?;

    let cookie = oauth_state_cookie(csrf_state, state.config.should_use_secure_cookies())?;

    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

/// CSRF state cookie, scoped to the sign-in routes and valid for 10 minutes
fn oauth_state_cookie(value: String, secure: bool) -> Result<Cookie<'static>, AppError> {
    let mut raw = format!(
        "{OAUTH_STATE_COOKIE}={value}; Path={OAUTH_STATE_PATH}; HttpOnly; SameSite=Lax; Max-Age={OAUTH_STATE_TTL_SECONDS}"
    );
    if secure {
        raw.push_str("; Secure");
    }
    Cookie::parse(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid oauth state cookie: {e}")))
}

/// Query parameters from the Google callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /auth/google/callback
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for the caller's identity
/// 3. Resolve or create the local user
/// 4. Issue session token and set cookie
/// 5. Redirect to the client application
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(error) = &query.error {
        record_auth_event("provider_denied");
        tracing::info!(%error, "Identity provider returned an error");
        return Err(AppError::Unauthorized);
    }

    verify_csrf_state(query.state.as_deref(), &jar)?;
    let code = query.code.as_deref().ok_or(AppError::Unauthorized)?;

    let identity = GoogleClient::new(&state.config.auth.google, &state.http_client)
        .fetch_identity(code)
        .await?;
    let (user, token) =
        exchange_identity(&state.db, &identity, &state.config.auth.jwt_secret).await?;

    record_auth_event("login");
    tracing::info!(user_id = %user.id, "User signed in");

    let jar = jar
        .remove(Cookie::build(OAUTH_STATE_COOKIE).path(OAUTH_STATE_PATH))
        .add(session_cookie(
            &token,
            state.config.should_use_secure_cookies(),
        )?);

    Ok((jar, Redirect::to(&state.config.client.login_redirect)))
}

// =============================================================================
// Session introspection
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// GET /auth/check
///
/// Always answers with `authenticated`; never touches storage.
async fn check(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let unauthenticated = |error: AppError| {
        (
            StatusCode::UNAUTHORIZED,
            Json(CheckResponse {
                authenticated: false,
                user_id: None,
                token: None,
                message: Some(error.to_string()),
            }),
        )
            .into_response()
    };

    let Some(token) = extract_token_from_headers(&headers) else {
        return unauthenticated(AppError::MissingToken);
    };

    match authenticate_token(&token, &state) {
        Ok(subject) => Json(CheckResponse {
            authenticated: true,
            user_id: Some(subject.user_id),
            token: Some(token),
            message: None,
        })
        .into_response(),
        Err(error) => unauthenticated(error),
    }
}

/// GET /auth/logout
///
/// Always emits the removal cookie, even when no session was sent.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(clear_session_cookie()),
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

#[derive(Debug, Serialize)]
struct UserProfileResponse {
    name: String,
    email: String,
    picture: Option<String>,
}

/// GET /auth/user
///
/// The token may outlive its user; that case is a 404.
async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfileResponse>, AppError> {
    let token = extract_token_from_headers(&headers).ok_or(AppError::MissingToken)?;
    let subject = authenticate_token(&token, &state)?;

    let user = state
        .db
        .get_user(&subject.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(UserProfileResponse {
        name: user.name,
        email: user.email,
        picture: user.profile_picture,
    }))
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(query_state: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty());

    match (expected, query_state) {
        (Some(expected), Some(actual)) if expected == actual => Ok(()),
        _ => {
            record_auth_event("csrf_mismatch");
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::SameSite;

    #[test]
    fn csrf_states_are_unique() {
        let first = generate_csrf_state();
        let second = generate_csrf_state();
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
    }

    #[test]
    fn oauth_state_cookie_expires_after_ten_minutes() {
        let cookie = oauth_state_cookie("abc".to_string(), false).unwrap();
        assert_eq!(cookie.path(), Some(OAUTH_STATE_PATH));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(
            cookie.max_age().map(|age| age.whole_seconds()),
            Some(OAUTH_STATE_TTL_SECONDS)
        );
        assert_eq!(cookie.secure(), None);

        let secure = oauth_state_cookie("abc".to_string(), true).unwrap();
        assert_eq!(secure.secure(), Some(true));
    }

    #[test]
    fn csrf_state_must_match_cookie() {
        let jar = CookieJar::new().add(Cookie::new(OAUTH_STATE_COOKIE, "abc"));

        assert!(verify_csrf_state(Some("abc"), &jar).is_ok());
        assert!(verify_csrf_state(Some("abd"), &jar).is_err());
        assert!(verify_csrf_state(None, &jar).is_err());
        assert!(verify_csrf_state(Some("abc"), &CookieJar::new()).is_err());
    }
}
