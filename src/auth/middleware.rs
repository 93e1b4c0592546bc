//! Authentication middleware
//!
//! Protects routes that require authentication, and routes that
//! additionally require a role.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::session::{SESSION_COOKIE, verify_session_token};
use crate::AppState;
use crate::data::Role;
use crate::error::AppError;
use crate::metrics::record_auth_event;

/// An authenticated caller, as decoded from a valid session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub user_id: String,
}

/// Bearer header first, then the session cookie
pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned())
                .filter(|token| !token.is_empty())
        })
}

/// Verify `token` and turn it into a subject
pub fn authenticate_token(token: &str, state: &AppState) -> Result<Subject, AppError> {
    match verify_session_token(token, &state.config.auth.jwt_secret) {
        Ok(claims) => Ok(Subject { user_id: claims.id }),
        Err(error) => {
            record_auth_event("token_invalid");
            tracing::debug!(%error, "Rejected session token");
            Err(error.into())
        }
    }
}

/// Resolve the subject for a request, reusing one a previous layer stored
fn subject_from_parts(
    headers: &HeaderMap,
    extensions: &axum::http::Extensions,
    state: &AppState,
) -> Result<Subject, AppError> {
    if let Some(subject) = extensions.get::<Subject>() {
        return Ok(subject.clone());
    }

    let Some(token) = extract_token_from_headers(headers) else {
        record_auth_event("token_missing");
        return Err(AppError::Unauthorized);
    };
    authenticate_token(&token, state)
}

/// Middleware to require authentication
///
/// Extracts and verifies the session token from the Authorization header
/// or the `token` cookie. Adds [`Subject`] to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/create", post(create_publication))
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let subject = subject_from_parts(request.headers(), request.extensions(), &state)?;
    request.extensions_mut().insert(subject);

    Ok(next.run(request).await)
}

/// State for [`require_role`]: which role the wrapped routes demand
#[derive(Clone)]
pub struct RoleGuard {
    state: AppState,
    required: Role,
}

impl RoleGuard {
    pub fn new(state: AppState, required: Role) -> Self {
        Self { state, required }
    }
}

/// Middleware to require authentication plus a stored role
///
/// Loads the caller's current user record on every request, so role
/// changes apply to the very next request.
///
/// - no token: 401
/// - invalid or expired token: 401
/// - user missing, or role differs: 403
/// - storage failure: 500
///
/// # Usage
/// ```ignore
/// let admin_routes = Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn_with_state(
///         RoleGuard::new(state, Role::Admin),
///         require_role,
///     ));
/// ```
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let subject = subject_from_parts(request.headers(), request.extensions(), &guard.state)?;

    let user = guard.state.db.get_user(&subject.user_id).await?;
    match user {
        Some(user) if user.has_role(guard.required) => {
            request.extensions_mut().insert(subject);
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        _ => {
            record_auth_event("forbidden");
            tracing::info!(
                user_id = %subject.user_id,
                required = guard.required.as_str(),
                "Role check failed"
            );
            Err(AppError::Forbidden)
        }
    }
}

/// Extractor for the current authenticated caller
///
/// Use in handlers to get the subject.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(subject): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", subject.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Subject);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let subject = subject_from_parts(&parts.headers, &parts.extensions, &state)?;
        parts.extensions.insert(subject.clone());

        Ok(CurrentUser(subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer header-token"));
        headers.insert("Cookie", HeaderValue::from_static("token=cookie-token"));

        assert_eq!(
            extract_token_from_headers(&headers).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn cookie_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_static("theme=dark; token=cookie-token"),
        );

        assert_eq!(
            extract_token_from_headers(&headers).as_deref(),
            Some("cookie-token")
        );
    }

    #[test]
    fn missing_or_empty_token_yields_none() {
        assert!(extract_token_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        headers.insert("Cookie", HeaderValue::from_static("token="));
        assert!(extract_token_from_headers(&headers).is_none());
    }

    #[test]
    fn non_bearer_scheme_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(extract_token_from_headers(&headers).is_none());
    }
}
