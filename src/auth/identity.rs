//! Identity exchange
//!
//! Turns a verified external identity into a local user and a session.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;

use super::session::{SESSION_COOKIE, SESSION_TTL_SECONDS, create_session_token};
use crate::data::{Database, EntityId, ExternalIdentity, Role, User};
use crate::error::AppError;
use crate::metrics::USERS_CREATED_TOTAL;

/// Find the local user for `identity`, creating it on first sign-in.
///
/// New users get the default role. A returning user's profile picture is
/// refreshed when the provider reports a different one; nothing else about
/// an existing user changes.
pub async fn resolve_user(db: &Database, identity: &ExternalIdentity) -> Result<User, AppError> {
    if let Some(mut user) = db.get_user_by_google_id(&identity.id).await? {
        if identity.picture.is_some() && user.profile_picture != identity.picture {
            db.update_user_picture(&user.id, identity.picture.as_deref())
                .await?;
            user.profile_picture = identity.picture.clone();
        }
        return Ok(user);
    }

    let now = Utc::now();
    let candidate = User {
        id: EntityId::new().0,
        google_id: identity.id.clone(),
        name: identity.name.clone(),
        email: identity.email.clone(),
        profile_picture: identity.picture.clone(),
        role: Role::default().as_str().to_string(),
        created_at: now,
        updated_at: now,
    };

    if db.insert_user_if_absent(&candidate).await? {
        USERS_CREATED_TOTAL.inc();
        tracing::info!(user_id = %candidate.id, email = %candidate.email, "Created user");
        return Ok(candidate);
    }

    // Lost a race with a concurrent first sign-in for the same identity
    db.get_user_by_google_id(&identity.id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished after insert conflict")))
}

/// Resolve the user and issue a session token for it
pub async fn exchange_identity(
    db: &Database,
    identity: &ExternalIdentity,
    secret: &str,
) -> Result<(User, String), AppError> {
    let user = resolve_user(db, identity).await?;
    let token = create_session_token(&user.id, secret)?;
    Ok((user, token))
}

/// Session cookie: HTTP-only, SameSite=Lax, 24h, `Secure` when requested
pub fn session_cookie(token: &str, secure: bool) -> Result<Cookie<'static>, AppError> {
    let mut raw = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={SESSION_TTL_SECONDS}"
    );
    if secure {
        raw.push_str("; Secure");
    }
    Cookie::parse(raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid session cookie: {e}")))
}

/// Removal cookie matching [`session_cookie`]
pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::verify_session_token;
    use tempfile::TempDir;

    const SECRET: &str = "test-secret-key-that-is-32-bytes!";

    async fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (db, temp_dir)
    }

    fn identity(picture: Option<&str>) -> ExternalIdentity {
        ExternalIdentity {
            id: "google-123".to_string(),
            name: "Ana Gómez".to_string(),
            email: "ana@example.com".to_string(),
            picture: picture.map(ToOwned::to_owned),
        }
    }

    #[tokio::test]
    async fn first_sign_in_creates_regular_user() {
        let (db, _dir) = create_test_db().await;

        let (user, token) = exchange_identity(&db, &identity(None), SECRET)
            .await
            .unwrap();

        assert_eq!(user.role, "user");
        assert_eq!(user.google_id, "google-123");
        assert_eq!(verify_session_token(&token, SECRET).unwrap().id, user.id);
        assert!(db.get_user(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn returning_user_keeps_id_and_role() {
        let (db, _dir) = create_test_db().await;

        let first = resolve_user(&db, &identity(None)).await.unwrap();
        db.update_user_role(&first.id, Role::Admin).await.unwrap();

        let mut renamed = identity(None);
        renamed.name = "Someone Else".to_string();
        let second = resolve_user(&db, &renamed).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Ana Gómez");
        assert!(second.has_role(Role::Admin));
        assert_eq!(db.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn returning_user_picture_is_refreshed() {
        let (db, _dir) = create_test_db().await;

        let first = resolve_user(&db, &identity(Some("https://example.com/old.png")))
            .await
            .unwrap();
        let second = resolve_user(&db, &identity(Some("https://example.com/new.png")))
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        let stored = db.get_user(&first.id).await.unwrap().unwrap();
        assert_eq!(
            stored.profile_picture.as_deref(),
            Some("https://example.com/new.png")
        );
    }

    #[tokio::test]
    async fn email_taken_by_other_identity_fails() {
        let (db, _dir) = create_test_db().await;
        resolve_user(&db, &identity(None)).await.unwrap();

        let mut other = identity(None);
        other.id = "google-999".to_string();
        assert!(resolve_user(&db, &other).await.is_err());
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc", false).unwrap();
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), None);
        assert_eq!(
            cookie.max_age().map(|age| age.whole_seconds()),
            Some(SESSION_TTL_SECONDS)
        );

        let secure = session_cookie("abc", true).unwrap();
        assert_eq!(secure.secure(), Some(true));
    }
}
