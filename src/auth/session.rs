//! Session tokens
//!
//! Compact HS256 JWTs carried in the `token` cookie or a bearer header.
//! No server-side session storage: validity is the signature plus `exp`.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "token";

/// Token lifetime (24h)
pub const SESSION_TTL_SECONDS: i64 = 86_400;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims encoded in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Local user id
    pub id: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

#[derive(Deserialize)]
struct JwtHeader {
    alg: String,
}

fn sign(signing_input: &str, secret: &str) -> Result<HmacSha256, TokenError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::BadSignature)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Create a signed session token for `user_id`, valid for 24 hours from now
pub fn create_session_token(user_id: &str, secret: &str) -> Result<String, crate::error::AppError> {
    create_session_token_at(user_id, secret, Utc::now())
}

/// Create a signed session token as if issued at `issued_at`
///
/// Token format: base64(header).base64(claims).base64(hmac_sha256(header.claims))
pub fn create_session_token_at(
    user_id: &str,
    secret: &str,
    issued_at: DateTime<Utc>,
) -> Result<String, crate::error::AppError> {
    let claims = SessionClaims {
        id: user_id.to_string(),
        iat: issued_at.timestamp(),
        exp: (issued_at + Duration::seconds(SESSION_TTL_SECONDS)).timestamp(),
    };

    let payload =
        serde_json::to_string(&claims).map_err(|e| crate::error::AppError::Internal(e.into()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(JWT_HEADER.as_bytes()),
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    );
    let signature = sign(&signing_input, secret)
        .map_err(|e| crate::error::AppError::Internal(e.into()))?
        .finalize()
        .into_bytes();

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify a session token against the current time
pub fn verify_session_token(token: &str, secret: &str) -> Result<SessionClaims, TokenError> {
    verify_session_token_at(token, secret, Utc::now())
}

/// Verify a session token against `now`
///
/// Pure function of its inputs. The signature is checked before the
/// payload is trusted, so a forged `exp` is reported as `BadSignature`.
pub fn verify_session_token_at(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<SessionClaims, TokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let header: JwtHeader = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(TokenError::Malformed)?;
    if header.alg != "HS256" {
        return Err(TokenError::Malformed);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::Malformed)?;
    sign(&format!("{header_b64}.{payload_b64}"), secret)?
        .verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: SessionClaims = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(TokenError::Malformed)?;

    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}
