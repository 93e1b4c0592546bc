//! Authentication and authorization
//!
//! Handles:
//! - Google OAuth flow
//! - Identity exchange (external identity to local user)
//! - Session tokens
//! - Authentication and role middleware

mod google;
pub mod identity;
mod middleware;
mod oauth;
pub mod session;

pub use google::GoogleClient;
pub use identity::{exchange_identity, resolve_user};
pub use middleware::{
    CurrentUser, RoleGuard, Subject, authenticate_token, extract_token_from_headers, require_auth,
    require_role,
};
pub use oauth::auth_router;
pub use session::{
    SessionClaims, TokenError, create_session_token, create_session_token_at,
    verify_session_token, verify_session_token_at,
};
