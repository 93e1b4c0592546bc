//! Admin API endpoints
//!
//! Review endpoints. All routes require the admin role.

use axum::{Router, extract::State, middleware, response::Json, routing::get};

use crate::AppState;
use crate::auth::{RoleGuard, require_role};
use crate::data::{Listing, Role, User};
use crate::error::AppError;
use crate::service::ListingService;

/// Create admin router
///
/// Routes:
/// - GET /admin/users - All users
/// - GET /admin/publications - All listings, any status
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/publications", get(list_publications))
        .route_layer(middleware::from_fn_with_state(
            RoleGuard::new(state, Role::Admin),
            require_role,
        ))
}

/// GET /admin/users
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.db.list_users().await?))
}

/// GET /admin/publications
async fn list_publications(State(state): State<AppState>) -> Result<Json<Vec<Listing>>, AppError> {
    let listings = ListingService::new(state.db.clone()).list_all().await?;
    Ok(Json(listings))
}
