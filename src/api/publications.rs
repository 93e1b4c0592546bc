//! Publication endpoints
//!
//! Sellers submit property listings here. Every route requires a
//! valid session token.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    routing::post,
};
use serde::Serialize;

use crate::AppState;
use crate::auth::{CurrentUser, require_auth};
use crate::data::Listing;
use crate::error::AppError;
use crate::service::ListingService;

/// Create publications router
///
/// Routes:
/// - POST /publications/create - Submit a listing
pub fn publications_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create", post(create_publication))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Debug, Serialize)]
pub struct CreatePublicationResponse {
    pub message: &'static str,
    pub publication: Listing,
}

/// POST /publications/create
///
/// The seller is always the caller; a `seller` or `status` in the body
/// is ignored and the listing starts as `pending`.
async fn create_publication(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatePublicationResponse>), AppError> {
    let Json(payload) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let publication = ListingService::new(state.db.clone())
        .create(&subject.user_id, &payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePublicationResponse {
            message: "Publication created successfully",
            publication,
        }),
    ))
}
