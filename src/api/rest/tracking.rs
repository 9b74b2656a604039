use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::Method;
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::tracking_link::resolve;
use crate::error::AppError;
use crate::models::tracking::PublicTrackingView;
use crate::state::AppState;

/// Unauthenticated customer surface, open to any origin.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/track/:token", get(public_view))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        )
}

async fn public_view(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<PublicTrackingView>, AppError> {
    match resolve(&state, &token, Utc::now()) {
        Ok(view) => Ok(Json(view)),
        Err(AppError::NotFound(_) | AppError::Expired(_)) => Err(AppError::NotFound(
            "link not found or expired".to_string(),
        )),
        Err(err) => Err(err),
    }
}
