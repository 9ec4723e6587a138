//! Unauthenticated public status page.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::envelope::{Envelope, ErrorEnvelope};
use crate::app_state::AppState;
use crate::error::AppError;
use crate::service::PublicStatus;

/// `GET /api/public/status` — Services, published incidents, overall status.
///
/// # Errors
///
/// Returns [`AppError::Server`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/public/status",
    tag = "Public",
    summary = "Public status",
    description = "Services ordered by name, the most recent published incidents, and the worst status across all services. No authentication.",
    responses(
        (status = 200, description = "Public status", body = Envelope<PublicStatus>),
        (status = 500, description = "Storage failure", body = ErrorEnvelope),
    )
)]
pub async fn public_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let status = state.status_page.public_status().await?;
    Ok(Json(Envelope::data(status)))
}

/// Public routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/public/status", get(public_status))
}
