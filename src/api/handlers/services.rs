//! Service registry handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::dto::{
    CreateServiceRequest, ServiceDetailDto, UpdateServiceRequest, UpdateServiceStatusRequest,
};
use crate::api::envelope::{Envelope, ErrorEnvelope, MessageEnvelope};
use crate::api::extract::{ApiJson, ApiPath, AuthUser};
use crate::app_state::AppState;
use crate::domain::{MonitoredService, ServiceId};
use crate::error::AppError;

/// `GET /api/services` — All services, newest first.
///
/// # Errors
///
/// Returns [`AppError`] when unauthenticated.
#[utoipa::path(
    get,
    path = "/api/services",
    tag = "Services",
    summary = "List services",
    security(("bearer" = []), ("cookie" = [])),
    responses(
        (status = 200, description = "Service list", body = Envelope<Vec<MonitoredService>>),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
    )
)]
pub async fn list_services(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let services = state.catalog.list_services(&actor).await?;
    Ok(Json(Envelope::data(services)))
}

/// `POST /api/services` — Register a service.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins and
/// [`AppError::Validation`] for a blank name.
#[utoipa::path(
    post,
    path = "/api/services",
    tag = "Services",
    summary = "Create service",
    description = "Admin only. Status defaults to `up`. Duplicate names are allowed.",
    security(("bearer" = []), ("cookie" = [])),
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created", body = Envelope<MonitoredService>),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
    )
)]
pub async fn create_service(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let service = state.catalog.create_service(&actor, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(service).with_message("service created")),
    ))
}

/// `GET /api/services/{id}` — One service with its recent incidents.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/services/{id}",
    tag = "Services",
    summary = "Get service",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = ServiceId, Path, description = "Service UUID")),
    responses(
        (status = 200, description = "Service with recent incidents", body = Envelope<ServiceDetailDto>),
        (status = 404, description = "Service not found", body = ErrorEnvelope),
    )
)]
pub async fn get_service(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<ServiceId>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.catalog.get_service(&actor, id).await?;
    Ok(Json(Envelope::data(ServiceDetailDto::from(detail))))
}

/// `PATCH /api/services/{id}` — Change name and/or description.
///
/// # Errors
///
/// Returns [`AppError::Validation`] when no field is given.
#[utoipa::path(
    patch,
    path = "/api/services/{id}",
    tag = "Services",
    summary = "Update service",
    description = "Admin only. At least one of `name` and `description` is required.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = ServiceId, Path, description = "Service UUID")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Service updated", body = Envelope<MonitoredService>),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "Service not found", body = ErrorEnvelope),
    )
)]
pub async fn update_service(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<ServiceId>,
    ApiJson(req): ApiJson<UpdateServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let service = state.catalog.update_service(&actor, id, req.into()).await?;
    Ok(Json(Envelope::data(service).with_message("service updated")))
}

/// `PATCH /api/services/{id}/status` — Set the status directly.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for viewers.
#[utoipa::path(
    patch,
    path = "/api/services/{id}/status",
    tag = "Services",
    summary = "Set service status",
    description = "Engineer or admin.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = ServiceId, Path, description = "Service UUID")),
    request_body = UpdateServiceStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Envelope<MonitoredService>),
        (status = 400, description = "Unknown status", body = ErrorEnvelope),
        (status = 403, description = "Engineer or admin only", body = ErrorEnvelope),
        (status = 404, description = "Service not found", body = ErrorEnvelope),
    )
)]
pub async fn update_service_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<ServiceId>,
    ApiJson(req): ApiJson<UpdateServiceStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let service = state
        .catalog
        .update_service_status(&actor, id, req.status)
        .await?;
    Ok(Json(Envelope::data(service).with_message("service status updated")))
}

/// `DELETE /api/services/{id}` — Remove a service without incidents.
///
/// # Errors
///
/// Returns [`AppError::Conflict`] while incidents reference the service.
#[utoipa::path(
    delete,
    path = "/api/services/{id}",
    tag = "Services",
    summary = "Delete service",
    description = "Admin only. Rejected while any incident references the service.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = ServiceId, Path, description = "Service UUID")),
    responses(
        (status = 200, description = "Service deleted", body = MessageEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "Service not found", body = ErrorEnvelope),
        (status = 409, description = "Service has incidents", body = ErrorEnvelope),
    )
)]
pub async fn delete_service(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<ServiceId>,
) -> Result<impl IntoResponse, AppError> {
    state.catalog.delete_service(&actor, id).await?;
    Ok(Json(Envelope::message("service deleted")))
}

/// Service registry routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route(
            "/services/{id}",
            get(get_service).patch(update_service).delete(delete_service),
        )
        .route("/services/{id}/status", patch(update_service_status))
}
