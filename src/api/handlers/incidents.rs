//! Incident lifecycle handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::dto::{
    AddUpdateRequest, CreateIncidentRequest, IncidentDetailDto, IncidentDto, IncidentListParams,
    PublishRequest, ResolveIncidentRequest, UpdateIncidentRequest,
};
use crate::api::envelope::{Envelope, ErrorEnvelope, MessageEnvelope};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::app_state::AppState;
use crate::domain::{IncidentId, IncidentUpdate};
use crate::error::AppError;

/// `GET /api/incidents` — Incidents matching the filters, newest first.
///
/// # Errors
///
/// Returns [`AppError::Validation`] for an unknown filter value.
#[utoipa::path(
    get,
    path = "/api/incidents",
    tag = "Incidents",
    summary = "List incidents",
    security(("bearer" = []), ("cookie" = [])),
    params(IncidentListParams),
    responses(
        (status = 200, description = "Incident list", body = Envelope<Vec<IncidentDto>>),
        (status = 400, description = "Invalid filter", body = ErrorEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
    )
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(params): ApiQuery<IncidentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let incidents: Vec<IncidentDto> = state
        .incidents
        .list_incidents(&actor, params.into())
        .await?
        .into_iter()
        .map(IncidentDto::from)
        .collect();
    Ok(Json(Envelope::data(incidents)))
}

/// `POST /api/incidents` — Open an incident.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for viewers and [`AppError::NotFound`]
/// for an unknown service.
#[utoipa::path(
    post,
    path = "/api/incidents",
    tag = "Incidents",
    summary = "Create incident",
    description = "Engineer or admin. Critical and high incidents take the service down, medium degrades it, low leaves it unchanged. An opening timeline entry is written in the same transaction.",
    security(("bearer" = []), ("cookie" = [])),
    request_body = CreateIncidentRequest,
    responses(
        (status = 201, description = "Incident opened", body = Envelope<IncidentDto>),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 403, description = "Engineer or admin only", body = ErrorEnvelope),
        (status = 404, description = "Service not found", body = ErrorEnvelope),
    )
)]
pub async fn create_incident(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateIncidentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let incident = state.incidents.create_incident(&actor, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(IncidentDto::from(incident)).with_message("incident created")),
    ))
}

/// `GET /api/incidents/{id}` — Incident with its timeline.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/incidents/{id}",
    tag = "Incidents",
    summary = "Get incident",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    responses(
        (status = 200, description = "Incident with updates", body = Envelope<IncidentDetailDto>),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
    )
)]
pub async fn get_incident(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.incidents.get_incident(&actor, id).await?;
    Ok(Json(Envelope::data(IncidentDetailDto::from(detail))))
}

/// `PATCH /api/incidents/{id}` — Edit title and/or description.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] when a non-admin edits a resolved
/// incident.
#[utoipa::path(
    patch,
    path = "/api/incidents/{id}",
    tag = "Incidents",
    summary = "Edit incident",
    description = "Engineer or admin while open; admin only once resolved. Severity and service status are not affected.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    request_body = UpdateIncidentRequest,
    responses(
        (status = 200, description = "Incident updated", body = Envelope<IncidentDto>),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 403, description = "Not permitted", body = ErrorEnvelope),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
    )
)]
pub async fn update_incident(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(req): ApiJson<UpdateIncidentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let incident = state.incidents.edit_incident(&actor, id, req.into()).await?;
    Ok(Json(
        Envelope::data(IncidentDto::from(incident)).with_message("incident updated"),
    ))
}

/// `DELETE /api/incidents/{id}` — Remove an incident and its timeline.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    delete,
    path = "/api/incidents/{id}",
    tag = "Incidents",
    summary = "Delete incident",
    description = "Admin only. Timeline entries are removed with it.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    responses(
        (status = 200, description = "Incident deleted", body = MessageEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
    )
)]
pub async fn delete_incident(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<impl IntoResponse, AppError> {
    state.incidents.delete_incident(&actor, id).await?;
    Ok(Json(Envelope::message("incident deleted")))
}

/// `GET /api/incidents/{id}/updates` — Timeline, oldest first.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/incidents/{id}/updates",
    tag = "Incidents",
    summary = "List incident updates",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    responses(
        (status = 200, description = "Timeline", body = Envelope<Vec<IncidentUpdate>>),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
    )
)]
pub async fn list_updates(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
) -> Result<impl IntoResponse, AppError> {
    let updates = state.incidents.list_updates(&actor, id).await?;
    Ok(Json(Envelope::data(updates)))
}

/// `POST /api/incidents/{id}/updates` — Append a timeline entry.
///
/// # Errors
///
/// Returns [`AppError::InvalidState`] once the incident is resolved.
#[utoipa::path(
    post,
    path = "/api/incidents/{id}/updates",
    tag = "Incidents",
    summary = "Add incident update",
    description = "Engineer or admin. Rejected once the incident is resolved.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    request_body = AddUpdateRequest,
    responses(
        (status = 201, description = "Update added", body = Envelope<IncidentUpdate>),
        (status = 400, description = "Empty message", body = ErrorEnvelope),
        (status = 403, description = "Engineer or admin only", body = ErrorEnvelope),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
        (status = 409, description = "Incident already resolved", body = ErrorEnvelope),
    )
)]
pub async fn add_update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(req): ApiJson<AddUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let update = state.incidents.add_update(&actor, id, &req.message).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(update).with_message("update added")),
    ))
}

/// `PATCH /api/incidents/{id}/resolve` — Resolve and bring the service up.
///
/// # Errors
///
/// Returns [`AppError::InvalidState`] if already resolved.
#[utoipa::path(
    patch,
    path = "/api/incidents/{id}/resolve",
    tag = "Incidents",
    summary = "Resolve incident",
    description = "Engineer or admin. Sets the owning service to `up` and appends a closing timeline entry in one transaction. The body may be omitted.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    request_body(content = ResolveIncidentRequest, description = "Optional resolution notes"),
    responses(
        (status = 200, description = "Incident resolved", body = Envelope<IncidentDto>),
        (status = 403, description = "Engineer or admin only", body = ErrorEnvelope),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
        (status = 409, description = "Incident already resolved", body = ErrorEnvelope),
    )
)]
pub async fn resolve_incident(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let notes: ResolveIncidentRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResolveIncidentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("invalid request body: {e}")))?
    };
    let incident = state.incidents.resolve(&actor, id, notes.into()).await?;
    Ok(Json(
        Envelope::data(IncidentDto::from(incident)).with_message("incident resolved"),
    ))
}

/// `PATCH /api/incidents/{id}/publish` — Show or hide on the public page.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    patch,
    path = "/api/incidents/{id}/publish",
    tag = "Incidents",
    summary = "Toggle publish",
    description = "Admin only. Does not affect service status.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = IncidentId, Path, description = "Incident UUID")),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Publish flag set", body = Envelope<IncidentDto>),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "Incident not found", body = ErrorEnvelope),
    )
)]
pub async fn publish_incident(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<IncidentId>,
    ApiJson(req): ApiJson<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    let incident = state
        .incidents
        .set_published(&actor, id, req.is_published)
        .await?;
    let message = if incident.is_published {
        "incident published"
    } else {
        "incident unpublished"
    };
    Ok(Json(Envelope::data(IncidentDto::from(incident)).with_message(message)))
}

/// Incident routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/incidents", get(list_incidents).post(create_incident))
        .route(
            "/incidents/{id}",
            get(get_incident).patch(update_incident).delete(delete_incident),
        )
        .route("/incidents/{id}/updates", get(list_updates).post(add_update))
        .route("/incidents/{id}/resolve", patch(resolve_incident))
        .route("/incidents/{id}/publish", patch(publish_incident))
}
