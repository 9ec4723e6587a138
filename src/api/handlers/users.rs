//! User administration and audit log handlers. Admin only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{AuditListParams, CreateUserRequest, UpdateUserRequest, UserListParams};
use crate::api::envelope::{Envelope, ErrorEnvelope, MessageEnvelope};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery, AuthUser};
use crate::app_state::AppState;
use crate::domain::{AuditLogEntry, User, UserId};
use crate::error::AppError;

/// `GET /api/users` — Users matching the filters, newest first.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    summary = "List users",
    security(("bearer" = []), ("cookie" = [])),
    params(UserListParams),
    responses(
        (status = 200, description = "User list", body = Envelope<Vec<User>>),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(params): ApiQuery<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.users.list_users(&actor, params.into()).await?;
    Ok(Json(Envelope::data(users)))
}

/// `POST /api/users` — Create an account.
///
/// # Errors
///
/// Returns [`AppError::Validation`] or [`AppError::Conflict`].
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    summary = "Create user",
    security(("bearer" = []), ("cookie" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = Envelope<User>),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 409, description = "Username or email taken", body = ErrorEnvelope),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.create_user(&actor, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(user).with_message("user created")),
    ))
}

/// `GET /api/users/{id}` — One user.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    summary = "Get user",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = UserId, Path, description = "User UUID")),
    responses(
        (status = 200, description = "User", body = Envelope<User>),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "User not found", body = ErrorEnvelope),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.get_user(&actor, id).await?;
    Ok(Json(Envelope::data(user)))
}

/// `PATCH /api/users/{id}` — Change username, email, password, or role.
///
/// # Errors
///
/// Returns [`AppError::Validation`], [`AppError::Conflict`], or
/// [`AppError::NotFound`].
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    tag = "Users",
    summary = "Update user",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = UserId, Path, description = "User UUID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = Envelope<User>),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "User not found", body = ErrorEnvelope),
        (status = 409, description = "Username or email taken", body = ErrorEnvelope),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.update_user(&actor, id, req.into()).await?;
    Ok(Json(Envelope::data(user).with_message("user updated")))
}

/// `DELETE /api/users/{id}` — Remove an account.
///
/// # Errors
///
/// Returns [`AppError::Validation`] when an admin targets their own account.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    summary = "Delete user",
    description = "Existing tokens of the deleted user stop working. Admins cannot delete themselves.",
    security(("bearer" = []), ("cookie" = [])),
    params(("id" = UserId, Path, description = "User UUID")),
    responses(
        (status = 200, description = "User deleted", body = MessageEnvelope),
        (status = 400, description = "Self-deletion", body = ErrorEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
        (status = 404, description = "User not found", body = ErrorEnvelope),
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, AppError> {
    state.users.delete_user(&actor, id).await?;
    Ok(Json(Envelope::message("user deleted")))
}

/// `GET /api/audit-logs` — Most recent audit entries.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] for non-admins and
/// [`AppError::Validation`] for a non-positive limit.
#[utoipa::path(
    get,
    path = "/api/audit-logs",
    tag = "Audit",
    summary = "List audit log",
    security(("bearer" = []), ("cookie" = [])),
    params(AuditListParams),
    responses(
        (status = 200, description = "Audit entries, newest first", body = Envelope<Vec<AuditLogEntry>>),
        (status = 400, description = "Invalid limit", body = ErrorEnvelope),
        (status = 403, description = "Admin only", body = ErrorEnvelope),
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiQuery(params): ApiQuery<AuditListParams>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.audit.list(&actor, params.limit).await?;
    Ok(Json(Envelope::data(entries)))
}

/// User administration and audit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/audit-logs", get(list_audit_logs))
}
