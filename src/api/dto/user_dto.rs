//! User administration and audit log DTOs.

use std::fmt;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::NewAccount;
use crate::domain::Role;
use crate::persistence::UserFilter;
use crate::service::UserPatch;

/// Request body for `POST /api/users`.
#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Unique login name.
    #[serde(default)]
    pub username: String,
    /// Unique email address.
    #[serde(default)]
    pub email: String,
    /// Initial password.
    #[serde(default)]
    pub password: String,
    /// Role; defaults to `viewer`.
    pub role: Option<Role>,
}

impl fmt::Debug for CreateUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl From<CreateUserRequest> for NewAccount {
    fn from(req: CreateUserRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            role: req.role,
        }
    }
}

/// Request body for `PATCH /api/users/{id}`.
#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    /// New login name.
    pub username: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New role.
    pub role: Option<Role>,
}

impl fmt::Debug for UpdateUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUserRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl From<UpdateUserRequest> for UserPatch {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            role: req.role,
        }
    }
}

/// Query string for `GET /api/users`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListParams {
    /// Only users with this role.
    pub role: Option<Role>,
    /// Case-insensitive substring of username or email.
    pub search: Option<String>,
}

impl From<UserListParams> for UserFilter {
    fn from(params: UserListParams) -> Self {
        Self {
            role: params.role,
            search: params.search,
        }
    }
}

/// Query string for `GET /api/audit-logs`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditListParams {
    /// Maximum number of entries; defaults to 100, capped at 1000.
    pub limit: Option<i64>,
}
