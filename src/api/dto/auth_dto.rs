//! Registration, login, and session DTOs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{NewAccount, Session};
use crate::domain::{Role, User, UserId};

/// Request body for `POST /api/auth/register`.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Unique login name.
    #[serde(default)]
    pub username: String,
    /// Unique email address.
    #[serde(default)]
    pub email: String,
    /// Plaintext password, at least 8 characters.
    #[serde(default)]
    pub password: String,
    /// Requested role; defaults to `viewer`.
    pub role: Option<Role>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

impl From<RegisterRequest> for NewAccount {
    fn from(req: RegisterRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            role: req.role,
        }
    }
}

/// Request body for `POST /api/auth/login`.
#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Account email.
    #[serde(default)]
    pub email: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// User as returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserDto {
    /// User id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Response body for register and login.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// `true`.
    pub success: bool,
    /// What happened.
    pub message: String,
    /// Bearer token; also set as the `token` cookie.
    pub token: String,
    /// The signed-in user.
    pub user: UserDto,
}

impl AuthResponse {
    /// Builds the response for a fresh session.
    pub fn new(session: Session, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            token: session.token,
            user: session.user.into(),
        }
    }
}
