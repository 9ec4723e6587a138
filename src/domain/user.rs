//! Users and roles.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::UserId;
use crate::error::AppError;

/// Closed set of roles. The authorization policy matches on it exhaustively.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to the internal dashboard.
    #[default]
    Viewer,
    /// Operates incidents and service status.
    Engineer,
    /// Full control, including users and publishing.
    Admin,
}

impl Role {
    /// Every role, lowest privilege first.
    pub const ALL: [Self; 3] = [Self::Viewer, Self::Engineer, Self::Admin];

    /// Stable lowercase tag used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Engineer => "engineer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "engineer" => Ok(Self::Engineer),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::Validation(format!(
                "invalid role '{other}'; must be one of: viewer, engineer, admin"
            ))),
        }
    }
}

/// A user as seen outside the identity store. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique email address, used for login.
    pub email: String,
    /// Assigned role.
    pub role: Role,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}
