//! Monitored services and their health status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{ServiceId, UserId};
use crate::error::AppError;

/// Health of a monitored service.
///
/// Variants are declared in increasing order of badness so that the derived
/// [`Ord`] ranks `Down` highest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Operating normally.
    #[default]
    Up,
    /// Partially impaired.
    Degraded,
    /// Unavailable.
    Down,
}

impl ServiceStatus {
    /// Stable lowercase tag used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Degraded => "degraded",
            Self::Down => "down",
        }
    }

    /// Worst status across a set of services: `Down` if any is down, else
    /// `Degraded` if any is degraded, else `Up` (including the empty set).
    pub fn overall<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses.into_iter().max().unwrap_or(Self::Up)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "degraded" => Ok(Self::Degraded),
            "down" => Ok(Self::Down),
            other => Err(AppError::Validation(format!(
                "invalid status '{other}'; must be one of: up, degraded, down"
            ))),
        }
    }
}

/// A monitored system or component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonitoredService {
    /// Service identifier.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Current health.
    pub status: ServiceStatus,
    /// User who registered the service. Weak reference.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}
