//! Incidents, their lifecycle states, and timeline updates.
//!
//! An incident moves one way, `open → resolved`. Resolution is terminal:
//! a recurring problem gets a new incident.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{IncidentId, ServiceId, UserId};
use super::monitored_service::ServiceStatus;
use crate::error::AppError;

/// Impact tier of an incident.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor, no forced status change.
    Low,
    /// Partial impairment.
    Medium,
    /// Major outage.
    High,
    /// Complete outage.
    Critical,
}

impl Severity {
    /// Every severity, lowest first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Stable lowercase tag used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Service status forced by opening an incident of this severity.
    ///
    /// `None` means the service keeps its current status.
    #[must_use]
    pub const fn forced_service_status(self) -> Option<ServiceStatus> {
        match self {
            Self::Critical | Self::High => Some(ServiceStatus::Down),
            Self::Medium => Some(ServiceStatus::Degraded),
            Self::Low => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(AppError::Validation(format!(
                "invalid severity '{other}'; must be one of: low, medium, high, critical"
            ))),
        }
    }
}

/// Lifecycle state of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    /// Under investigation; accepts updates.
    Open,
    /// Terminal.
    Resolved,
}

impl IncidentStatus {
    /// Stable lowercase tag used in storage and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "resolved" => Ok(Self::Resolved),
            other => Err(AppError::Validation(format!(
                "invalid incident status '{other}'; must be one of: open, resolved"
            ))),
        }
    }
}

/// Resolution record. Present exactly when the incident is resolved, which
/// keeps resolver and timestamp from drifting apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// User who resolved the incident.
    pub resolved_by: UserId,
    /// Resolution timestamp.
    pub resolved_at: DateTime<Utc>,
    /// Post-mortem root cause.
    pub root_cause: Option<String>,
    /// Follow-up actions to prevent recurrence.
    pub prevention_notes: Option<String>,
}

/// A recorded disruption of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    /// Incident identifier.
    pub id: IncidentId,
    /// Affected service.
    pub service_id: ServiceId,
    /// Short summary.
    pub title: String,
    /// Longer narrative.
    pub description: String,
    /// Impact tier.
    pub severity: Severity,
    /// Whether the incident is shown on the public status page.
    pub is_published: bool,
    /// Reporting user. Weak reference.
    pub created_by: Option<UserId>,
    /// Set once resolved.
    pub resolution: Option<Resolution>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Lifecycle state, derived from the presence of a resolution.
    #[must_use]
    pub const fn status(&self) -> IncidentStatus {
        if self.resolution.is_some() {
            IncidentStatus::Resolved
        } else {
            IncidentStatus::Open
        }
    }

    /// Returns `true` once the incident has been resolved.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Fails with [`AppError::InvalidState`] unless the incident is open.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidState`] with `what` in the message when
    /// the incident is resolved.
    pub fn ensure_open(&self, what: &str) -> Result<(), AppError> {
        if self.is_resolved() {
            return Err(AppError::InvalidState(format!(
                "cannot {what} a resolved incident"
            )));
        }
        Ok(())
    }
}

/// Append-only timeline entry of an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IncidentUpdate {
    /// Monotonic row id; breaks ties between equal timestamps.
    pub id: i64,
    /// Parent incident.
    pub incident_id: IncidentId,
    /// Narrative text.
    pub message: String,
    /// Author. Weak reference.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
