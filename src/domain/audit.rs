//! Audit log entries.
//!
//! Entries are append-only: nothing in the crate updates or deletes them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::UserId;
use crate::error::AppError;

/// State-changing action recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A user account was created (self-registration or by an admin).
    CreateUser,
    /// A user logged in.
    Login,
    /// An admin changed a user account.
    UpdateUser,
    /// An admin removed a user account.
    DeleteUser,
    /// A service was registered.
    CreateService,
    /// Service name or description changed.
    UpdateService,
    /// Service status was set directly.
    UpdateServiceStatus,
    /// A service was removed.
    DeleteService,
    /// An incident was opened.
    CreateIncident,
    /// Incident title or description changed.
    UpdateIncident,
    /// A timeline update was appended.
    AddIncidentUpdate,
    /// An incident was resolved.
    ResolveIncident,
    /// Public visibility of an incident changed.
    TogglePublish,
    /// An incident and its timeline were removed.
    DeleteIncident,
}

impl AuditAction {
    /// Stable snake_case tag used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateUser => "create_user",
            Self::Login => "login",
            Self::UpdateUser => "update_user",
            Self::DeleteUser => "delete_user",
            Self::CreateService => "create_service",
            Self::UpdateService => "update_service",
            Self::UpdateServiceStatus => "update_service_status",
            Self::DeleteService => "delete_service",
            Self::CreateIncident => "create_incident",
            Self::UpdateIncident => "update_incident",
            Self::AddIncidentUpdate => "add_incident_update",
            Self::ResolveIncident => "resolve_incident",
            Self::TogglePublish => "toggle_publish",
            Self::DeleteIncident => "delete_incident",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "create_user" => Self::CreateUser,
            "login" => Self::Login,
            "update_user" => Self::UpdateUser,
            "delete_user" => Self::DeleteUser,
            "create_service" => Self::CreateService,
            "update_service" => Self::UpdateService,
            "update_service_status" => Self::UpdateServiceStatus,
            "delete_service" => Self::DeleteService,
            "create_incident" => Self::CreateIncident,
            "update_incident" => Self::UpdateIncident,
            "add_incident_update" => Self::AddIncidentUpdate,
            "resolve_incident" => Self::ResolveIncident,
            "toggle_publish" => Self::TogglePublish,
            "delete_incident" => Self::DeleteIncident,
            other => return Err(AppError::Server(format!("unknown audit action: {other}"))),
        };
        Ok(action)
    }
}

/// Kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A user account.
    User,
    /// A monitored service.
    Service,
    /// An incident.
    Incident,
}

impl EntityType {
    /// Stable tag used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Service => "service",
            Self::Incident => "incident",
        }
    }
}

impl FromStr for EntityType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "service" => Ok(Self::Service),
            "incident" => Ok(Self::Incident),
            other => Err(AppError::Server(format!("unknown entity type: {other}"))),
        }
    }
}

/// Audit entry to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    /// Acting user, if known.
    pub actor_id: Option<UserId>,
    /// What happened.
    pub action: AuditAction,
    /// Kind of entity affected.
    pub entity_type: EntityType,
    /// Identifier of the affected entity, as text.
    pub entity_id: String,
    /// Optional structured payload.
    pub details: Option<serde_json::Value>,
}

impl NewAuditEntry {
    /// Entry without details.
    pub fn new(
        actor_id: Option<UserId>,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl fmt::Display,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            details: None,
        }
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditLogEntry {
    /// Monotonic row id.
    pub id: i64,
    /// Acting user. Weak reference.
    pub actor_id: Option<UserId>,
    /// What happened.
    pub action: AuditAction,
    /// Kind of entity affected.
    pub entity_type: EntityType,
    /// Identifier of the affected entity.
    pub entity_id: String,
    /// Optional structured payload.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
