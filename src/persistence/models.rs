//! Database row models and their conversion into domain types.
//!
//! Enum columns are stored as lowercase `TEXT` guarded by `CHECK`
//! constraints; a value outside the closed set surfaces as
//! [`AppError::Server`] rather than being coerced.

use chrono::{DateTime, Utc};

use super::{Credentials, IncidentListing};
use crate::domain::{
    AuditLogEntry, Incident, IncidentId, IncidentStatus, IncidentUpdate, MonitoredService,
    Resolution, ServiceId, User, UserId,
};
use crate::error::AppError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// User id.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Salted password hash.
    pub password_hash: String,
    /// Role tag.
    pub role: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for Credentials {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|_| AppError::Server(format!("unknown role in storage: {}", row.role)))?;
        Ok(Self {
            user: User {
                id: row.id,
                username: row.username,
                email: row.email,
                role,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Credentials::try_from(row).map(|credentials| credentials.user)
    }
}

/// A row from the `services` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    /// Service id.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Status tag.
    pub status: String,
    /// Registering user.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ServiceRow> for MonitoredService {
    type Error = AppError;

    fn try_from(row: ServiceRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| AppError::Server(format!("unknown service status: {}", row.status)))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            status,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `incidents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncidentRow {
    /// Incident id.
    pub id: IncidentId,
    /// Affected service.
    pub service_id: ServiceId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Severity tag.
    pub severity: String,
    /// Status tag.
    pub status: String,
    /// Public visibility.
    pub is_published: bool,
    /// Reporting user.
    pub created_by: Option<UserId>,
    /// Resolving user.
    pub resolved_by: Option<UserId>,
    /// Resolution timestamp.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Root cause.
    pub root_cause: Option<String>,
    /// Prevention notes.
    pub prevention_notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = AppError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let severity = row
            .severity
            .parse()
            .map_err(|_| AppError::Server(format!("unknown severity: {}", row.severity)))?;
        let status: IncidentStatus = row
            .status
            .parse()
            .map_err(|_| AppError::Server(format!("unknown incident status: {}", row.status)))?;

        let resolution = match (status, row.resolved_by, row.resolved_at) {
            (IncidentStatus::Open, None, None) => None,
            (IncidentStatus::Resolved, Some(resolved_by), Some(resolved_at)) => Some(Resolution {
                resolved_by,
                resolved_at,
                root_cause: row.root_cause,
                prevention_notes: row.prevention_notes,
            }),
            _ => {
                return Err(AppError::Server(format!(
                    "incident {} has an inconsistent resolution",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            service_id: row.service_id,
            title: row.title,
            description: row.description,
            severity,
            is_published: row.is_published,
            created_by: row.created_by,
            resolution,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// An incident row joined with its service name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncidentListingRow {
    /// Incident columns.
    #[sqlx(flatten)]
    pub incident: IncidentRow,
    /// Name of the affected service.
    pub service_name: String,
}

impl TryFrom<IncidentListingRow> for IncidentListing {
    type Error = AppError;

    fn try_from(row: IncidentListingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            incident: row.incident.try_into()?,
            service_name: row.service_name,
        })
    }
}

/// A row from the `incident_updates` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpdateRow {
    /// Auto-increment row id.
    pub id: i64,
    /// Parent incident.
    pub incident_id: IncidentId,
    /// Narrative text.
    pub message: String,
    /// Author.
    pub created_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<UpdateRow> for IncidentUpdate {
    fn from(row: UpdateRow) -> Self {
        Self {
            id: row.id,
            incident_id: row.incident_id,
            message: row.message,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// A row from the `audit_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    /// Auto-increment row id.
    pub id: i64,
    /// Acting user.
    pub actor_id: Option<UserId>,
    /// Action tag.
    pub action: String,
    /// Entity type tag.
    pub entity_type: String,
    /// Entity identifier.
    pub entity_id: String,
    /// JSONB payload.
    pub details: Option<serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action.parse()?,
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, Severity};

    fn incident_row(status: &str, resolved: bool) -> IncidentRow {
        let now = Utc::now();
        IncidentRow {
            id: IncidentId::new(),
            service_id: ServiceId::new(),
            title: "db failover".into(),
            description: "primary lost".into(),
            severity: "critical".into(),
            status: status.into(),
            is_published: true,
            created_by: Some(UserId::new()),
            resolved_by: resolved.then(UserId::new),
            resolved_at: resolved.then_some(now),
            root_cause: None,
            prevention_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_row_converts() {
        let incident = Incident::try_from(incident_row("open", false)).ok();
        assert_eq!(incident.as_ref().map(Incident::status), Some(IncidentStatus::Open));
        assert_eq!(incident.map(|i| i.severity), Some(Severity::Critical));
    }

    #[test]
    fn resolved_row_carries_resolution() {
        let incident = Incident::try_from(incident_row("resolved", true)).ok();
        assert!(incident.is_some_and(|i| i.resolution.is_some()));
    }

    #[test]
    fn half_resolved_row_is_rejected() {
        assert!(Incident::try_from(incident_row("resolved", false)).is_err());
        assert!(Incident::try_from(incident_row("open", true)).is_err());
    }

    #[test]
    fn unknown_role_is_a_server_error() {
        let now = Utc::now();
        let row = UserRow {
            id: UserId::new(),
            username: "ops".into(),
            email: "ops@example.com".into(),
            password_hash: "x".into(),
            role: "superuser".into(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(User::try_from(row), Err(AppError::Server(_))));

        let row = UserRow {
            id: UserId::new(),
            username: "ops".into(),
            email: "ops@example.com".into(),
            password_hash: "x".into(),
            role: "engineer".into(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(User::try_from(row).ok().map(|u| u.role), Some(Role::Engineer));
    }
}
