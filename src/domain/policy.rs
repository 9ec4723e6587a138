//! Role-based authorization policy.
//!
//! [`authorize`] is a pure, total function over the closed [`Role`] and
//! [`Action`] sets. Callers holding free-form tags go through
//! [`authorize_tagged`], which denies anything it cannot parse.
//!
//! | action                                         | viewer | engineer | admin |
//! |------------------------------------------------|--------|----------|-------|
//! | view services / incidents                      | ✓      | ✓        | ✓     |
//! | create incident, add update, resolve, edit     | ✗      | ✓        | ✓     |
//! | update service status                          | ✗      | ✓        | ✓     |
//! | create/update/delete service                   | ✗      | ✗        | ✓     |
//! | delete incident, edit resolved incident        | ✗      | ✗        | ✓     |
//! | toggle publish, manage users, view audit log   | ✗      | ✗        | ✓     |

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::user::Role;
use crate::error::AppError;

/// Operation subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// List or read services.
    ViewServices,
    /// List or read incidents and their timelines.
    ViewIncidents,
    /// Register a service.
    CreateService,
    /// Change a service's name or description.
    UpdateService,
    /// Set a service's status directly.
    UpdateServiceStatus,
    /// Remove a service.
    DeleteService,
    /// Open an incident.
    CreateIncident,
    /// Change title or description of an open incident.
    EditIncident,
    /// Change title or description of a resolved incident.
    EditResolvedIncident,
    /// Append a timeline update.
    AddIncidentUpdate,
    /// Resolve an incident.
    ResolveIncident,
    /// Change public visibility of an incident.
    TogglePublish,
    /// Remove an incident.
    DeleteIncident,
    /// Administer user accounts.
    ManageUsers,
    /// Read the audit log.
    ViewAuditLog,
}

impl Action {
    /// Every action.
    pub const ALL: [Self; 15] = [
        Self::ViewServices,
        Self::ViewIncidents,
        Self::CreateService,
        Self::UpdateService,
        Self::UpdateServiceStatus,
        Self::DeleteService,
        Self::CreateIncident,
        Self::EditIncident,
        Self::EditResolvedIncident,
        Self::AddIncidentUpdate,
        Self::ResolveIncident,
        Self::TogglePublish,
        Self::DeleteIncident,
        Self::ManageUsers,
        Self::ViewAuditLog,
    ];

    /// Stable snake_case tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewServices => "view_services",
            Self::ViewIncidents => "view_incidents",
            Self::CreateService => "create_service",
            Self::UpdateService => "update_service",
            Self::UpdateServiceStatus => "update_service_status",
            Self::DeleteService => "delete_service",
            Self::CreateIncident => "create_incident",
            Self::EditIncident => "edit_incident",
            Self::EditResolvedIncident => "edit_resolved_incident",
            Self::AddIncidentUpdate => "add_incident_update",
            Self::ResolveIncident => "resolve_incident",
            Self::TogglePublish => "toggle_publish",
            Self::DeleteIncident => "delete_incident",
            Self::ManageUsers => "manage_users",
            Self::ViewAuditLog => "view_audit_log",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("unknown action '{s}'")))
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The role may perform the action.
    Allow,
    /// The role may not perform the action.
    Deny,
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Minimum role tier required for an action.
const fn minimum_role(action: Action) -> Role {
    match action {
        Action::ViewServices | Action::ViewIncidents => Role::Viewer,
        Action::CreateIncident
        | Action::EditIncident
        | Action::AddIncidentUpdate
        | Action::ResolveIncident
        | Action::UpdateServiceStatus => Role::Engineer,
        Action::CreateService
        | Action::UpdateService
        | Action::DeleteService
        | Action::EditResolvedIncident
        | Action::TogglePublish
        | Action::DeleteIncident
        | Action::ManageUsers
        | Action::ViewAuditLog => Role::Admin,
    }
}

/// Ranks roles by privilege. Kept separate from [`Role`] so the wire enum
/// does not grow an ordering that could be compared by accident.
const fn tier(role: Role) -> u8 {
    match role {
        Role::Viewer => 0,
        Role::Engineer => 1,
        Role::Admin => 2,
    }
}

/// Decides whether `role` may perform `action`.
#[must_use]
pub const fn authorize(role: Role, action: Action) -> Decision {
    if tier(role) >= tier(minimum_role(action)) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Decides from free-form tags. Unknown roles and unknown actions are
/// always denied.
#[must_use]
pub fn authorize_tagged(role: &str, action: &str) -> Decision {
    match (role.parse::<Role>(), action.parse::<Action>()) {
        (Ok(role), Ok(action)) => authorize(role, action),
        _ => Decision::Deny,
    }
}

/// Roles allowed to perform `action`, lowest privilege first.
#[must_use]
pub fn required_roles(action: Action) -> Vec<Role> {
    Role::ALL
        .into_iter()
        .filter(|role| authorize(*role, action).is_allowed())
        .collect()
}

/// Fails with [`AppError::Forbidden`] unless `role` may perform `action`.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] on a deny decision.
pub fn ensure(role: Role, action: Action) -> Result<(), AppError> {
    match authorize(role, action) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            tracing::warn!(role = %role, action = %action, "permission denied");
            Err(AppError::Forbidden { action, role })
        }
    }
}
