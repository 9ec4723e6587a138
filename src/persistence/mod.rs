//! Persistence layer: the [`Store`] abstraction and its implementations.
//!
//! The store is passed explicitly to every service as an `Arc<dyn Store>`.
//! Multi-step lifecycle effects are exposed as single store operations
//! ([`Store::open_incident`], [`Store::resolve_incident`],
//! [`Store::delete_service`]) so each implementation can run them inside one
//! transaction: [`postgres::PostgresStore`] uses a `sqlx` transaction with row
//! locks, [`memory::MemoryStore`] stages changes on a copy and swaps it in on
//! success.
//!
//! Lifecycle decisions (which status a severity forces, the timeline text)
//! are made by the caller; the store only applies them and re-checks the
//! state that has to be read under the transaction.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    AuditLogEntry, Incident, IncidentId, IncidentStatus, IncidentUpdate, MonitoredService,
    NewAuditEntry, Role, ServiceId, ServiceStatus, Severity, User, UserId,
};
use crate::error::AppError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// User to be inserted. The password is already hashed.
#[derive(Clone)]
pub struct NewUser {
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Salted password hash (PHC string).
    pub password_hash: String,
    /// Initial role.
    pub role: Role,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// A user together with their password hash. Only returned by
/// [`Store::find_credentials`], for login.
#[derive(Clone)]
pub struct Credentials {
    /// The user.
    pub user: User,
    /// Salted password hash (PHC string).
    pub password_hash: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Partial update of a user account. `None` fields are left untouched.
#[derive(Clone, Default)]
pub struct UserChanges {
    /// New login name.
    pub username: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New password hash.
    pub password_hash: Option<String>,
    /// New role.
    pub role: Option<Role>,
}

impl fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserChanges")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("role", &self.role)
            .finish()
    }
}

/// Filter for [`Store::list_users`].
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Only users with this role.
    pub role: Option<Role>,
    /// Case-insensitive substring of username or email.
    pub search: Option<String>,
}

/// Service to be inserted.
#[derive(Debug, Clone)]
pub struct NewService {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Initial status.
    pub status: ServiceStatus,
    /// Registering user.
    pub created_by: Option<UserId>,
}

/// Partial update of a service's descriptive fields.
#[derive(Debug, Clone, Default)]
pub struct ServiceChanges {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Incident to be opened, with the effects the caller derived for it.
#[derive(Debug, Clone)]
pub struct NewIncident {
    /// Affected service.
    pub service_id: ServiceId,
    /// Short summary.
    pub title: String,
    /// Longer narrative.
    pub description: String,
    /// Impact tier.
    pub severity: Severity,
    /// Initial public visibility.
    pub is_published: bool,
    /// Reporting user.
    pub created_by: UserId,
    /// Status to apply to the service, or `None` to leave it as is.
    pub forced_service_status: Option<ServiceStatus>,
    /// Text of the first timeline entry.
    pub opening_message: String,
}

/// Resolution to apply to an open incident.
#[derive(Debug, Clone)]
pub struct ResolveIncident {
    /// Incident to resolve.
    pub incident_id: IncidentId,
    /// Resolving user.
    pub resolved_by: UserId,
    /// Post-mortem root cause.
    pub root_cause: Option<String>,
    /// Follow-up actions.
    pub prevention_notes: Option<String>,
    /// Status to give the owning service.
    pub service_status: ServiceStatus,
    /// Text of the closing timeline entry.
    pub closing_message: String,
}

/// Partial update of an incident's descriptive fields.
#[derive(Debug, Clone, Default)]
pub struct IncidentChanges {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Filter for [`Store::list_incidents`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentFilter {
    /// Only incidents of this service.
    pub service_id: Option<ServiceId>,
    /// Only incidents in this state.
    pub status: Option<IncidentStatus>,
    /// Only incidents of this severity.
    pub severity: Option<Severity>,
    /// Only published incidents.
    pub published_only: bool,
    /// Maximum number of rows.
    pub limit: Option<i64>,
}

/// An incident joined with the name of its service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentListing {
    /// The incident.
    pub incident: Incident,
    /// Name of the affected service.
    pub service_name: String,
}

/// Storage handle shared by all services.
///
/// Every method reads from the store of record; implementations must not
/// cache statuses across calls.
#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    /// Checks that the backing store is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    /// Inserts a user. Username and email must be unique (exact match).
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    /// Looks up a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError>;
    /// Looks up a user and their password hash by exact email.
    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, AppError>;
    /// Lists users, newest first.
    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, AppError>;
    /// Applies a partial update to a user.
    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, AppError>;
    /// Removes a user. History referencing the user is kept.
    async fn delete_user(&self, id: UserId) -> Result<(), AppError>;

    /// Inserts a service.
    async fn insert_service(&self, service: NewService) -> Result<MonitoredService, AppError>;
    /// Looks up a service by id.
    async fn find_service(&self, id: ServiceId) -> Result<Option<MonitoredService>, AppError>;
    /// Lists services, newest first.
    async fn list_services(&self) -> Result<Vec<MonitoredService>, AppError>;
    /// Applies a partial update to a service's descriptive fields.
    async fn update_service(
        &self,
        id: ServiceId,
        changes: ServiceChanges,
    ) -> Result<MonitoredService, AppError>;
    /// Sets a service's status directly.
    async fn set_service_status(
        &self,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<MonitoredService, AppError>;
    /// Removes a service, failing with [`AppError::Conflict`] while any
    /// incident references it.
    async fn delete_service(&self, id: ServiceId) -> Result<(), AppError>;

    /// Atomically inserts an open incident, applies the forced service
    /// status, and appends the opening timeline entry.
    async fn open_incident(&self, incident: NewIncident) -> Result<Incident, AppError>;
    /// Looks up an incident by id.
    async fn find_incident(&self, id: IncidentId) -> Result<Option<Incident>, AppError>;
    /// Lists incidents with their service names, newest first.
    async fn list_incidents(&self, filter: &IncidentFilter)
    -> Result<Vec<IncidentListing>, AppError>;
    /// Appends a timeline entry, failing with [`AppError::InvalidState`] if
    /// the incident is resolved at the time of the write.
    async fn append_update(
        &self,
        incident_id: IncidentId,
        message: String,
        author: UserId,
    ) -> Result<IncidentUpdate, AppError>;
    /// Timeline of an incident, oldest first.
    async fn list_updates(&self, incident_id: IncidentId) -> Result<Vec<IncidentUpdate>, AppError>;
    /// Atomically resolves an open incident, sets the owning service's
    /// status, and appends the closing timeline entry. A second resolve
    /// observes the first one and fails with [`AppError::InvalidState`].
    async fn resolve_incident(&self, resolution: ResolveIncident) -> Result<Incident, AppError>;
    /// Applies a partial update to an incident's descriptive fields. When
    /// `allow_resolved` is false the write fails with
    /// [`AppError::InvalidState`] on a resolved incident.
    async fn edit_incident(
        &self,
        id: IncidentId,
        changes: IncidentChanges,
        allow_resolved: bool,
    ) -> Result<Incident, AppError>;
    /// Sets the public visibility flag.
    async fn set_published(&self, id: IncidentId, is_published: bool)
    -> Result<Incident, AppError>;
    /// Removes an incident together with its timeline.
    async fn delete_incident(&self, id: IncidentId) -> Result<(), AppError>;

    /// Appends an audit entry.
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError>;
    /// Most recent audit entries, newest first.
    async fn list_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AppError>;
}
