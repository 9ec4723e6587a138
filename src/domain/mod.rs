//! Domain layer: entities, closed value sets, and the authorization policy.
//!
//! Nothing in here performs I/O. Lifecycle rules that only depend on a
//! single value (severity → service status, open/resolved checks, the
//! overall status derivation) live next to the types they constrain.

pub mod audit;
pub mod ids;
pub mod incident;
pub mod monitored_service;
pub mod policy;
pub mod user;

pub use audit::{AuditAction, AuditLogEntry, EntityType, NewAuditEntry};
pub use ids::{IncidentId, ServiceId, UserId};
pub use incident::{Incident, IncidentStatus, IncidentUpdate, Resolution, Severity};
pub use monitored_service::{MonitoredService, ServiceStatus};
pub use policy::{Action, Decision};
pub use user::{Role, User};
