//! In-memory implementation of the persistence layer.
//!
//! Used when `PERSISTENCE_ENABLED=false` and by the test suites. All state
//! sits behind one `tokio::sync::RwLock`. Composite operations run against a
//! staged copy of the state while holding the write lock; the copy replaces
//! the live state only when every step succeeded, which gives the same
//! all-or-nothing behavior as a database transaction.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    Credentials, IncidentChanges, IncidentFilter, IncidentListing, NewIncident, NewService,
    NewUser, ResolveIncident, ServiceChanges, Store, UserChanges, UserFilter,
};
use crate::domain::{
    AuditLogEntry, Incident, IncidentId, IncidentUpdate, MonitoredService, NewAuditEntry,
    Resolution, ServiceId, ServiceStatus, User, UserId,
};
use crate::error::AppError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<Credentials>,
    services: Vec<MonitoredService>,
    incidents: Vec<Incident>,
    updates: Vec<IncidentUpdate>,
    audit: Vec<AuditLogEntry>,
    next_update_id: i64,
    next_audit_id: i64,
}

impl MemoryState {
    fn user_mut(&mut self, id: UserId) -> Result<&mut Credentials, AppError> {
        self.users
            .iter_mut()
            .find(|c| c.user.id == id)
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    fn service_mut(&mut self, id: ServiceId) -> Result<&mut MonitoredService, AppError> {
        self.services
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound("service".into()))
    }

    fn incident_mut(&mut self, id: IncidentId) -> Result<&mut Incident, AppError> {
        self.incidents
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound("incident".into()))
    }

    fn ensure_unique_user(
        &self,
        except: Option<UserId>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), AppError> {
        let clash = self.users.iter().any(|c| {
            Some(c.user.id) != except
                && (username == Some(c.user.username.as_str())
                    || email == Some(c.user.email.as_str()))
        });
        if clash {
            return Err(AppError::Conflict("username or email already in use".into()));
        }
        Ok(())
    }

    fn set_service_status(
        &mut self,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<MonitoredService, AppError> {
        let service = self.service_mut(id)?;
        service.status = status;
        service.updated_at = Utc::now();
        Ok(service.clone())
    }

    fn push_update(
        &mut self,
        incident_id: IncidentId,
        message: String,
        author: UserId,
    ) -> IncidentUpdate {
        self.next_update_id += 1;
        let update = IncidentUpdate {
            id: self.next_update_id,
            incident_id,
            message,
            created_by: Some(author),
            created_at: Utc::now(),
        };
        self.updates.push(update.clone());
        update
    }

    fn service_name(&self, id: ServiceId) -> String {
        self.services
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }
}

/// In-memory [`Store`].
///
/// Carries two fault switches so tests can exercise rollback and
/// best-effort audit paths without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_timeline_writes: AtomicBool,
    fail_audit_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every timeline write fail with [`AppError::Server`] while set.
    /// Composite operations that include a timeline write roll back.
    pub fn fail_timeline_writes(&self, fail: bool) {
        self.fail_timeline_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every audit write fail with [`AppError::Server`] while set.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    fn timeline_fault(&self) -> Result<(), AppError> {
        if self.fail_timeline_writes.load(Ordering::SeqCst) {
            return Err(AppError::Server("timeline write failed".into()));
        }
        Ok(())
    }

    /// Runs `op` on a staged copy and publishes it only on success.
    async fn transact<T>(
        &self,
        op: impl FnOnce(&mut MemoryState) -> Result<T, AppError> + Send,
    ) -> Result<T, AppError> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let out = op(&mut staged)?;
        *state = staged;
        Ok(out)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        state.ensure_unique_user(None, Some(user.username.as_str()), Some(user.email.as_str()))?;
        let now = Utc::now();
        let stored = Credentials {
            user: User {
                id: UserId::new(),
                username: user.username,
                email: user.email,
                role: user.role,
                created_at: now,
                updated_at: now,
            },
            password_hash: user.password_hash,
        };
        let created = stored.user.clone();
        state.users.push(stored);
        Ok(created)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|c| c.user.id == id)
            .map(|c| c.user.clone()))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, AppError> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|c| c.user.email == email).cloned())
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, AppError> {
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .rev()
            .map(|c| &c.user)
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    u.username.to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect())
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, AppError> {
        self.transact(move |state| {
            state.user_mut(id)?;
            state.ensure_unique_user(
                Some(id),
                changes.username.as_deref(),
                changes.email.as_deref(),
            )?;
            let stored = state.user_mut(id)?;
            if let Some(username) = changes.username {
                stored.user.username = username;
            }
            if let Some(email) = changes.email {
                stored.user.email = email;
            }
            if let Some(hash) = changes.password_hash {
                stored.password_hash = hash;
            }
            if let Some(role) = changes.role {
                stored.user.role = role;
            }
            stored.user.updated_at = Utc::now();
            Ok(stored.user.clone())
        })
        .await
    }

    async fn delete_user(&self, id: UserId) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|c| c.user.id != id);
        if state.users.len() == before {
            return Err(AppError::NotFound("user".into()));
        }
        Ok(())
    }

    async fn insert_service(&self, service: NewService) -> Result<MonitoredService, AppError> {
        let now = Utc::now();
        let created = MonitoredService {
            id: ServiceId::new(),
            name: service.name,
            description: service.description,
            status: service.status,
            created_by: service.created_by,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.services.push(created.clone());
        Ok(created)
    }

    async fn find_service(&self, id: ServiceId) -> Result<Option<MonitoredService>, AppError> {
        let state = self.state.read().await;
        Ok(state.services.iter().find(|s| s.id == id).cloned())
    }

    async fn list_services(&self) -> Result<Vec<MonitoredService>, AppError> {
        let state = self.state.read().await;
        Ok(state.services.iter().rev().cloned().collect())
    }

    async fn update_service(
        &self,
        id: ServiceId,
        changes: ServiceChanges,
    ) -> Result<MonitoredService, AppError> {
        let mut state = self.state.write().await;
        let service = state.service_mut(id)?;
        if let Some(name) = changes.name {
            service.name = name;
        }
        if let Some(description) = changes.description {
            service.description = description;
        }
        service.updated_at = Utc::now();
        Ok(service.clone())
    }

    async fn set_service_status(
        &self,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<MonitoredService, AppError> {
        self.state.write().await.set_service_status(id, status)
    }

    async fn delete_service(&self, id: ServiceId) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.service_mut(id)?;
        let incidents = state
            .incidents
            .iter()
            .filter(|i| i.service_id == id)
            .count();
        if incidents > 0 {
            return Err(AppError::Conflict(format!(
                "cannot delete service with {incidents} existing incident(s)"
            )));
        }
        state.services.retain(|s| s.id != id);
        Ok(())
    }

    async fn open_incident(&self, incident: NewIncident) -> Result<Incident, AppError> {
        let fault = self.timeline_fault();
        self.transact(move |state| {
            state.service_mut(incident.service_id)?;

            let now = Utc::now();
            let created = Incident {
                id: IncidentId::new(),
                service_id: incident.service_id,
                title: incident.title,
                description: incident.description,
                severity: incident.severity,
                is_published: incident.is_published,
                created_by: Some(incident.created_by),
                resolution: None,
                created_at: now,
                updated_at: now,
            };
            state.incidents.push(created.clone());

            if let Some(status) = incident.forced_service_status {
                state.set_service_status(incident.service_id, status)?;
            }

            fault?;
            state.push_update(created.id, incident.opening_message, incident.created_by);
            Ok(created)
        })
        .await
    }

    async fn find_incident(&self, id: IncidentId) -> Result<Option<Incident>, AppError> {
        let state = self.state.read().await;
        Ok(state.incidents.iter().find(|i| i.id == id).cloned())
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
    ) -> Result<Vec<IncidentListing>, AppError> {
        let state = self.state.read().await;
        let limit = filter
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        Ok(state
            .incidents
            .iter()
            .rev()
            .filter(|i| filter.service_id.is_none_or(|id| i.service_id == id))
            .filter(|i| filter.status.is_none_or(|s| i.status() == s))
            .filter(|i| filter.severity.is_none_or(|s| i.severity == s))
            .filter(|i| !filter.published_only || i.is_published)
            .take(limit)
            .map(|i| IncidentListing {
                incident: i.clone(),
                service_name: state.service_name(i.service_id),
            })
            .collect())
    }

    async fn append_update(
        &self,
        incident_id: IncidentId,
        message: String,
        author: UserId,
    ) -> Result<IncidentUpdate, AppError> {
        let fault = self.timeline_fault();
        self.transact(move |state| {
            let incident = state.incident_mut(incident_id)?;
            incident.ensure_open("add an update to")?;
            incident.updated_at = Utc::now();
            fault?;
            Ok(state.push_update(incident_id, message, author))
        })
        .await
    }

    async fn list_updates(&self, incident_id: IncidentId) -> Result<Vec<IncidentUpdate>, AppError> {
        let state = self.state.read().await;
        let mut updates: Vec<IncidentUpdate> = state
            .updates
            .iter()
            .filter(|u| u.incident_id == incident_id)
            .cloned()
            .collect();
        updates.sort_by_key(|u| (u.created_at, u.id));
        Ok(updates)
    }

    async fn resolve_incident(&self, resolution: ResolveIncident) -> Result<Incident, AppError> {
        let fault = self.timeline_fault();
        self.transact(move |state| {
            let incident = state.incident_mut(resolution.incident_id)?;
            if incident.is_resolved() {
                return Err(AppError::InvalidState("incident is already resolved".into()));
            }
            let now = Utc::now();
            incident.resolution = Some(Resolution {
                resolved_by: resolution.resolved_by,
                resolved_at: now,
                root_cause: resolution.root_cause,
                prevention_notes: resolution.prevention_notes,
            });
            incident.updated_at = now;
            let resolved = incident.clone();

            state.set_service_status(resolved.service_id, resolution.service_status)?;

            fault?;
            state.push_update(
                resolved.id,
                resolution.closing_message,
                resolution.resolved_by,
            );
            Ok(resolved)
        })
        .await
    }

    async fn edit_incident(
        &self,
        id: IncidentId,
        changes: IncidentChanges,
        allow_resolved: bool,
    ) -> Result<Incident, AppError> {
        let mut state = self.state.write().await;
        let incident = state.incident_mut(id)?;
        if !allow_resolved {
            incident.ensure_open("edit")?;
        }
        if let Some(title) = changes.title {
            incident.title = title;
        }
        if let Some(description) = changes.description {
            incident.description = description;
        }
        incident.updated_at = Utc::now();
        Ok(incident.clone())
    }

    async fn set_published(
        &self,
        id: IncidentId,
        is_published: bool,
    ) -> Result<Incident, AppError> {
        let mut state = self.state.write().await;
        let incident = state.incident_mut(id)?;
        incident.is_published = is_published;
        incident.updated_at = Utc::now();
        Ok(incident.clone())
    }

    async fn delete_incident(&self, id: IncidentId) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.incident_mut(id)?;
        state.incidents.retain(|i| i.id != id);
        state.updates.retain(|u| u.incident_id != id);
        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(AppError::Server("audit write failed".into()));
        }
        let mut state = self.state.write().await;
        state.next_audit_id += 1;
        let stored = AuditLogEntry {
            id: state.next_audit_id,
            actor_id: entry.actor_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        state.audit.push(stored.clone());
        Ok(stored)
    }

    async fn list_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AppError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let state = self.state.read().await;
        Ok(state.audit.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{IncidentStatus, Role, Severity};

    async fn seeded() -> (MemoryStore, UserId, MonitoredService) {
        let store = MemoryStore::new();
        let Ok(user) = store
            .insert_user(NewUser {
                username: "oncall".into(),
                email: "oncall@example.com".into(),
                password_hash: "hash".into(),
                role: Role::Engineer,
            })
            .await
        else {
            panic!("insert user failed");
        };
        let Ok(service) = store
            .insert_service(NewService {
                name: "API".into(),
                description: String::new(),
                status: ServiceStatus::Up,
                created_by: Some(user.id),
            })
            .await
        else {
            panic!("insert service failed");
        };
        (store, user.id, service)
    }

    fn new_incident(service_id: ServiceId, author: UserId) -> NewIncident {
        NewIncident {
            service_id,
            title: "errors".into(),
            description: "5xx spike".into(),
            severity: Severity::High,
            is_published: false,
            created_by: author,
            forced_service_status: Some(ServiceStatus::Down),
            opening_message: "Incident created with severity: high".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (store, _, _) = seeded().await;
        let result = store
            .insert_user(NewUser {
                username: "other".into(),
                email: "oncall@example.com".into(),
                password_hash: "hash".into(),
                role: Role::Viewer,
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn failed_timeline_write_rolls_back_open() {
        let (store, author, service) = seeded().await;
        store.fail_timeline_writes(true);

        let result = store.open_incident(new_incident(service.id, author)).await;
        assert!(matches!(result, Err(AppError::Server(_))));

        let Ok(incidents) = store.list_incidents(&IncidentFilter::default()).await else {
            panic!("list failed");
        };
        assert!(incidents.is_empty());
        let Ok(Some(after)) = store.find_service(service.id).await else {
            panic!("service vanished");
        };
        assert_eq!(after.status, ServiceStatus::Up);
    }

    #[tokio::test]
    async fn failed_timeline_write_rolls_back_resolve() {
        let (store, author, service) = seeded().await;
        let Ok(incident) = store.open_incident(new_incident(service.id, author)).await else {
            panic!("open failed");
        };

        store.fail_timeline_writes(true);
        let result = store
            .resolve_incident(ResolveIncident {
                incident_id: incident.id,
                resolved_by: author,
                root_cause: None,
                prevention_notes: None,
                service_status: ServiceStatus::Up,
                closing_message: "Incident resolved".into(),
            })
            .await;
        assert!(result.is_err());

        let Ok(Some(still_open)) = store.find_incident(incident.id).await else {
            panic!("incident vanished");
        };
        assert_eq!(still_open.status(), IncidentStatus::Open);
        let Ok(Some(svc)) = store.find_service(service.id).await else {
            panic!("service vanished");
        };
        assert_eq!(svc.status, ServiceStatus::Down);
        let Ok(updates) = store.list_updates(incident.id).await else {
            panic!("updates failed");
        };
        assert_eq!(updates.len(), 1);
    }

    #[tokio::test]
    async fn delete_incident_cascades_timeline() {
        let (store, author, service) = seeded().await;
        let Ok(incident) = store.open_incident(new_incident(service.id, author)).await else {
            panic!("open failed");
        };
        assert!(store.delete_incident(incident.id).await.is_ok());
        let Ok(updates) = store.list_updates(incident.id).await else {
            panic!("updates failed");
        };
        assert!(updates.is_empty());
        assert!(store.delete_service(service.id).await.is_ok());
    }

    #[tokio::test]
    async fn list_filters_and_limits() {
        let (store, author, service) = seeded().await;
        for published in [true, false, true] {
            let mut new = new_incident(service.id, author);
            new.is_published = published;
            assert!(store.open_incident(new).await.is_ok());
        }

        let filter = IncidentFilter {
            published_only: true,
            limit: Some(1),
            ..IncidentFilter::default()
        };
        let Ok(listed) = store.list_incidents(&filter).await else {
            panic!("list failed");
        };
        assert_eq!(listed.len(), 1);
        assert!(listed.iter().all(|l| l.incident.is_published));
        assert!(listed.iter().all(|l| l.service_name == "API"));
    }
}
