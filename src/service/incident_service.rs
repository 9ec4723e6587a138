//! Incident lifecycle engine.
//!
//! An incident is opened against one service, collects timeline updates
//! while open, and is resolved exactly once. Opening applies the severity's
//! forced service status; resolving sets the service back to `up`. Both run
//! as one store transaction together with their timeline entry.

use std::sync::Arc;

use serde_json::json;

use crate::domain::policy::{self, Action};
use crate::domain::{
    AuditAction, EntityType, Incident, IncidentId, IncidentStatus, IncidentUpdate,
    NewAuditEntry, ServiceId, ServiceStatus, Severity, User,
};
use crate::error::AppError;
use crate::persistence::{
    IncidentChanges, IncidentFilter, IncidentListing, NewIncident, ResolveIncident, Store,
};
use crate::service::AuditService;
use crate::validation;

/// First timeline entry of every incident.
pub const OPENING_MESSAGE: &str = "Incident reported; investigation started.";

/// Prefix of the closing timeline entry.
pub const CLOSING_MESSAGE: &str = "Incident resolved.";

/// Maximum incident title length, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Fields for opening an incident.
#[derive(Debug, Clone)]
pub struct IncidentDraft {
    /// Affected service.
    pub service_id: ServiceId,
    /// Short summary.
    pub title: String,
    /// Longer narrative.
    pub description: String,
    /// Impact tier.
    pub severity: Severity,
}

/// Partial update of an incident's title and description.
#[derive(Debug, Clone, Default)]
pub struct IncidentPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Post-mortem fields supplied on resolve.
#[derive(Debug, Clone, Default)]
pub struct ResolutionNotes {
    /// What caused the incident.
    pub root_cause: Option<String>,
    /// What will prevent a recurrence.
    pub prevention_notes: Option<String>,
}

/// Filter accepted by [`IncidentEngine::list_incidents`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IncidentQuery {
    /// Only incidents of this service.
    pub service_id: Option<ServiceId>,
    /// Only incidents in this state.
    pub status: Option<IncidentStatus>,
    /// Only incidents of this severity.
    pub severity: Option<Severity>,
}

/// An incident with its service name and full timeline.
#[derive(Debug, Clone)]
pub struct IncidentDetail {
    /// The incident.
    pub incident: Incident,
    /// Name of the affected service.
    pub service_name: String,
    /// Timeline, oldest first.
    pub updates: Vec<IncidentUpdate>,
}

/// Incident operations.
#[derive(Debug, Clone)]
pub struct IncidentEngine {
    store: Arc<dyn Store>,
    audit: AuditService,
    publish_by_default: bool,
}

impl IncidentEngine {
    /// Creates the engine. `publish_by_default` is the initial
    /// `is_published` of new incidents.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: AuditService, publish_by_default: bool) -> Self {
        Self {
            store,
            audit,
            publish_by_default,
        }
    }

    /// Opens an incident and applies its severity to the service.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for viewers,
    /// [`AppError::Validation`] for blank fields, and
    /// [`AppError::NotFound`] for an unknown service.
    pub async fn create_incident(
        &self,
        actor: &User,
        draft: IncidentDraft,
    ) -> Result<Incident, AppError> {
        policy::ensure(actor.role, Action::CreateIncident)?;
        let title = check_title(&draft.title)?;
        let description = validation::required("description", &draft.description)?;
        let forced = draft.severity.forced_service_status();

        let incident = self
            .store
            .open_incident(NewIncident {
                service_id: draft.service_id,
                title,
                description,
                severity: draft.severity,
                is_published: self.publish_by_default,
                created_by: actor.id,
                forced_service_status: forced,
                opening_message: OPENING_MESSAGE.to_string(),
            })
            .await?;
        tracing::info!(
            incident_id = %incident.id,
            service_id = %incident.service_id,
            severity = %incident.severity,
            actor = %actor.id,
            "incident opened"
        );

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::CreateIncident,
                    EntityType::Incident,
                    incident.id,
                )
                .with_details(json!({
                    "service_id": incident.service_id,
                    "severity": incident.severity,
                    "service_status": forced,
                })),
            )
            .await;
        Ok(incident)
    }

    /// Appends a timeline update to an open incident.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a blank message,
    /// [`AppError::NotFound`] for an unknown incident, and
    /// [`AppError::InvalidState`] once the incident is resolved.
    pub async fn add_update(
        &self,
        actor: &User,
        id: IncidentId,
        message: &str,
    ) -> Result<IncidentUpdate, AppError> {
        policy::ensure(actor.role, Action::AddIncidentUpdate)?;
        let message = validation::required("message", message)?;
        let update = self.store.append_update(id, message, actor.id).await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::AddIncidentUpdate,
                    EntityType::Incident,
                    id,
                )
                .with_details(json!({ "update_id": update.id })),
            )
            .await;
        Ok(update)
    }

    /// Resolves an open incident and sets its service to `up`.
    ///
    /// The service goes `up` even if other incidents on it are still open.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown incident and
    /// [`AppError::InvalidState`] if it is already resolved.
    pub async fn resolve(
        &self,
        actor: &User,
        id: IncidentId,
        notes: ResolutionNotes,
    ) -> Result<Incident, AppError> {
        policy::ensure(actor.role, Action::ResolveIncident)?;
        let root_cause = non_blank(notes.root_cause);
        let prevention_notes = non_blank(notes.prevention_notes);
        let closing_message = match &root_cause {
            Some(cause) => format!("{CLOSING_MESSAGE} Root cause: {cause}"),
            None => CLOSING_MESSAGE.to_string(),
        };

        let incident = self
            .store
            .resolve_incident(ResolveIncident {
                incident_id: id,
                resolved_by: actor.id,
                root_cause,
                prevention_notes,
                service_status: ServiceStatus::Up,
                closing_message,
            })
            .await?;
        tracing::info!(
            incident_id = %id,
            service_id = %incident.service_id,
            actor = %actor.id,
            "incident resolved"
        );

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::ResolveIncident,
                    EntityType::Incident,
                    id,
                )
                .with_details(json!({ "service_id": incident.service_id })),
            )
            .await;
        Ok(incident)
    }

    /// Sets public visibility. Admin only; leaves the service untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins and
    /// [`AppError::NotFound`] for an unknown incident.
    pub async fn set_published(
        &self,
        actor: &User,
        id: IncidentId,
        is_published: bool,
    ) -> Result<Incident, AppError> {
        policy::ensure(actor.role, Action::TogglePublish)?;
        let incident = self.store.set_published(id, is_published).await?;
        tracing::info!(incident_id = %id, is_published, actor = %actor.id, "publish flag set");

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::TogglePublish,
                    EntityType::Incident,
                    id,
                )
                .with_details(json!({ "is_published": is_published })),
            )
            .await;
        Ok(incident)
    }

    /// Changes title and/or description. Resolved incidents need an admin.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when no field is given or a field
    /// is blank, [`AppError::Forbidden`] when the role may not edit the
    /// incident in its current state, and [`AppError::NotFound`] for an
    /// unknown incident.
    pub async fn edit_incident(
        &self,
        actor: &User,
        id: IncidentId,
        patch: IncidentPatch,
    ) -> Result<Incident, AppError> {
        policy::ensure(actor.role, Action::EditIncident)?;
        if patch.title.is_none() && patch.description.is_none() {
            return Err(AppError::validation("nothing to update"));
        }
        let title = patch.title.as_deref().map(check_title).transpose()?;
        let description = validation::optional("description", patch.description.as_deref())?;

        let current = self.find(id).await?;
        if current.is_resolved() {
            policy::ensure(actor.role, Action::EditResolvedIncident)?;
        }
        let allow_resolved = policy::authorize(actor.role, Action::EditResolvedIncident).is_allowed();

        let incident = self
            .store
            .edit_incident(id, IncidentChanges { title, description }, allow_resolved)
            .await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::UpdateIncident,
                    EntityType::Incident,
                    id,
                )
                .with_details(json!({
                    "title": incident.title,
                    "status": incident.status(),
                })),
            )
            .await;
        Ok(incident)
    }

    /// Removes an incident and its timeline. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins and
    /// [`AppError::NotFound`] for an unknown incident.
    pub async fn delete_incident(&self, actor: &User, id: IncidentId) -> Result<(), AppError> {
        policy::ensure(actor.role, Action::DeleteIncident)?;
        self.store.delete_incident(id).await?;
        tracing::info!(incident_id = %id, actor = %actor.id, "incident deleted");

        self.audit
            .record(NewAuditEntry::new(
                Some(actor.id),
                AuditAction::DeleteIncident,
                EntityType::Incident,
                id,
            ))
            .await;
        Ok(())
    }

    /// Incidents matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] on storage failure.
    pub async fn list_incidents(
        &self,
        actor: &User,
        query: IncidentQuery,
    ) -> Result<Vec<IncidentListing>, AppError> {
        policy::ensure(actor.role, Action::ViewIncidents)?;
        self.store
            .list_incidents(&IncidentFilter {
                service_id: query.service_id,
                status: query.status,
                severity: query.severity,
                ..IncidentFilter::default()
            })
            .await
    }

    /// One incident with its timeline.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown incident.
    pub async fn get_incident(
        &self,
        actor: &User,
        id: IncidentId,
    ) -> Result<IncidentDetail, AppError> {
        policy::ensure(actor.role, Action::ViewIncidents)?;
        let incident = self.find(id).await?;
        let service_name = self
            .store
            .find_service(incident.service_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default();
        let updates = self.store.list_updates(id).await?;
        Ok(IncidentDetail {
            incident,
            service_name,
            updates,
        })
    }

    /// Timeline of one incident, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown incident.
    pub async fn list_updates(
        &self,
        actor: &User,
        id: IncidentId,
    ) -> Result<Vec<IncidentUpdate>, AppError> {
        policy::ensure(actor.role, Action::ViewIncidents)?;
        self.find(id).await?;
        self.store.list_updates(id).await
    }

    async fn find(&self, id: IncidentId) -> Result<Incident, AppError> {
        self.store
            .find_incident(id)
            .await?
            .ok_or_else(|| AppError::NotFound("incident".into()))
    }
}

fn check_title(title: &str) -> Result<String, AppError> {
    let title = validation::required("title", title)?;
    validation::check_length("title", &title, 1, MAX_TITLE_LEN)?;
    Ok(title)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
