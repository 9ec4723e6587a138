//! Service registry: the catalog of monitored services.

use std::sync::Arc;

use serde_json::json;

use crate::domain::policy::{self, Action};
use crate::domain::{
    AuditAction, EntityType, MonitoredService, NewAuditEntry, ServiceId, ServiceStatus, User,
};
use crate::error::AppError;
use crate::persistence::{IncidentFilter, IncidentListing, NewService, ServiceChanges, Store};
use crate::service::AuditService;
use crate::validation;

/// Number of recent incidents returned with a single service.
pub const SERVICE_RECENT_INCIDENTS: i64 = 10;

/// Maximum service name length, in characters.
pub const MAX_SERVICE_NAME_LEN: usize = 100;

/// Fields for registering a service.
#[derive(Debug, Clone, Default)]
pub struct ServiceDraft {
    /// Display name. Duplicates are allowed.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Initial status; defaults to up.
    pub status: Option<ServiceStatus>,
}

/// Partial update of a service's descriptive fields.
#[derive(Debug, Clone, Default)]
pub struct ServicePatch {
    /// New display name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// A service with its most recent incidents.
#[derive(Debug, Clone)]
pub struct ServiceDetail {
    /// The service.
    pub service: MonitoredService,
    /// Up to [`SERVICE_RECENT_INCIDENTS`] incidents, newest first.
    pub recent_incidents: Vec<IncidentListing>,
}

/// Registry operations.
#[derive(Debug, Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl CatalogService {
    /// Creates the registry over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Registers a service. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins and
    /// [`AppError::Validation`] for a blank or overlong name.
    pub async fn create_service(
        &self,
        actor: &User,
        draft: ServiceDraft,
    ) -> Result<MonitoredService, AppError> {
        policy::ensure(actor.role, Action::CreateService)?;
        let name = check_name(&draft.name)?;
        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();

        let service = self
            .store
            .insert_service(NewService {
                name,
                description,
                status: draft.status.unwrap_or_default(),
                created_by: Some(actor.id),
            })
            .await?;
        tracing::info!(service_id = %service.id, actor = %actor.id, "service created");

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::CreateService,
                    EntityType::Service,
                    service.id,
                )
                .with_details(json!({ "name": service.name, "status": service.status })),
            )
            .await;
        Ok(service)
    }

    /// All services, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] on storage failure.
    pub async fn list_services(&self, actor: &User) -> Result<Vec<MonitoredService>, AppError> {
        policy::ensure(actor.role, Action::ViewServices)?;
        self.store.list_services().await
    }

    /// One service with its recent incidents.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id.
    pub async fn get_service(&self, actor: &User, id: ServiceId) -> Result<ServiceDetail, AppError> {
        policy::ensure(actor.role, Action::ViewServices)?;
        let service = self.find(id).await?;
        let recent_incidents = self
            .store
            .list_incidents(&IncidentFilter {
                service_id: Some(id),
                limit: Some(SERVICE_RECENT_INCIDENTS),
                ..IncidentFilter::default()
            })
            .await?;
        Ok(ServiceDetail {
            service,
            recent_incidents,
        })
    }

    /// Changes name and/or description. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when no field is given or a field
    /// is blank, and [`AppError::NotFound`] for an unknown id.
    pub async fn update_service(
        &self,
        actor: &User,
        id: ServiceId,
        patch: ServicePatch,
    ) -> Result<MonitoredService, AppError> {
        policy::ensure(actor.role, Action::UpdateService)?;
        if patch.name.is_none() && patch.description.is_none() {
            return Err(AppError::validation("nothing to update"));
        }
        let name = patch.name.as_deref().map(check_name).transpose()?;
        let description = patch.description.map(|d| d.trim().to_string());

        let service = self
            .store
            .update_service(id, ServiceChanges { name, description })
            .await?;

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::UpdateService,
                    EntityType::Service,
                    service.id,
                )
                .with_details(json!({
                    "name": service.name,
                    "description": service.description,
                })),
            )
            .await;
        Ok(service)
    }

    /// Sets the status directly. Engineer or admin.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for viewers and
    /// [`AppError::NotFound`] for an unknown id.
    pub async fn update_service_status(
        &self,
        actor: &User,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<MonitoredService, AppError> {
        policy::ensure(actor.role, Action::UpdateServiceStatus)?;
        let service = self.store.set_service_status(id, status).await?;
        tracing::info!(service_id = %id, %status, actor = %actor.id, "service status set");

        self.audit
            .record(
                NewAuditEntry::new(
                    Some(actor.id),
                    AuditAction::UpdateServiceStatus,
                    EntityType::Service,
                    id,
                )
                .with_details(json!({ "new_status": status })),
            )
            .await;
        Ok(service)
    }

    /// Removes a service. Admin only; rejected while incidents reference it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the service has incidents and
    /// [`AppError::NotFound`] for an unknown id.
    pub async fn delete_service(&self, actor: &User, id: ServiceId) -> Result<(), AppError> {
        policy::ensure(actor.role, Action::DeleteService)?;
        self.store.delete_service(id).await?;
        tracing::info!(service_id = %id, actor = %actor.id, "service deleted");

        self.audit
            .record(NewAuditEntry::new(
                Some(actor.id),
                AuditAction::DeleteService,
                EntityType::Service,
                id,
            ))
            .await;
        Ok(())
    }

    async fn find(&self, id: ServiceId) -> Result<MonitoredService, AppError> {
        self.store
            .find_service(id)
            .await?
            .ok_or_else(|| AppError::NotFound("service".into()))
    }
}

fn check_name(name: &str) -> Result<String, AppError> {
    let name = validation::required("name", name)?;
    validation::check_length("name", &name, 1, MAX_SERVICE_NAME_LEN)?;
    Ok(name)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use crate::persistence::NewIncident;
    use crate::service::fixtures::Fixture;

    fn catalog(fx: &Fixture) -> CatalogService {
        CatalogService::new(fx.dyn_store(), AuditService::new(fx.dyn_store()))
    }

    fn draft(name: &str) -> ServiceDraft {
        ServiceDraft {
            name: name.into(),
            ..ServiceDraft::default()
        }
    }

    #[tokio::test]
    async fn only_admin_registers_services() {
        let fx = Fixture::new().await;
        let catalog = catalog(&fx);
        for actor in [&fx.viewer, &fx.engineer] {
            assert!(matches!(
                catalog.create_service(actor, draft("API")).await,
                Err(AppError::Forbidden { .. })
            ));
        }
        let Ok(service) = catalog.create_service(&fx.admin, draft("  API  ")).await else {
            panic!("admin create failed");
        };
        assert_eq!(service.name, "API");
        assert_eq!(service.status, ServiceStatus::Up);
        assert_eq!(service.created_by, Some(fx.admin.id));
    }

    #[tokio::test]
    async fn duplicate_names_are_allowed_and_blank_rejected() {
        let fx = Fixture::new().await;
        let catalog = catalog(&fx);
        assert!(catalog.create_service(&fx.admin, draft("DB")).await.is_ok());
        assert!(catalog.create_service(&fx.admin, draft("DB")).await.is_ok());
        assert!(matches!(
            catalog.create_service(&fx.admin, draft("   ")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn engineer_sets_status_viewer_cannot() {
        let fx = Fixture::new().await;
        let catalog = catalog(&fx);
        let Ok(service) = catalog.create_service(&fx.admin, draft("CDN")).await else {
            panic!("create failed");
        };
        assert!(matches!(
            catalog
                .update_service_status(&fx.viewer, service.id, ServiceStatus::Down)
                .await,
            Err(AppError::Forbidden { .. })
        ));
        let updated = catalog
            .update_service_status(&fx.engineer, service.id, ServiceStatus::Degraded)
            .await;
        assert_eq!(updated.ok().map(|s| s.status), Some(ServiceStatus::Degraded));
    }

    #[tokio::test]
    async fn update_requires_a_field() {
        let fx = Fixture::new().await;
        let catalog = catalog(&fx);
        let Ok(service) = catalog.create_service(&fx.admin, draft("Queue")).await else {
            panic!("create failed");
        };
        assert!(matches!(
            catalog
                .update_service(&fx.admin, service.id, ServicePatch::default())
                .await,
            Err(AppError::Validation(_))
        ));
        let patch = ServicePatch {
            description: Some("async jobs".into()),
            ..ServicePatch::default()
        };
        let updated = catalog.update_service(&fx.admin, service.id, patch).await;
        let Ok(updated) = updated else {
            panic!("update failed");
        };
        assert_eq!(updated.name, "Queue");
        assert_eq!(updated.description, "async jobs");
    }

    #[tokio::test]
    async fn delete_is_refused_while_incidents_exist() {
        let fx = Fixture::new().await;
        let catalog = catalog(&fx);
        let Ok(service) = catalog.create_service(&fx.admin, draft("Auth")).await else {
            panic!("create failed");
        };
        let opened = fx
            .store
            .open_incident(NewIncident {
                service_id: service.id,
                title: "login errors".into(),
                description: "500 on /login".into(),
                severity: Severity::Low,
                is_published: false,
                created_by: fx.engineer.id,
                forced_service_status: None,
                opening_message: "opened".into(),
            })
            .await;
        assert!(opened.is_ok());

        assert!(matches!(
            catalog.delete_service(&fx.admin, service.id).await,
            Err(AppError::Conflict(_))
        ));

        let Ok(detail) = catalog.get_service(&fx.viewer, service.id).await else {
            panic!("get failed");
        };
        assert_eq!(detail.recent_incidents.len(), 1);
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let fx = Fixture::new().await;
        let catalog = catalog(&fx);
        assert!(matches!(
            catalog.get_service(&fx.viewer, ServiceId::new()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete_service(&fx.admin, ServiceId::new()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
