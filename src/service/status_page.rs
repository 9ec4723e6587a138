//! Public status projection.
//!
//! Read-only and unauthenticated. Everything is read fresh on each call;
//! unpublished incidents never appear.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    IncidentId, IncidentStatus, MonitoredService, ServiceId, ServiceStatus, Severity,
};
use crate::error::AppError;
use crate::persistence::{IncidentFilter, IncidentListing, Store};

/// A service as shown publicly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicService {
    /// Service id.
    pub id: ServiceId,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Current status.
    pub status: ServiceStatus,
}

impl From<MonitoredService> for PublicService {
    fn from(service: MonitoredService) -> Self {
        Self {
            id: service.id,
            name: service.name,
            description: service.description,
            status: service.status,
        }
    }
}

/// A published incident as shown publicly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicIncident {
    /// Incident id.
    pub id: IncidentId,
    /// Affected service.
    pub service_id: ServiceId,
    /// Name of the affected service.
    pub service_name: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Impact tier.
    pub severity: Severity,
    /// Lifecycle state.
    pub status: IncidentStatus,
    /// When the incident was opened.
    pub created_at: DateTime<Utc>,
    /// When the incident was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<IncidentListing> for PublicIncident {
    fn from(listing: IncidentListing) -> Self {
        let incident = listing.incident;
        Self {
            status: incident.status(),
            resolved_at: incident.resolution.as_ref().map(|r| r.resolved_at),
            id: incident.id,
            service_id: incident.service_id,
            service_name: listing.service_name,
            title: incident.title,
            description: incident.description,
            severity: incident.severity,
            created_at: incident.created_at,
        }
    }
}

/// The public status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublicStatus {
    /// All services, ordered by name.
    pub services: Vec<PublicService>,
    /// Most recent published incidents, newest first.
    pub recent_incidents: Vec<PublicIncident>,
    /// Worst status across all services; `up` when there are none.
    pub overall_status: ServiceStatus,
}

/// Builds [`PublicStatus`] snapshots.
#[derive(Debug, Clone)]
pub struct StatusPage {
    store: Arc<dyn Store>,
    incident_limit: i64,
}

impl StatusPage {
    /// Creates the projection. `incident_limit` caps `recent_incidents`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, incident_limit: i64) -> Self {
        Self {
            store,
            incident_limit: incident_limit.max(1),
        }
    }

    /// Current public status.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] on storage failure.
    pub async fn public_status(&self) -> Result<PublicStatus, AppError> {
        let mut services = self.store.list_services().await?;
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.created_at.cmp(&b.created_at)));
        let overall_status = ServiceStatus::overall(services.iter().map(|s| s.status));

        let recent_incidents = self
            .store
            .list_incidents(&IncidentFilter {
                published_only: true,
                limit: Some(self.incident_limit),
                ..IncidentFilter::default()
            })
            .await?
            .into_iter()
            .map(PublicIncident::from)
            .collect();

        Ok(PublicStatus {
            services: services.into_iter().map(PublicService::from).collect(),
            recent_incidents,
            overall_status,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::persistence::{MemoryStore, NewIncident, NewService, ResolveIncident};
    use proptest::prelude::*;

    async fn add_service(store: &MemoryStore, name: &str, status: ServiceStatus) -> ServiceId {
        let Ok(service) = store
            .insert_service(NewService {
                name: name.into(),
                description: String::new(),
                status,
                created_by: None,
            })
            .await
        else {
            panic!("service insert failed");
        };
        service.id
    }

    async fn add_incident(
        store: &MemoryStore,
        service_id: ServiceId,
        published: bool,
        resolved: bool,
    ) -> IncidentId {
        let author = UserId::new();
        let Ok(incident) = store
            .open_incident(NewIncident {
                service_id,
                title: "t".into(),
                description: "d".into(),
                severity: Severity::Low,
                is_published: published,
                created_by: author,
                forced_service_status: None,
                opening_message: "opened".into(),
            })
            .await
        else {
            panic!("incident insert failed");
        };
        if resolved {
            let result = store
                .resolve_incident(ResolveIncident {
                    incident_id: incident.id,
                    resolved_by: author,
                    root_cause: None,
                    prevention_notes: None,
                    service_status: ServiceStatus::Up,
                    closing_message: "resolved".into(),
                })
                .await;
            assert!(result.is_ok());
        }
        incident.id
    }

    #[tokio::test]
    async fn empty_store_is_up() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let Ok(status) = StatusPage::new(store, 10).public_status().await else {
            panic!("projection failed");
        };
        assert_eq!(status.overall_status, ServiceStatus::Up);
        assert!(status.services.is_empty());
        assert!(status.recent_incidents.is_empty());
    }

    #[tokio::test]
    async fn services_sorted_by_name_and_worst_status_wins() {
        let store = Arc::new(MemoryStore::new());
        add_service(&store, "Web", ServiceStatus::Up).await;
        add_service(&store, "API", ServiceStatus::Degraded).await;
        add_service(&store, "Mail", ServiceStatus::Up).await;

        let page = StatusPage::new(Arc::clone(&store) as Arc<dyn Store>, 10);
        let Ok(status) = page.public_status().await else {
            panic!("projection failed");
        };
        let names: Vec<&str> = status.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["API", "Mail", "Web"]);
        assert_eq!(status.overall_status, ServiceStatus::Degraded);

        let web = status.services.iter().find(|s| s.name == "Web").map(|s| s.id);
        let Some(web) = web else {
            panic!("web missing");
        };
        assert!(store.set_service_status(web, ServiceStatus::Down).await.is_ok());
        let Ok(status) = page.public_status().await else {
            panic!("projection failed");
        };
        assert_eq!(status.overall_status, ServiceStatus::Down);
    }

    #[tokio::test]
    async fn resolved_published_incident_carries_resolution_time() {
        let store = Arc::new(MemoryStore::new());
        let svc = add_service(&store, "API", ServiceStatus::Up).await;
        let id = add_incident(&store, svc, true, true).await;

        let page = StatusPage::new(Arc::clone(&store) as Arc<dyn Store>, 10);
        let Ok(status) = page.public_status().await else {
            panic!("projection failed");
        };
        let Some(incident) = status.recent_incidents.first() else {
            panic!("published incident missing");
        };
        assert_eq!(incident.id, id);
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert!(incident.resolved_at.is_some());
        assert_eq!(incident.service_name, "API");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn unpublished_incidents_never_leak(
            incidents in prop::collection::vec((any::<bool>(), any::<bool>()), 0..30),
            limit in 1i64..15,
        ) {
            let Ok(rt) = tokio::runtime::Builder::new_current_thread().build() else {
                panic!("runtime");
            };
            let (status, published_ids) = rt.block_on(async {
                let store = Arc::new(MemoryStore::new());
                let svc = add_service(&store, "API", ServiceStatus::Up).await;
                let mut published_ids = Vec::new();
                for (published, resolved) in &incidents {
                    let id = add_incident(&store, svc, *published, *resolved).await;
                    if *published {
                        published_ids.push(id);
                    }
                }
                let page = StatusPage::new(store as Arc<dyn Store>, limit);
                (page.public_status().await.ok(), published_ids)
            });
            let Some(status) = status else {
                panic!("projection failed");
            };

            let expected_len = published_ids.len().min(usize::try_from(limit).unwrap_or(0));
            prop_assert_eq!(status.recent_incidents.len(), expected_len);
            for incident in &status.recent_incidents {
                prop_assert!(published_ids.contains(&incident.id));
            }
            let newest: Vec<IncidentId> = published_ids.iter().rev().take(expected_len).copied().collect();
            let shown: Vec<IncidentId> = status.recent_incidents.iter().map(|i| i.id).collect();
            prop_assert_eq!(shown, newest);
        }

        #[test]
        fn overall_is_worst_service(statuses in prop::collection::vec(
            prop::sample::select(vec![ServiceStatus::Up, ServiceStatus::Degraded, ServiceStatus::Down]),
            0..10,
        )) {
            let expected = if statuses.contains(&ServiceStatus::Down) {
                ServiceStatus::Down
            } else if statuses.contains(&ServiceStatus::Degraded) {
                ServiceStatus::Degraded
            } else {
                ServiceStatus::Up
            };
            prop_assert_eq!(ServiceStatus::overall(statuses.iter().copied()), expected);
        }
    }
}
