//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::{AuthService, TokenIssuer};
use crate::config::AppConfig;
use crate::persistence::Store;
use crate::service::{AuditService, CatalogService, IncidentEngine, StatusPage, UserService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Storage handle shared by every service.
    pub store: Arc<dyn Store>,
    /// Registration, login, and token validation.
    pub auth: AuthService,
    /// Audit recorder and reader.
    pub audit: AuditService,
    /// Service registry.
    pub catalog: CatalogService,
    /// Incident lifecycle engine.
    pub incidents: IncidentEngine,
    /// Public status projection.
    pub status_page: StatusPage,
    /// User administration.
    pub users: UserService,
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wires every service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        let audit = AuditService::new(Arc::clone(&store));
        let tokens = TokenIssuer::new(&config.auth);
        Self {
            auth: AuthService::new(Arc::clone(&store), tokens, audit.clone()),
            catalog: CatalogService::new(Arc::clone(&store), audit.clone()),
            incidents: IncidentEngine::new(
                Arc::clone(&store),
                audit.clone(),
                config.publish_incidents_by_default,
            ),
            status_page: StatusPage::new(Arc::clone(&store), config.public_incident_limit),
            users: UserService::new(Arc::clone(&store), audit.clone()),
            audit,
            store,
            config: Arc::new(config),
        }
    }
}
