//! Service layer: authorization, validation, and lifecycle orchestration.
//!
//! Every operation takes the acting [`crate::domain::User`], checks the
//! policy first, validates input, performs the store call, and records the
//! audit entry after the change has committed.

pub mod audit_service;
pub mod catalog_service;
pub mod incident_service;
pub mod status_page;
pub mod user_service;

pub use audit_service::AuditService;
pub use catalog_service::{CatalogService, ServiceDetail, ServiceDraft, ServicePatch};
pub use incident_service::{
    IncidentDetail, IncidentDraft, IncidentEngine, IncidentPatch, IncidentQuery, ResolutionNotes,
};
pub use status_page::{PublicIncident, PublicService, PublicStatus, StatusPage};
pub use user_service::{UserPatch, UserService};

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use crate::domain::{Role, User};
    use crate::persistence::{MemoryStore, NewUser, Store};

    /// One user per role on a fresh in-memory store.
    pub(crate) struct Fixture {
        pub(crate) store: Arc<MemoryStore>,
        pub(crate) viewer: User,
        pub(crate) engineer: User,
        pub(crate) admin: User,
    }

    impl Fixture {
        pub(crate) async fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let viewer = insert(&store, Role::Viewer).await;
            let engineer = insert(&store, Role::Engineer).await;
            let admin = insert(&store, Role::Admin).await;
            Self {
                store,
                viewer,
                engineer,
                admin,
            }
        }

        pub(crate) fn dyn_store(&self) -> Arc<dyn Store> {
            Arc::clone(&self.store) as Arc<dyn Store>
        }
    }

    async fn insert(store: &MemoryStore, role: Role) -> User {
        let Ok(user) = store
            .insert_user(NewUser {
                username: role.as_str().to_string(),
                email: format!("{}@example.com", role.as_str()),
                password_hash: "unused".into(),
                role,
            })
            .await
        else {
            panic!("fixture user insert failed");
        };
        user
    }
}
