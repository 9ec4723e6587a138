//! OpenAPI document.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{auth, incidents, public, services, system, users};

/// Generated OpenAPI description of every endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "statusdesk",
        description = "Service status and incident tracking API."
    ),
    paths(
        system::health_handler,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        services::list_services,
        services::create_service,
        services::get_service,
        services::update_service,
        services::update_service_status,
        services::delete_service,
        incidents::list_incidents,
        incidents::create_incident,
        incidents::get_incident,
        incidents::update_incident,
        incidents::delete_incident,
        incidents::list_updates,
        incidents::add_update,
        incidents::resolve_incident,
        incidents::publish_incident,
        public::public_status,
        users::list_users,
        users::create_user,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::list_audit_logs,
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "System", description = "Health"),
        (name = "Auth", description = "Registration and sessions"),
        (name = "Services", description = "Service registry"),
        (name = "Incidents", description = "Incident lifecycle"),
        (name = "Public", description = "Unauthenticated status page"),
        (name = "Users", description = "User administration"),
        (name = "Audit", description = "Audit log"),
    )
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("token"))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/register",
            "/api/auth/me",
            "/api/services/{id}/status",
            "/api/incidents/{id}/resolve",
            "/api/incidents/{id}/publish",
            "/api/public/status",
            "/api/users/{id}",
            "/api/audit-logs",
        ] {
            assert!(doc.paths.get_path_item(path).is_some(), "missing {path}");
        }
    }

    #[test]
    fn security_schemes_are_declared() {
        let doc = ApiDoc::openapi();
        let schemes = doc.components.map(|c| c.security_schemes).unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
        assert!(schemes.contains_key("cookie"));
    }
}
