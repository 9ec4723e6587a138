//! Router-level tests over the in-memory store.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use statusdesk::api;
use statusdesk::app_state::AppState;
use statusdesk::config::AppConfig;
use statusdesk::persistence::{MemoryStore, Store};

const SECRET: &str = "router-test-secret-0123456789abcdef";

fn app() -> Router {
    let store = Arc::new(MemoryStore::new()) as Arc<dyn Store>;
    api::build_router().with_state(AppState::new(store, AppConfig::new(SECRET)))
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let Ok(request) = builder.body(body) else {
        panic!("request build failed");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    let status = response.status();
    let headers = response.headers().clone();
    let Ok(collected) = response.into_body().collect().await else {
        panic!("body read failed");
    };
    let bytes = collected.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Reply {
        status,
        headers,
        body,
    }
}

async fn register(app: &Router, name: &str, role: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": name,
            "email": format!("{name}@example.com"),
            "password": "correct-horse",
            "role": role,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    let Some(token) = reply.body["token"].as_str() else {
        panic!("token missing: {}", reply.body);
    };
    token.to_string()
}

fn id_of(reply: &Reply) -> String {
    let Some(id) = reply.body["data"]["id"].as_str() else {
        panic!("id missing: {}", reply.body);
    };
    id.to_string()
}

#[tokio::test]
async fn health_reports_store() {
    let app = app();
    let reply = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "healthy");
    assert_eq!(reply.body["store"], "reachable");
}

#[tokio::test]
async fn register_sets_cookie_and_me_accepts_it() {
    let app = app();
    let reply = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "correct-horse",
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["user"]["role"], "viewer");
    assert!(reply.body["user"].get("password_hash").is_none());

    let Some(cookie) = reply
        .headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
    else {
        panic!("no cookie set");
    };
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));

    let Some(pair) = cookie.split(';').next() else {
        panic!("malformed cookie");
    };
    let Ok(request) = Request::builder()
        .uri("/api/auth/me")
        .header(header::COOKIE, pair)
        .body(Body::empty())
    else {
        panic!("request build failed");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_and_bad_tokens_are_unauthorized() {
    let app = app();
    let reply = send(&app, Method::GET, "/api/services", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["message"], "access denied: no token provided");

    let reply = send(&app, Method::GET, "/api/auth/me", Some("not-a-jwt"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "invalid token");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app();
    register(&app, "grace", "viewer").await;

    let wrong_password = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "grace@example.com", "password": "wrong-password" })),
    )
    .await;
    let unknown_email = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status, unknown_email.status);
    assert_eq!(wrong_password.body, unknown_email.body);

    let ok = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "grace@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["user"]["username"], "grace");
}

#[tokio::test]
async fn forbidden_discloses_roles() {
    let app = app();
    let viewer = register(&app, "vera", "viewer").await;
    let reply = send(
        &app,
        Method::POST,
        "/api/services",
        Some(&viewer),
        Some(json!({ "name": "API" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["data"]["required_roles"], json!(["admin"]));
    assert_eq!(reply.body["data"]["user_role"], "viewer");
}

#[tokio::test]
async fn malformed_input_uses_the_envelope() {
    let app = app();
    let admin = register(&app, "root", "admin").await;

    let Ok(request) = Request::builder()
        .method(Method::POST)
        .uri("/api/services")
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
    else {
        panic!("request build failed");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let reply = send(&app, Method::GET, "/api/services/not-a-uuid", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);

    let reply = send(
        &app,
        Method::PATCH,
        "/api/services/00000000-0000-0000-0000-000000000000/status",
        Some(&admin),
        Some(json!({ "status": "sideways" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, Method::GET, "/api/incidents?severity=apocalyptic", Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn incident_lifecycle_drives_service_status() {
    let app = app();
    let admin = register(&app, "root", "admin").await;
    let engineer = register(&app, "eng", "engineer").await;

    let service = send(
        &app,
        Method::POST,
        "/api/services",
        Some(&admin),
        Some(json!({ "name": "Checkout", "description": "payments" })),
    )
    .await;
    assert_eq!(service.status, StatusCode::CREATED);
    assert_eq!(service.body["data"]["status"], "up");
    let service_id = id_of(&service);

    let incident = send(
        &app,
        Method::POST,
        "/api/incidents",
        Some(&engineer),
        Some(json!({
            "service_id": service_id,
            "title": "Checkout failing",
            "description": "card payments time out",
            "severity": "high",
        })),
    )
    .await;
    assert_eq!(incident.status, StatusCode::CREATED, "{}", incident.body);
    assert_eq!(incident.body["data"]["status"], "open");
    assert_eq!(incident.body["data"]["is_published"], false);
    let incident_id = id_of(&incident);

    let svc = send(&app, Method::GET, &format!("/api/services/{service_id}"), Some(&engineer), None).await;
    assert_eq!(svc.body["data"]["status"], "down");
    assert_eq!(svc.body["data"]["recent_incidents"][0]["id"], incident_id.as_str());

    let update = send(
        &app,
        Method::POST,
        &format!("/api/incidents/{incident_id}/updates"),
        Some(&engineer),
        Some(json!({ "message": "rolling back deploy" })),
    )
    .await;
    assert_eq!(update.status, StatusCode::CREATED);

    let resolved = send(
        &app,
        Method::PATCH,
        &format!("/api/incidents/{incident_id}/resolve"),
        Some(&engineer),
        Some(json!({ "root_cause": "bad deploy" })),
    )
    .await;
    assert_eq!(resolved.status, StatusCode::OK, "{}", resolved.body);
    assert_eq!(resolved.body["data"]["status"], "resolved");
    assert!(resolved.body["data"]["resolved_at"].is_string());
    assert!(resolved.body["data"]["resolved_by"].is_string());

    let again = send(
        &app,
        Method::PATCH,
        &format!("/api/incidents/{incident_id}/resolve"),
        Some(&engineer),
        None,
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let late = send(
        &app,
        Method::POST,
        &format!("/api/incidents/{incident_id}/updates"),
        Some(&engineer),
        Some(json!({ "message": "too late" })),
    )
    .await;
    assert_eq!(late.status, StatusCode::CONFLICT);

    let svc = send(&app, Method::GET, &format!("/api/services/{service_id}"), Some(&engineer), None).await;
    assert_eq!(svc.body["data"]["status"], "up");

    let detail = send(&app, Method::GET, &format!("/api/incidents/{incident_id}"), Some(&engineer), None).await;
    let Some(updates) = detail.body["data"]["updates"].as_array() else {
        panic!("updates missing: {}", detail.body);
    };
    let messages: Vec<&str> = updates.iter().filter_map(|u| u["message"].as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Incident reported; investigation started.",
            "rolling back deploy",
            "Incident resolved. Root cause: bad deploy",
        ]
    );

    let audit = send(&app, Method::GET, "/api/audit-logs", Some(&admin), None).await;
    assert_eq!(audit.status, StatusCode::OK);
    let Some(entries) = audit.body["data"].as_array() else {
        panic!("audit missing: {}", audit.body);
    };
    let lifecycle: Vec<&str> = entries
        .iter()
        .rev()
        .filter_map(|e| e["action"].as_str())
        .filter(|a| matches!(*a, "create_service" | "create_incident" | "resolve_incident"))
        .collect();
    assert_eq!(lifecycle, vec!["create_service", "create_incident", "resolve_incident"]);

    let denied = send(&app, Method::GET, "/api/audit-logs", Some(&engineer), None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_status_hides_unpublished_incidents() {
    let app = app();
    let admin = register(&app, "root", "admin").await;

    let service = send(
        &app,
        Method::POST,
        "/api/services",
        Some(&admin),
        Some(json!({ "name": "Search" })),
    )
    .await;
    let service_id = id_of(&service);
    let incident = send(
        &app,
        Method::POST,
        "/api/incidents",
        Some(&admin),
        Some(json!({
            "service_id": service_id,
            "title": "Slow queries",
            "description": "p99 above 2s",
            "severity": "medium",
        })),
    )
    .await;
    let incident_id = id_of(&incident);

    let public = send(&app, Method::GET, "/api/public/status", None, None).await;
    assert_eq!(public.status, StatusCode::OK);
    assert_eq!(public.body["data"]["overall_status"], "degraded");
    assert_eq!(public.body["data"]["recent_incidents"], json!([]));

    let published = send(
        &app,
        Method::PATCH,
        &format!("/api/incidents/{incident_id}/publish"),
        Some(&admin),
        Some(json!({ "is_published": true })),
    )
    .await;
    assert_eq!(published.status, StatusCode::OK);

    let public = send(&app, Method::GET, "/api/public/status", None, None).await;
    assert_eq!(public.body["data"]["recent_incidents"][0]["id"], incident_id.as_str());
    assert_eq!(public.body["data"]["recent_incidents"][0]["service_name"], "Search");
}

#[tokio::test]
async fn deleted_user_token_stops_working() {
    let app = app();
    let admin = register(&app, "root", "admin").await;
    let viewer = register(&app, "temp", "viewer").await;

    let me = send(&app, Method::GET, "/api/auth/me", Some(&viewer), None).await;
    let viewer_id = id_of(&me);

    let self_delete = send(&app, Method::GET, "/api/auth/me", Some(&admin), None).await;
    let admin_id = id_of(&self_delete);
    let reply = send(&app, Method::DELETE, &format!("/api/users/{admin_id}"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, Method::DELETE, &format!("/api/users/{viewer_id}"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let me = send(&app, Method::GET, "/api/auth/me", Some(&viewer), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.body["message"], "invalid token");
}
