//! Authentication handlers: register, login, logout, me.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::api::dto::{AuthResponse, LoginRequest, RegisterRequest, UserDto};
use crate::api::envelope::{Envelope, ErrorEnvelope, MessageEnvelope};
use crate::api::extract::{ApiJson, AuthUser, TOKEN_COOKIE};
use crate::app_state::AppState;
use crate::error::AppError;

/// Session cookie carrying `token`, living as long as the token itself.
fn session_cookie(token: String, state: &AppState) -> Cookie<'static> {
    let ttl = state.auth.tokens().ttl();
    let max_age = time::Duration::try_from(ttl).unwrap_or(time::Duration::WEEK);
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(max_age)
        .secure(state.config.auth.cookie_secure)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(TOKEN_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

/// `POST /api/auth/register` — Create an account and sign in.
///
/// # Errors
///
/// Returns [`AppError::Validation`] or [`AppError::Conflict`].
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Creates an account (role defaults to viewer), sets the `token` cookie, and returns the token.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid fields", body = ErrorEnvelope),
        (status = 409, description = "Username or email taken", body = ErrorEnvelope),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.register(req.into()).await?;
    let jar = jar.add(session_cookie(session.token.clone(), &state));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse::new(session, "registration successful")),
    ))
}

/// `POST /api/auth/login` — Sign in with email and password.
///
/// # Errors
///
/// Returns [`AppError::InvalidCredentials`] for an unknown email or a wrong
/// password.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    description = "Verifies credentials, sets the `token` cookie, and returns the token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Missing fields", body = ErrorEnvelope),
        (status = 401, description = "Invalid credentials", body = ErrorEnvelope),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth.login(&req.email, &req.password).await?;
    let jar = jar.add(session_cookie(session.token.clone(), &state));
    Ok((jar, Json(AuthResponse::new(session, "login successful"))))
}

/// `POST /api/auth/logout` — Clear the session cookie.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    summary = "Log out",
    description = "Clears the `token` cookie. Tokens are stateless and stay valid until they expire.",
    responses(
        (status = 200, description = "Cookie cleared", body = MessageEnvelope),
    )
)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(removal_cookie()),
        Json(Envelope::message("logged out")),
    )
}

/// `GET /api/auth/me` — The authenticated user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    summary = "Current user",
    security(("bearer" = []), ("cookie" = [])),
    responses(
        (status = 200, description = "Current user", body = Envelope<UserDto>),
        (status = 401, description = "Not authenticated", body = ErrorEnvelope),
    )
)]
pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(Envelope::data(UserDto::from(user)))
}

/// Authentication routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::AppConfig;
    use crate::persistence::MemoryStore;

    fn state_with(config: AppConfig) -> AppState {
        AppState::new(Arc::new(MemoryStore::new()), config)
    }

    #[test]
    fn session_cookie_attributes() {
        let state = state_with(AppConfig::new("cookie-test-secret-0123456789abcdef"));
        let cookie = session_cookie("tok".into(), &state);
        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn cookie_lifetime_matches_token_lifetime() {
        let mut config = AppConfig::new("cookie-test-secret-0123456789abcdef");
        config.auth.token_ttl = Duration::from_secs(3600);
        let state = state_with(config);
        assert_eq!(state.auth.tokens().ttl(), Duration::from_secs(3600));
        let cookie = session_cookie("tok".into(), &state);
        assert_eq!(cookie.max_age(), Some(time::Duration::hours(1)));
    }

    #[test]
    fn secure_flag_follows_config() {
        let mut config = AppConfig::new("cookie-test-secret-0123456789abcdef");
        config.auth.cookie_secure = true;
        let cookie = session_cookie("tok".into(), &state_with(config));
        assert_eq!(cookie.secure(), Some(true));
    }
}
