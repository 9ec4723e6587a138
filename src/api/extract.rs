//! Request extractors whose rejections flow through the JSON envelope.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use crate::app_state::AppState;
use crate::domain::User;
use crate::error::AppError;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

/// JSON body; malformed input becomes a 400 envelope.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters; an unparsable id becomes a 400 envelope.
#[derive(Debug, Clone, Copy, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string; unknown enum tags become a 400 envelope.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// The authenticated caller.
///
/// The token is read from `Authorization: Bearer` first and from the
/// [`TOKEN_COOKIE`] cookie otherwise. The user record is re-read on every
/// request, so a deleted account is rejected immediately.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(AppError::MissingToken)?;
        state.auth.authenticate(&token).await.map(Self)
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_owned())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(TOKEN_COOKIE)?;
    let value = cookie.value();
    if value.is_empty() {
        return None;
    }
    Some(value.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap_or_default().into_parts();
        parts
    }

    #[test]
    fn bearer_header_is_read() {
        let p = parts(&[("authorization", "Bearer abc.def")]);
        assert_eq!(bearer_token(&p).as_deref(), Some("abc.def"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let p = parts(&[("authorization", "Basic Zm9vOmJhcg==")]);
        assert_eq!(bearer_token(&p), None);
        let p = parts(&[("authorization", "Bearer ")]);
        assert_eq!(bearer_token(&p), None);
    }

    #[test]
    fn cookie_is_read_among_others() {
        let p = parts(&[("cookie", "theme=dark; token=xyz; lang=en")]);
        assert_eq!(cookie_token(&p).as_deref(), Some("xyz"));
        let p = parts(&[("cookie", "token=")]);
        assert_eq!(cookie_token(&p), None);
    }
}
