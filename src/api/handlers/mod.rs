//! REST endpoint handlers organized by resource.

pub mod auth;
pub mod incidents;
pub mod public;
pub mod services;
pub mod system;
pub mod users;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(services::routes())
        .merge(incidents::routes())
        .merge(public::routes())
        .merge(users::routes())
}
