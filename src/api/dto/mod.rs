//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies default missing string fields to empty so that the
//! service layer reports them as validation errors with its own messages.

pub mod auth_dto;
pub mod incident_dto;
pub mod service_dto;
pub mod user_dto;

pub use auth_dto::*;
pub use incident_dto::*;
pub use service_dto::*;
pub use user_dto::*;
