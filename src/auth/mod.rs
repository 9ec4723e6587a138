//! Authentication gate: password hashing, session tokens, and the
//! register / login / authenticate operations.
//!
//! The HTTP side (bearer header, session cookie) lives in
//! [`crate::api::extract`].

pub mod password;
pub mod service;
pub mod token;

pub use service::{AuthService, NewAccount, Session};
pub use token::{Claims, TokenIssuer};
