//! Application error taxonomy.
//!
//! [`AppError`] is the single error type flowing through the store, the
//! service layer, and the authentication gate. It carries no HTTP concerns:
//! the translation to status codes and the JSON envelope lives in
//! [`crate::api::envelope`].

use crate::domain::policy::Action;
use crate::domain::user::Role;

/// Coarse error category, used by the HTTP boundary and by tests that only
/// care about the class of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed, missing, or out-of-range input.
    Validation,
    /// No, invalid, or expired credential.
    Unauthenticated,
    /// Authenticated but the role may not perform the action.
    Forbidden,
    /// An entity id did not resolve.
    NotFound,
    /// Duplicate unique field or deletion of a referenced entity.
    Conflict,
    /// Operation not legal in the current lifecycle state.
    InvalidState,
    /// Storage or transaction failure.
    Server,
}

/// Errors produced by the status desk core.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request validation failed.
    #[error("{0}")]
    Validation(String),

    /// No token was supplied with a protected request.
    #[error("access denied: no token provided")]
    MissingToken,

    /// The token signature, shape, issuer, or subject is not acceptable.
    #[error("invalid token")]
    InvalidToken,

    /// The token was valid but its lifetime has passed.
    #[error("token expired")]
    TokenExpired,

    /// Login failed. Deliberately identical for unknown email and wrong
    /// password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The caller's role does not allow the action.
    #[error("role {role} is not permitted to {action}")]
    Forbidden {
        /// Action that was attempted.
        action: Action,
        /// Role of the caller.
        role: Role,
    },

    /// Entity with the given description was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint clash or referenced entity.
    #[error("{0}")]
    Conflict(String),

    /// Lifecycle rule violation (e.g. resolving a resolved incident).
    #[error("{0}")]
    InvalidState(String),

    /// Storage or transaction failure.
    #[error("server error: {0}")]
    Server(String),
}

impl AppError {
    /// Returns the error category of this variant.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::MissingToken
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::InvalidCredentials => ErrorKind::Unauthenticated,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Server(_) => ErrorKind::Server,
        }
    }

    /// Shorthand for [`AppError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource".into()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => Self::Conflict("resource already exists".into()),
                Some("23503") => Self::Conflict("resource is still referenced".into()),
                _ => {
                    tracing::error!(error = %err, "database error");
                    Self::Server(err.to_string())
                }
            },
            _ => {
                tracing::error!(error = %err, "database error");
                Self::Server(err.to_string())
            }
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        tracing::error!(error = %err, "migration error");
        Self::Server(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_share_a_kind() {
        for err in [
            AppError::MissingToken,
            AppError::InvalidToken,
            AppError::TokenExpired,
            AppError::InvalidCredentials,
        ] {
            assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        }
    }

    #[test]
    fn expired_and_invalid_messages_differ() {
        assert_ne!(
            AppError::TokenExpired.to_string(),
            AppError::InvalidToken.to_string()
        );
    }

    #[test]
    fn forbidden_message_names_role_and_action() {
        let err = AppError::Forbidden {
            action: Action::TogglePublish,
            role: Role::Engineer,
        };
        assert_eq!(err.to_string(), "role engineer is not permitted to toggle_publish");
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pool_timeout_maps_to_server() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Server);
    }
}
