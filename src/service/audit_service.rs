//! Audit recorder.
//!
//! Writes happen after the primary change has committed. A failed write is
//! logged and dropped: the audit trail is best-effort and never fails the
//! operation it describes.

use std::sync::Arc;

use crate::domain::policy::{self, Action};
use crate::domain::{AuditLogEntry, NewAuditEntry, User};
use crate::error::AppError;
use crate::persistence::Store;

/// Default number of entries returned by [`AuditService::list`].
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

/// Upper bound on [`AuditService::list`].
pub const MAX_AUDIT_LIMIT: i64 = 1000;

/// Appends to and reads the audit log.
#[derive(Debug, Clone)]
pub struct AuditService {
    store: Arc<dyn Store>,
}

impl AuditService {
    /// Creates a recorder over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends `entry`, swallowing storage failures.
    pub async fn record(&self, entry: NewAuditEntry) {
        let action = entry.action;
        let entity_id = entry.entity_id.clone();
        if let Err(e) = self.store.append_audit(entry).await {
            tracing::warn!(%action, %entity_id, error = %e, "failed to write audit log");
        }
    }

    /// Most recent entries, newest first. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins and
    /// [`AppError::Validation`] for a non-positive limit.
    pub async fn list(
        &self,
        actor: &User,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>, AppError> {
        policy::ensure(actor.role, Action::ViewAuditLog)?;
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
        if limit < 1 {
            return Err(AppError::validation("limit must be positive"));
        }
        self.store.list_audit(limit.min(MAX_AUDIT_LIMIT)).await
    }
}
