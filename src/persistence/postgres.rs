//! PostgreSQL implementation of the persistence layer.
//!
//! Composite lifecycle operations run inside one transaction and lock the
//! rows they read with `SELECT … FOR UPDATE`, so two concurrent resolves of
//! the same incident serialize and the second one observes the first.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{AuditRow, IncidentListingRow, IncidentRow, ServiceRow, UpdateRow, UserRow};
use super::{
    Credentials, IncidentChanges, IncidentFilter, IncidentListing, NewIncident, NewService,
    NewUser, ResolveIncident, ServiceChanges, Store, UserChanges, UserFilter,
};
use crate::config::DatabaseConfig;
use crate::domain::{
    AuditLogEntry, Incident, IncidentId, IncidentUpdate, MonitoredService, NewAuditEntry,
    ServiceId, ServiceStatus, User, UserId,
};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

const SERVICE_COLUMNS: &str = "id, name, description, status, created_by, created_at, updated_at";

const INCIDENT_COLUMNS: &str = "id, service_id, title, description, severity, status, \
     is_published, created_by, resolved_by, resolved_at, root_cause, prevention_notes, \
     created_at, updated_at";

const UPDATE_COLUMNS: &str = "id, incident_id, message, created_by, created_at";

const AUDIT_COLUMNS: &str = "id, actor_id, action, entity_type, entity_id, details, created_at";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] if the database is unreachable or a
    /// migration fails.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self::new(pool))
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps a unique violation to a [`AppError::Conflict`] with `message`.
fn unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => err.into(),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(UserId::new())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "username or email already in use"))?;
        row.try_into()
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Credentials::try_from)
            .transpose()
    }

    async fn list_users(&self, filter: &UserFilter) -> Result<Vec<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR role = $1) \
               AND ($2::text IS NULL OR username ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%') \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(filter.role.map(|r| r.as_str()))
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET \
                 username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 password_hash = COALESCE($4, password_hash), \
                 role = COALESCE($5, role), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(changes.username.as_deref())
            .bind(changes.email.as_deref())
            .bind(changes.password_hash.as_deref())
            .bind(changes.role.map(|r| r.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "username or email already in use"))?
            .ok_or_else(|| AppError::NotFound("user".into()))?;
        row.try_into()
    }

    async fn delete_user(&self, id: UserId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user".into()));
        }
        Ok(())
    }

    async fn insert_service(&self, service: NewService) -> Result<MonitoredService, AppError> {
        let sql = format!(
            "INSERT INTO services (id, name, description, status, created_by) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SERVICE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(ServiceId::new())
            .bind(&service.name)
            .bind(&service.description)
            .bind(service.status.as_str())
            .bind(service.created_by)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn find_service(&self, id: ServiceId) -> Result<Option<MonitoredService>, AppError> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1");
        sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(MonitoredService::try_from)
            .transpose()
    }

    async fn list_services(&self) -> Result<Vec<MonitoredService>, AppError> {
        let sql = format!("SELECT {SERVICE_COLUMNS} FROM services ORDER BY created_at DESC");
        sqlx::query_as::<_, ServiceRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(MonitoredService::try_from)
            .collect()
    }

    async fn update_service(
        &self,
        id: ServiceId,
        changes: ServiceChanges,
    ) -> Result<MonitoredService, AppError> {
        let sql = format!(
            "UPDATE services SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {SERVICE_COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.description.as_deref())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("service".into()))?
            .try_into()
    }

    async fn set_service_status(
        &self,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<MonitoredService, AppError> {
        let sql = format!(
            "UPDATE services SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {SERVICE_COLUMNS}"
        );
        sqlx::query_as::<_, ServiceRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("service".into()))?
            .try_into()
    }

    async fn delete_service(&self, id: ServiceId) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, ServiceId>(
            "SELECT id FROM services WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("service".into()));
        }

        let incidents =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM incidents WHERE service_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if incidents > 0 {
            return Err(AppError::Conflict(format!(
                "cannot delete service with {incidents} existing incident(s)"
            )));
        }

        sqlx::query("DELETE FROM services WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn open_incident(&self, incident: NewIncident) -> Result<Incident, AppError> {
        let mut tx = self.pool.begin().await?;

        let service = sqlx::query_scalar::<_, ServiceId>(
            "SELECT id FROM services WHERE id = $1 FOR UPDATE",
        )
        .bind(incident.service_id)
        .fetch_optional(&mut *tx)
        .await?;
        if service.is_none() {
            return Err(AppError::NotFound("service".into()));
        }

        let sql = format!(
            "INSERT INTO incidents (id, service_id, title, description, severity, status, \
                 is_published, created_by) \
             VALUES ($1, $2, $3, $4, $5, 'open', $6, $7) RETURNING {INCIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(IncidentId::new())
            .bind(incident.service_id)
            .bind(&incident.title)
            .bind(&incident.description)
            .bind(incident.severity.as_str())
            .bind(incident.is_published)
            .bind(incident.created_by)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(status) = incident.forced_service_status {
            sqlx::query("UPDATE services SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(incident.service_id)
                .bind(status.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO incident_updates (incident_id, message, created_by) VALUES ($1, $2, $3)",
        )
        .bind(row.id)
        .bind(&incident.opening_message)
        .bind(incident.created_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn find_incident(&self, id: IncidentId) -> Result<Option<Incident>, AppError> {
        let sql = format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1");
        sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Incident::try_from)
            .transpose()
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
    ) -> Result<Vec<IncidentListing>, AppError> {
        let rows = sqlx::query_as::<_, IncidentListingRow>(
            "SELECT i.id, i.service_id, i.title, i.description, i.severity, i.status, \
                    i.is_published, i.created_by, i.resolved_by, i.resolved_at, i.root_cause, \
                    i.prevention_notes, i.created_at, i.updated_at, s.name AS service_name \
             FROM incidents i \
             JOIN services s ON s.id = i.service_id \
             WHERE ($1::uuid IS NULL OR i.service_id = $1) \
               AND ($2::text IS NULL OR i.status = $2) \
               AND ($3::text IS NULL OR i.severity = $3) \
               AND (NOT $4 OR i.is_published) \
             ORDER BY i.created_at DESC \
             LIMIT $5",
        )
        .bind(filter.service_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.severity.map(|s| s.as_str()))
        .bind(filter.published_only)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IncidentListing::try_from).collect()
    }

    async fn append_update(
        &self,
        incident_id: IncidentId,
        message: String,
        author: UserId,
    ) -> Result<IncidentUpdate, AppError> {
        let mut tx = self.pool.begin().await?;

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM incidents WHERE id = $1 FOR UPDATE",
        )
        .bind(incident_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("incident".into()))?;
        if status != "open" {
            return Err(AppError::InvalidState(
                "cannot add an update to a resolved incident".into(),
            ));
        }

        let sql = format!(
            "INSERT INTO incident_updates (incident_id, message, created_by) \
             VALUES ($1, $2, $3) RETURNING {UPDATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UpdateRow>(&sql)
            .bind(incident_id)
            .bind(&message)
            .bind(author)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE incidents SET updated_at = NOW() WHERE id = $1")
            .bind(incident_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_updates(&self, incident_id: IncidentId) -> Result<Vec<IncidentUpdate>, AppError> {
        let sql = format!(
            "SELECT {UPDATE_COLUMNS} FROM incident_updates \
             WHERE incident_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, UpdateRow>(&sql)
            .bind(incident_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(IncidentUpdate::from).collect())
    }

    async fn resolve_incident(&self, resolution: ResolveIncident) -> Result<Incident, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, (ServiceId, String)>(
            "SELECT service_id, status FROM incidents WHERE id = $1 FOR UPDATE",
        )
        .bind(resolution.incident_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((service_id, status)) = locked else {
            return Err(AppError::NotFound("incident".into()));
        };
        if status != "open" {
            return Err(AppError::InvalidState("incident is already resolved".into()));
        }

        let sql = format!(
            "UPDATE incidents SET \
                 status = 'resolved', \
                 resolved_by = $2, \
                 resolved_at = NOW(), \
                 root_cause = $3, \
                 prevention_notes = $4, \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {INCIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(resolution.incident_id)
            .bind(resolution.resolved_by)
            .bind(resolution.root_cause.as_deref())
            .bind(resolution.prevention_notes.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE services SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(service_id)
            .bind(resolution.service_status.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO incident_updates (incident_id, message, created_by) VALUES ($1, $2, $3)",
        )
        .bind(resolution.incident_id)
        .bind(&resolution.closing_message)
        .bind(resolution.resolved_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn edit_incident(
        &self,
        id: IncidentId,
        changes: IncidentChanges,
        allow_resolved: bool,
    ) -> Result<Incident, AppError> {
        let mut tx = self.pool.begin().await?;

        let status =
            sqlx::query_scalar::<_, String>("SELECT status FROM incidents WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("incident".into()))?;
        if status != "open" && !allow_resolved {
            return Err(AppError::InvalidState("cannot edit a resolved incident".into()));
        }

        let sql = format!(
            "UPDATE incidents SET \
                 title = COALESCE($2, title), \
                 description = COALESCE($3, description), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING {INCIDENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .bind(changes.title.as_deref())
            .bind(changes.description.as_deref())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn set_published(
        &self,
        id: IncidentId,
        is_published: bool,
    ) -> Result<Incident, AppError> {
        let sql = format!(
            "UPDATE incidents SET is_published = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {INCIDENT_COLUMNS}"
        );
        sqlx::query_as::<_, IncidentRow>(&sql)
            .bind(id)
            .bind(is_published)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("incident".into()))?
            .try_into()
    }

    async fn delete_incident(&self, id: IncidentId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("incident".into()));
        }
        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError> {
        let sql = format!(
            "INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {AUDIT_COLUMNS}"
        );
        sqlx::query_as::<_, AuditRow>(&sql)
            .bind(entry.actor_id)
            .bind(entry.action.as_str())
            .bind(entry.entity_type.as_str())
            .bind(&entry.entity_id)
            .bind(entry.details)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn list_audit(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AppError> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        sqlx::query_as::<_, AuditRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AuditLogEntry::try_from)
            .collect()
    }
}
