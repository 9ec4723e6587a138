//! User administration. Every operation requires `manage_users`.

use std::fmt;
use std::sync::Arc;

use serde_json::json;

use crate::auth::NewAccount;
use crate::auth::password;
use crate::domain::policy::{self, Action};
use crate::domain::{AuditAction, EntityType, NewAuditEntry, Role, User, UserId};
use crate::error::AppError;
use crate::persistence::{Store, UserChanges, UserFilter};
use crate::service::AuditService;
use crate::validation;

/// Partial update of a user account.
#[derive(Clone, Default)]
pub struct UserPatch {
    /// New login name.
    pub username: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New plaintext password.
    pub password: Option<String>,
    /// New role.
    pub role: Option<Role>,
}

impl fmt::Debug for UserPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPatch")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("role", &self.role)
            .finish()
    }
}

impl UserPatch {
    fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
    }

    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("username", self.username.is_some()),
            ("email", self.email.is_some()),
            ("password", self.password.is_some()),
            ("role", self.role.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Admin operations on user accounts.
#[derive(Debug, Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl UserService {
    /// Creates the service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Users matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] for non-admins.
    pub async fn list_users(&self, actor: &User, filter: UserFilter) -> Result<Vec<User>, AppError> {
        policy::ensure(actor.role, Action::ManageUsers)?;
        let filter = UserFilter {
            search: filter
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            ..filter
        };
        self.store.list_users(&filter).await
    }

    /// One user.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id.
    pub async fn get_user(&self, actor: &User, id: UserId) -> Result<User, AppError> {
        policy::ensure(actor.role, Action::ManageUsers)?;
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("user".into()))
    }

    /// Creates an account with the same rules as self-registration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for malformed fields and
    /// [`AppError::Conflict`] when the username or email is taken.
    pub async fn create_user(&self, actor: &User, account: NewAccount) -> Result<User, AppError> {
        policy::ensure(actor.role, Action::ManageUsers)?;
        let new_user = account.into_new_user().await?;
        let user = self.store.insert_user(new_user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, actor = %actor.id, "user created");

        self.audit
            .record(
                NewAuditEntry::new(Some(actor.id), AuditAction::CreateUser, EntityType::User, user.id)
                    .with_details(json!({ "username": user.username, "role": user.role })),
            )
            .await;
        Ok(user)
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when nothing is given or a field is
    /// malformed, [`AppError::Conflict`] on a duplicate username or email,
    /// and [`AppError::NotFound`] for an unknown id.
    pub async fn update_user(
        &self,
        actor: &User,
        id: UserId,
        patch: UserPatch,
    ) -> Result<User, AppError> {
        policy::ensure(actor.role, Action::ManageUsers)?;
        if patch.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        let fields = patch.changed_fields();

        let username = patch
            .username
            .as_deref()
            .map(validation::check_username)
            .transpose()?;
        let email = patch
            .email
            .as_deref()
            .map(validation::check_email)
            .transpose()?;
        let password_hash = match patch.password {
            Some(plain) => {
                validation::check_password(&plain)?;
                Some(password::hash_blocking(plain).await?)
            }
            None => None,
        };

        let user = self
            .store
            .update_user(
                id,
                UserChanges {
                    username,
                    email,
                    password_hash,
                    role: patch.role,
                },
            )
            .await?;
        tracing::info!(user_id = %id, actor = %actor.id, ?fields, "user updated");

        self.audit
            .record(
                NewAuditEntry::new(Some(actor.id), AuditAction::UpdateUser, EntityType::User, id)
                    .with_details(json!({ "fields": fields, "role": user.role })),
            )
            .await;
        Ok(user)
    }

    /// Removes an account. Admins cannot remove themselves.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for self-deletion and
    /// [`AppError::NotFound`] for an unknown id.
    pub async fn delete_user(&self, actor: &User, id: UserId) -> Result<(), AppError> {
        policy::ensure(actor.role, Action::ManageUsers)?;
        if id == actor.id {
            return Err(AppError::validation("cannot delete your own account"));
        }
        self.store.delete_user(id).await?;
        tracing::info!(user_id = %id, actor = %actor.id, "user deleted");

        self.audit
            .record(NewAuditEntry::new(
                Some(actor.id),
                AuditAction::DeleteUser,
                EntityType::User,
                id,
            ))
            .await;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::fixtures::Fixture;

    fn users(fx: &Fixture) -> UserService {
        UserService::new(fx.dyn_store(), AuditService::new(fx.dyn_store()))
    }

    fn account(name: &str) -> NewAccount {
        NewAccount {
            username: name.into(),
            email: format!("{name}@example.com"),
            password: "long-enough".into(),
            role: Some(Role::Engineer),
        }
    }

    #[tokio::test]
    async fn non_admins_are_forbidden() {
        let fx = Fixture::new().await;
        let users = users(&fx);
        for actor in [&fx.viewer, &fx.engineer] {
            assert!(matches!(
                users.list_users(actor, UserFilter::default()).await,
                Err(AppError::Forbidden { .. })
            ));
            assert!(matches!(
                users.create_user(actor, account("mallory")).await,
                Err(AppError::Forbidden { .. })
            ));
        }
    }

    #[tokio::test]
    async fn list_filters_by_role_and_search() {
        let fx = Fixture::new().await;
        let users = users(&fx);

        let filter = UserFilter {
            role: Some(Role::Engineer),
            search: None,
        };
        let Ok(engineers) = users.list_users(&fx.admin, filter).await else {
            panic!("list failed");
        };
        assert_eq!(engineers.len(), 1);

        let filter = UserFilter {
            role: None,
            search: Some("ADMIN@".into()),
        };
        let Ok(found) = users.list_users(&fx.admin, filter).await else {
            panic!("list failed");
        };
        assert_eq!(found.iter().map(|u| u.id).collect::<Vec<_>>(), vec![fx.admin.id]);
    }

    #[tokio::test]
    async fn create_and_update_user() {
        let fx = Fixture::new().await;
        let users = users(&fx);
        let Ok(created) = users.create_user(&fx.admin, account("grace")).await else {
            panic!("create failed");
        };
        assert_eq!(created.role, Role::Engineer);

        let patch = UserPatch {
            role: Some(Role::Admin),
            ..UserPatch::default()
        };
        let Ok(promoted) = users.update_user(&fx.admin, created.id, patch).await else {
            panic!("update failed");
        };
        assert_eq!(promoted.role, Role::Admin);

        let clash = UserPatch {
            email: Some("viewer@example.com".into()),
            ..UserPatch::default()
        };
        assert!(matches!(
            users.update_user(&fx.admin, created.id, clash).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            users
                .update_user(&fx.admin, created.id, UserPatch::default())
                .await,
            Err(AppError::Validation(_))
        ));
        let weak = UserPatch {
            password: Some("short".into()),
            ..UserPatch::default()
        };
        assert!(matches!(
            users.update_user(&fx.admin, created.id, weak).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let fx = Fixture::new().await;
        let users = users(&fx);
        assert!(matches!(
            users.delete_user(&fx.admin, fx.admin.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(users.delete_user(&fx.admin, fx.viewer.id).await.is_ok());
        assert!(matches!(
            users.get_user(&fx.admin, fx.viewer.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
