//! Registration, login, and request authentication.

use std::fmt;
use std::sync::Arc;

use serde_json::json;

use super::password;
use super::token::TokenIssuer;
use crate::domain::{AuditAction, EntityType, NewAuditEntry, Role, User};
use crate::error::AppError;
use crate::persistence::{NewUser, Store};
use crate::service::AuditService;
use crate::validation;

/// An authenticated user together with a freshly issued token.
#[derive(Clone)]
pub struct Session {
    /// The user, without credentials.
    pub user: User,
    /// Signed session token.
    pub token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Account fields accepted by registration and by admin user creation.
#[derive(Clone)]
pub struct NewAccount {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plaintext password. Hashed before it reaches the store.
    pub password: String,
    /// Role; `None` means viewer.
    pub role: Option<Role>,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

impl NewAccount {
    /// Validates the fields and hashes the password.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for malformed fields and
    /// [`AppError::Server`] if hashing fails.
    pub async fn into_new_user(self) -> Result<NewUser, AppError> {
        let username = validation::check_username(&self.username)?;
        let email = validation::check_email(&self.email)?;
        validation::check_password(&self.password)?;
        let password_hash = password::hash_blocking(self.password).await?;
        Ok(NewUser {
            username,
            email,
            password_hash,
            role: self.role.unwrap_or_default(),
        })
    }
}

/// The authentication gate.
#[derive(Debug, Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: TokenIssuer,
    audit: AuditService,
}

impl AuthService {
    /// Creates the gate over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: TokenIssuer, audit: AuditService) -> Self {
        Self {
            store,
            tokens,
            audit,
        }
    }

    /// Token issuer. Session cookies take their lifetime from it.
    #[must_use]
    pub const fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for malformed fields and
    /// [`AppError::Conflict`] when the username or email is taken.
    pub async fn register(&self, account: NewAccount) -> Result<Session, AppError> {
        let new_user = account.into_new_user().await?;
        let user = self.store.insert_user(new_user).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");

        self.audit
            .record(
                NewAuditEntry::new(Some(user.id), AuditAction::CreateUser, EntityType::User, user.id)
                    .with_details(json!({
                        "username": user.username,
                        "role": user.role,
                        "self_registered": true,
                    })),
            )
            .await;

        let token = self.tokens.issue(user.id)?;
        Ok(Session { user, token })
    }

    /// Verifies credentials and signs the user in.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] when a field is missing and
    /// [`AppError::InvalidCredentials`] for an unknown email or a wrong
    /// password alike.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::validation("email and password are required"));
        }

        let credentials = self.store.find_credentials(email).await?;
        let (user, hash) = match credentials {
            Some(c) => (Some(c.user), Some(c.password_hash)),
            None => (None, None),
        };
        let matches = password::verify_blocking(password.to_string(), hash).await?;

        let Some(user) = user.filter(|_| matches) else {
            tracing::warn!("login failed");
            return Err(AppError::InvalidCredentials);
        };
        tracing::info!(user_id = %user.id, "user logged in");

        self.audit
            .record(NewAuditEntry::new(
                Some(user.id),
                AuditAction::Login,
                EntityType::User,
                user.id,
            ))
            .await;

        let token = self.tokens.issue(user.id)?;
        Ok(Session { user, token })
    }

    /// Resolves a token to the current user record.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::TokenExpired`] or [`AppError::InvalidToken`] when
    /// the token does not verify, and [`AppError::InvalidToken`] when the
    /// user no longer exists.
    pub async fn authenticate(&self, token: &str) -> Result<User, AppError> {
        let user_id = self.tokens.verify(token)?;
        self.store
            .find_user(user_id)
            .await?
            .ok_or(AppError::InvalidToken)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::ErrorKind;
    use crate::persistence::MemoryStore;

    fn gate() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn Store> = Arc::clone(&store) as Arc<dyn Store>;
        let config = AppConfig::new("auth-service-test-secret-0123456789");
        let auth = AuthService::new(
            Arc::clone(&dyn_store),
            TokenIssuer::new(&config.auth),
            AuditService::new(dyn_store),
        );
        (auth, store)
    }

    fn account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.into(),
            email: email.into(),
            password: "s3cret-pass".into(),
            role: None,
        }
    }

    #[tokio::test]
    async fn register_then_authenticate_round_trip() {
        let (auth, _) = gate();
        let Ok(session) = auth.register(account("alice", "alice@example.com")).await else {
            panic!("register failed");
        };
        assert_eq!(session.user.role, Role::Viewer);

        let Ok(user) = auth.authenticate(&session.token).await else {
            panic!("authenticate failed");
        };
        assert_eq!(user, session.user);
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let (auth, _) = gate();
        for bad in [
            account("", "a@example.com"),
            account("bob", "not-an-email"),
            NewAccount {
                password: "short".into(),
                ..account("bob", "bob@example.com")
            },
        ] {
            let result = auth.register(bad).await;
            assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Validation));
        }
    }

    #[tokio::test]
    async fn uniqueness_is_exact_and_case_sensitive() {
        let (auth, _) = gate();
        assert!(auth.register(account("carol", "carol@example.com")).await.is_ok());

        let dup_email = auth.register(account("carol2", "carol@example.com")).await;
        assert!(matches!(dup_email, Err(AppError::Conflict(_))));
        let dup_name = auth.register(account("carol", "other@example.com")).await;
        assert!(matches!(dup_name, Err(AppError::Conflict(_))));

        assert!(auth.register(account("Carol", "Carol@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (auth, _) = gate();
        assert!(auth.register(account("dave", "dave@example.com")).await.is_ok());

        let wrong_password = auth.login("dave@example.com", "not-the-password").await;
        let unknown_email = auth.login("nobody@example.com", "s3cret-pass").await;

        let (Err(a), Err(b)) = (wrong_password, unknown_email) else {
            panic!("bad credentials accepted");
        };
        assert!(matches!(a, AppError::InvalidCredentials));
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.kind(), b.kind());
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let (auth, _) = gate();
        assert!(matches!(auth.login("", "x").await, Err(AppError::Validation(_))));
        assert!(matches!(
            auth.login("a@example.com", "").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_succeeds_and_is_audited() {
        let (auth, store) = gate();
        assert!(auth.register(account("erin", "erin@example.com")).await.is_ok());
        let Ok(session) = auth.login(" erin@example.com ", "s3cret-pass").await else {
            panic!("login failed");
        };
        assert_eq!(session.user.username, "erin");

        let Ok(entries) = store.list_audit(10).await else {
            panic!("audit read failed");
        };
        let actions: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Login, AuditAction::CreateUser]);
    }

    #[tokio::test]
    async fn deleted_user_token_stops_working() {
        let (auth, store) = gate();
        let Ok(session) = auth.register(account("frank", "frank@example.com")).await else {
            panic!("register failed");
        };
        assert!(store.delete_user(session.user.id).await.is_ok());
        assert!(matches!(
            auth.authenticate(&session.token).await,
            Err(AppError::InvalidToken)
        ));
    }
}
