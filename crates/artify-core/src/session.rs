// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Session manager
//
// SessionManager is the only writer of the session. The gateway and the
// library hold a SessionView and read the token at call time.

use crate::gateway::{AccountGrant, ImageGateway};
use crate::secrets::{SecretStore, TOKEN_KEY, USERNAME_KEY};
use crate::types::{AppError, ProfileUpdate, UserProfile};
use crate::validation::{require_field, validate_new_password, validate_password};
use std::sync::{Arc, RwLock};

/// Where the session stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Process just started, persisted token not read yet
    Unknown,
    Authenticated,
    Unauthenticated,
}

/// Bearer credential plus the tri-state authenticated flag
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    /// `None` until the persisted token has been read
    pub authenticated: Option<bool>,
}

impl Session {
    pub fn status(&self) -> AuthStatus {
        match self.authenticated {
            None => AuthStatus::Unknown,
            Some(true) => AuthStatus::Authenticated,
            Some(false) => AuthStatus::Unauthenticated,
        }
    }

    fn signed_in(token: String) -> Self {
        Self {
            token: Some(token),
            authenticated: Some(true),
        }
    }

    fn signed_out() -> Self {
        Self {
            token: None,
            authenticated: Some(false),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("authenticated", &self.authenticated)
            .finish()
    }
}

/// Read-only handle on the current session
#[derive(Clone, Default)]
pub struct SessionView {
    inner: Arc<RwLock<Session>>,
}

impl SessionView {
    pub fn snapshot(&self) -> Session {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).status()
    }
}

/// Owns the session and its persisted credential
pub struct SessionManager {
    state: Arc<RwLock<Session>>,
    secrets: Arc<dyn SecretStore>,
}

impl SessionManager {
    /// Start in the `Unknown` state
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            state: Arc::new(RwLock::new(Session::default())),
            secrets,
        }
    }

    /// Handle for components that only read the session
    pub fn view(&self) -> SessionView {
        SessionView {
            inner: self.state.clone(),
        }
    }

    pub fn session(&self) -> Session {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn status(&self) -> AuthStatus {
        self.state.read().unwrap_or_else(|e| e.into_inner()).status()
    }

    fn replace(&self, session: Session) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = session;
    }

    /// Read the persisted token once at startup
    pub fn load_persisted_session(&self) -> Result<AuthStatus, AppError> {
        match self.secrets.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => {
                tracing::info!("Restored persisted session");
                self.replace(Session::signed_in(token));
            }
            Ok(_) => {
                tracing::info!("No persisted session");
                self.replace(Session::signed_out());
            }
            Err(e) => {
                tracing::warn!("Failed to read persisted session: {}", e);
                self.replace(Session::signed_out());
                return Err(e);
            }
        }
        Ok(self.status())
    }

    /// Create an account and sign in with the returned token
    pub async fn register(
        &self,
        gateway: &ImageGateway,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AppError> {
        require_field("email", email)?;
        require_field("name", display_name)?;
        validate_password(password)?;

        let grant = gateway
            .register_account(email.trim(), password, display_name.trim())
            .await?;
        tracing::info!("Registered new account");
        self.accept(grant)
    }

    /// Like [`register`](Self::register), with the confirmation field checked first
    pub async fn register_confirmed(
        &self,
        gateway: &ImageGateway,
        email: &str,
        password: &str,
        confirmation: &str,
        display_name: &str,
    ) -> Result<Session, AppError> {
        validate_new_password(password, confirmation)?;
        self.register(gateway, email, password, display_name).await
    }

    /// Sign in; an existing session is simply replaced
    pub async fn login(
        &self,
        gateway: &ImageGateway,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        require_field("email", email)?;
        require_field("password", password)?;

        let grant = gateway.login_account(email.trim(), password).await?;
        tracing::info!("Logged in");
        self.accept(grant)
    }

    /// Persist the credential first so state is untouched if storage fails
    fn accept(&self, grant: AccountGrant) -> Result<Session, AppError> {
        self.secrets.set(TOKEN_KEY, &grant.token)?;
        if let Some(name) = &grant.user_name {
            if let Err(e) = self.secrets.set(USERNAME_KEY, name) {
                tracing::warn!("Failed to cache username: {}", e);
            }
        }

        let session = Session::signed_in(grant.token);
        self.replace(session.clone());
        Ok(session)
    }

    /// Forget the credential; later authenticated calls fail fast
    pub fn logout(&self) -> Result<(), AppError> {
        self.replace(Session::signed_out());
        tracing::info!("Logged out");

        self.secrets.delete(TOKEN_KEY)?;
        self.secrets.delete(USERNAME_KEY)?;
        Ok(())
    }

    /// Display name cached at register/login/profile time
    pub fn cached_username(&self) -> Option<String> {
        self.secrets.get(USERNAME_KEY).ok().flatten()
    }

    pub async fn fetch_profile(&self, gateway: &ImageGateway) -> Result<UserProfile, AppError> {
        let profile = gateway.fetch_profile().await?;
        if let Err(e) = self.secrets.set(USERNAME_KEY, &profile.name) {
            tracing::warn!("Failed to cache username: {}", e);
        }
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        gateway: &ImageGateway,
        update: &ProfileUpdate,
    ) -> Result<(), AppError> {
        require_field("email", &update.email)?;
        require_field("name", &update.name)?;
        validate_password(&update.password)?;

        gateway.update_profile(update).await?;
        if let Err(e) = self.secrets.set(USERNAME_KEY, &update.name) {
            tracing::warn!("Failed to cache username: {}", e);
        }
        Ok(())
    }

    pub async fn request_password_reset(
        &self,
        gateway: &ImageGateway,
        email: &str,
    ) -> Result<(), AppError> {
        require_field("email", email)?;
        gateway.request_password_reset(email.trim()).await
    }

    pub async fn reset_password(
        &self,
        gateway: &ImageGateway,
        email: &str,
        code: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), AppError> {
        require_field("email", email)?;
        require_field("code", code)?;
        validate_new_password(new_password, confirmation)?;

        gateway
            .reset_password(email.trim(), code.trim(), new_password)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecretStore;

    #[test]
    fn test_starts_unknown() {
        let manager = SessionManager::new(Arc::new(MemorySecretStore::new()));
        assert_eq!(manager.status(), AuthStatus::Unknown);
        assert_eq!(manager.view().token(), None);
    }

    #[test]
    fn test_load_with_and_without_token() {
        let store = Arc::new(MemorySecretStore::new());
        let manager = SessionManager::new(store.clone());
        assert_eq!(
            manager.load_persisted_session().unwrap(),
            AuthStatus::Unauthenticated
        );

        store.set(TOKEN_KEY, "tok").unwrap();
        let manager = SessionManager::new(store);
        assert_eq!(
            manager.load_persisted_session().unwrap(),
            AuthStatus::Authenticated
        );
        assert_eq!(manager.view().token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_logout_clears_store_and_view() {
        let store = Arc::new(MemorySecretStore::new());
        store.set(TOKEN_KEY, "tok").unwrap();
        store.set(USERNAME_KEY, "Ana").unwrap();

        let manager = SessionManager::new(store.clone());
        manager.load_persisted_session().unwrap();
        let view = manager.view();

        manager.logout().unwrap();
        assert_eq!(view.status(), AuthStatus::Unauthenticated);
        assert_eq!(view.token(), None);
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(manager.cached_username(), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let session = Session::signed_in("super-secret".to_string());
        let printed = format!("{:?}", session);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("redacted"));
    }
}
