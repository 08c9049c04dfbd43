// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Application state
//
// Wires the session, gateway and library around one shared session view.

use crate::gateway::ImageGateway;
use crate::library::ImageLibrary;
use crate::secrets::SecretStore;
use crate::session::{AuthStatus, SessionManager};
use crate::settings::{data_dir, ClientSettings};
use crate::types::AppError;
use std::sync::Arc;

/// Everything a frontend needs, built once per process
pub struct AppState {
    pub settings: ClientSettings,
    pub session: SessionManager,
    pub gateway: Arc<ImageGateway>,
    pub library: ImageLibrary,
}

impl AppState {
    /// Build all components and restore the persisted session
    pub fn new(settings: ClientSettings, secrets: Arc<dyn SecretStore>) -> Result<Self, AppError> {
        let session = SessionManager::new(secrets);
        let gateway = Arc::new(ImageGateway::new(&settings, session.view())?);

        let library = if settings.persist_library {
            match data_dir() {
                Ok(dir) => ImageLibrary::with_cache(gateway.clone(), dir.join("library.json")),
                Err(e) => {
                    tracing::warn!("Library cache disabled: {}", e);
                    ImageLibrary::new(gateway.clone())
                }
            }
        } else {
            ImageLibrary::new(gateway.clone())
        };

        if let Err(e) = session.load_persisted_session() {
            tracing::warn!("Starting signed out: {}", e);
        }

        Ok(Self {
            settings,
            session,
            gateway,
            library,
        })
    }

    pub fn status(&self) -> AuthStatus {
        self.session.status()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), AppError> {
        self.session.login(&self.gateway, email, password).await?;
        Ok(())
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<(), AppError> {
        self.session
            .register(&self.gateway, email, password, name)
            .await?;
        Ok(())
    }

    /// Sign out and forget the local projection
    pub fn logout(&self) -> Result<(), AppError> {
        self.session.logout()?;
        self.library.clear_local();
        Ok(())
    }
}
