// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Client library for the Artify image-editing service
//
// This crate provides:
// - SecretStore adapters for the bearer token
// - SessionManager for register/login/logout
// - ImageGateway, one method per remote capability
// - OperationTable with the named server-side filters
// - ImageLibrary, the local projection of the user's images
//
// Frontends build an AppState and drive it.

pub mod activity;
pub mod gateway;
pub mod library;
pub mod operations;
pub mod records;
pub mod secrets;
pub mod session;
pub mod settings;
pub mod state;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use activity::{ActivityTracker, GatewayEvent};
pub use gateway::{AccountGrant, ImageGateway};
pub use library::ImageLibrary;
pub use operations::{FaceMode, Operation, OperationKind, OperationTable};
pub use secrets::{FileSecretStore, MemorySecretStore, SecretStore, TOKEN_KEY, USERNAME_KEY};
pub use session::{AuthStatus, Session, SessionManager, SessionView};
pub use settings::{ClientSettings, SettingsStore};
pub use state::AppState;
pub use types::{
    AppError, ImageKind, ImageRecord, OperationOutcome, ProfileUpdate, UploadFailure,
    UploadReport, UploadedImage, UserProfile,
};
