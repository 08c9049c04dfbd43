// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distinguishes original uploads from filter outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageKind {
    Uploaded,
    Processed,
}

impl ImageKind {
    /// Map the server's numeric `type` field (0 = upload, 1 = processed)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Uploaded),
            1 => Some(Self::Processed),
            _ => None,
        }
    }

    /// Route prefix used when deleting a record of this kind
    pub fn collection_path(&self) -> &'static str {
        match self {
            Self::Uploaded => "images",
            Self::Processed => "processes",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processed => "processed",
        }
    }
}

/// Client-side view of one image held by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Server-assigned identifier
    pub id: String,
    /// Absolute URL to the image bytes
    pub uri: String,
    /// Display name
    pub filename: String,
    /// Parsed server timestamp, used for ordering
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Date string formatted for display
    pub created_at_display: String,
    pub is_favorite: bool,
    pub kind: ImageKind,
}

/// Profile returned by `GET /user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

/// Fields accepted by `PUT /user`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub email: String,
    pub name: String,
    /// Current password, required by the server to authorize the change
    pub password: String,
}

/// Result of a named operation: the id of the produced image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub id: String,
}

/// One upload that the server accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Position of the URI in the request
    pub index: usize,
    pub uri: String,
    pub id: String,
}

/// One upload that failed, with the reason
#[derive(Debug)]
pub struct UploadFailure {
    pub index: usize,
    pub uri: String,
    pub error: AppError,
}

/// Outcome of a batch upload with per-URI reporting
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<UploadedImage>,
    pub failures: Vec<UploadFailure>,
}

impl UploadReport {
    /// Server-assigned ids of the successful uploads, in input order
    pub fn ids(&self) -> Vec<String> {
        self.uploaded.iter().map(|u| u.id.clone()).collect()
    }

    /// Returns true when every URI was uploaded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Indices of the URIs that failed
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

/// Error types for the client
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message} (status {status})")]
    ServerError { status: u16, message: String },

    #[error("Request rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppError {
    /// True for 404-style errors; callers reconciling deletes treat this as success
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// True when the request never produced a response
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Timeout)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileIo(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}
