// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Remote operation gateway
//
// Every capability of the image-editing API is one method here. Authenticated
// calls read the bearer token from the session view at call time and fail
// fast when there is none. No call is retried; callers re-invoke explicitly.

use crate::activity::{ActivityTracker, GatewayEvent};
use crate::operations::{Operation, OperationTable};
use crate::records::{RawImageEntry, RecordMapper};
use crate::session::SessionView;
use crate::settings::ClientSettings;
use crate::types::{
    AppError, ImageKind, ImageRecord, OperationOutcome, ProfileUpdate, UploadFailure,
    UploadReport, UploadedImage, UserProfile,
};
use reqwest::{multipart, Body, Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Credential handed back by register/login
#[derive(Clone, PartialEq, Eq)]
pub struct AccountGrant {
    pub token: String,
    /// Display name, when the server sends it
    pub user_name: Option<String>,
}

impl std::fmt::Debug for AccountGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountGrant")
            .field("token", &"<redacted>")
            .field("user_name", &self.user_name)
            .finish()
    }
}

/// HTTP client for the image-editing API
pub struct ImageGateway {
    http_client: Client,
    base_url: String,
    session: SessionView,
    operations: OperationTable,
    mapper: RecordMapper,
    upload_field: String,
    activity: ActivityTracker,
}

impl ImageGateway {
    /// Build a gateway; the operation table is validated here, not at call time
    pub fn new(settings: &ClientSettings, session: SessionView) -> Result<Self, AppError> {
        let base_url = settings.base_url()?.as_str().trim_end_matches('/').to_string();
        let operations = OperationTable::new()?;

        let http_client = Client::builder()
            .timeout(settings.request_timeout())
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| AppError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        let mapper = RecordMapper::new(&base_url, &settings.date_format, ImageKind::Uploaded);

        Ok(Self {
            http_client,
            base_url,
            session,
            operations,
            mapper,
            upload_field: settings.upload_field.clone(),
            activity: ActivityTracker::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// In-flight tracking and event subscription for frontends
    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn bearer(&self) -> Result<String, AppError> {
        self.session.token().ok_or(AppError::Unauthenticated)
    }

    async fn tracked<T, F>(&self, label: &str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let activity = self.activity.begin(label);
        activity.track(fut.await)
    }

    /// Send a request and turn non-success statuses into typed errors
    async fn send(&self, request: RequestBuilder, subject: &str) -> Result<Response, AppError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        tracing::warn!("Request for {} failed with status {}", subject, status);
        Err(error_for_status(status, server_message(&text), subject))
    }

    // ---- accounts -------------------------------------------------------

    /// `POST /user`
    pub async fn register_account(
        &self,
        email: &str,
        password: &str,
        user_name: &str,
    ) -> Result<AccountGrant, AppError> {
        self.tracked("register", async {
            let request = self
                .http_client
                .post(self.url("user"))
                .json(&json!({ "Email": email, "Password": password, "userName": user_name }));

            let body = read_json(self.send(request, "account").await?).await?;
            let token = string_field(&body, &["token"]).ok_or_else(|| {
                AppError::InvalidResponse("registration response has no token".to_string())
            })?;

            Ok(AccountGrant {
                token,
                user_name: string_field(&body, &["User", "userName"])
                    .or_else(|| Some(user_name.to_string())),
            })
        })
        .await
    }

    /// `POST /user/login`; accepts `{token}` and the older `{userId}` shape
    pub async fn login_account(&self, email: &str, password: &str) -> Result<AccountGrant, AppError> {
        self.tracked("login", async {
            let request = self
                .http_client
                .post(self.url("user/login"))
                .json(&json!({ "Email": email, "Password": password }));

            let body = read_json(self.send(request, "account").await?).await?;
            let token = string_field(&body, &["token", "userId"]).ok_or_else(|| {
                AppError::InvalidResponse("login response has neither token nor userId".to_string())
            })?;

            Ok(AccountGrant {
                token,
                user_name: string_field(&body, &["User", "userName"]),
            })
        })
        .await
    }

    /// `GET /user`
    pub async fn fetch_profile(&self) -> Result<UserProfile, AppError> {
        let token = self.bearer()?;
        self.tracked("profile", async {
            let request = self.http_client.get(self.url("user")).bearer_auth(&token);
            let body = read_json(self.send(request, "user").await?).await?;

            let user = body
                .get("user")
                .cloned()
                .ok_or_else(|| AppError::InvalidResponse("profile has no 'user'".to_string()))?;
            serde_json::from_value(user)
                .map_err(|e| AppError::InvalidResponse(format!("Malformed profile: {}", e)))
        })
        .await
    }

    /// `PUT /user`
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), AppError> {
        let token = self.bearer()?;
        self.tracked("profile", async {
            let request = self
                .http_client
                .put(self.url("user"))
                .bearer_auth(&token)
                .json(&json!({
                    "email": update.email,
                    "name": update.name,
                    "password": update.password,
                    "role": "User",
                }));
            self.send(request, "user").await?;
            Ok(())
        })
        .await
    }

    /// `PATCH /auth`: ask the server to email a reset code
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        self.tracked("password-reset", async {
            let request = self
                .http_client
                .patch(self.url("auth"))
                .json(&json!({ "email": email }));
            self.send(request, "account").await?;
            Ok(())
        })
        .await
    }

    /// `PUT /auth`: submit the emailed code with the new password
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        self.tracked("password-reset", async {
            let request = self.http_client.put(self.url("auth")).json(&json!({
                "passport": code,
                "refString": format!("{}-{}", email, code),
                "newPassword": new_password,
            }));
            self.send(request, "recovery code").await?;
            Ok(())
        })
        .await
    }

    // ---- images ---------------------------------------------------------

    /// Upload files one by one; failures are reported per URI, not raised
    pub async fn upload_images(&self, uris: &[String]) -> Result<UploadReport, AppError> {
        if uris.is_empty() {
            return Err(AppError::Validation("no images selected".to_string()));
        }
        let token = self.bearer()?;

        let mut activity = self.activity.begin("upload");
        let mut report = UploadReport::default();
        let total = uris.len();

        for (index, uri) in uris.iter().enumerate() {
            match self.upload_one(&token, uri).await {
                Ok(id) => {
                    tracing::info!("Uploaded image {}/{} as {}", index + 1, total, id);
                    self.activity.emit(GatewayEvent::UploadProgress {
                        index,
                        total,
                        uri: uri.clone(),
                        id: Some(id.clone()),
                    });
                    report.uploaded.push(UploadedImage {
                        index,
                        uri: uri.clone(),
                        id,
                    });
                }
                Err(error) => {
                    tracing::warn!("Upload {}/{} failed: {}", index + 1, total, error);
                    self.activity.emit(GatewayEvent::UploadProgress {
                        index,
                        total,
                        uri: uri.clone(),
                        id: None,
                    });
                    report.failures.push(UploadFailure {
                        index,
                        uri: uri.clone(),
                        error,
                    });
                }
            }
        }

        if report.is_complete() {
            activity.succeed();
        }
        Ok(report)
    }

    async fn upload_one(&self, token: &str, uri: &str) -> Result<String, AppError> {
        let path = local_path(uri)?;

        let file = File::open(&path)
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to open {}: {}", path.display(), e)))?;
        let file_size = file
            .metadata()
            .await
            .map_err(|e| AppError::FileIo(format!("Failed to get file metadata: {}", e)))?
            .len();

        let mime = mime_guess::from_path(&path).first_or(mime_guess::mime::IMAGE_JPEG);
        let part = multipart::Part::stream_with_length(
            Body::wrap_stream(ReaderStream::new(file)),
            file_size,
        )
        .file_name(generated_filename(&path))
        .mime_str(mime.as_ref())
        .map_err(|e| AppError::Validation(format!("Unsupported content type {}: {}", mime, e)))?;

        let form = multipart::Form::new().part(self.upload_field.clone(), part);
        let request = self
            .http_client
            .post(self.url("images"))
            .bearer_auth(token)
            .multipart(form);

        let body = read_json(self.send(request, "image").await?).await?;
        extract_id(&body)
            .ok_or_else(|| AppError::InvalidResponse("upload response has no image id".to_string()))
    }

    /// Look up `name` in the operation table and run it on `image`
    pub async fn apply_operation(
        &self,
        name: &str,
        image: &ImageRecord,
        params: &[f64],
    ) -> Result<OperationOutcome, AppError> {
        let operation = self.operations.resolve(name, params)?;
        self.apply(&operation, image).await
    }

    /// `POST /processes/defined/<endpoint>`
    pub async fn apply(
        &self,
        operation: &Operation,
        image: &ImageRecord,
    ) -> Result<OperationOutcome, AppError> {
        let token = self.bearer()?;
        let label = operation.kind().slug();
        tracing::info!("Applying {} to image {}", label, image.id);

        self.tracked(label, async {
            let request = self
                .http_client
                .post(self.url(&format!("processes/defined/{}", operation.endpoint())))
                .bearer_auth(&token)
                .json(&operation.payload(&image.id));

            let body = read_json(self.send(request, "image").await?).await?;
            let id = extract_id(&body).ok_or_else(|| {
                AppError::InvalidResponse(format!("{} response has no result id", label))
            })?;
            Ok(OperationOutcome { id })
        })
        .await
    }

    /// `GET /images`
    pub async fn list_images(&self) -> Result<Vec<ImageRecord>, AppError> {
        let token = self.bearer()?;
        self.tracked("list", async {
            let request = self.http_client.get(self.url("images")).bearer_auth(&token);
            let body = read_json(self.send(request, "images").await?).await?;
            let records = self.mapper.parse_list(body)?;
            tracing::debug!("Fetched {} image(s)", records.len());
            Ok(records)
        })
        .await
    }

    /// Delete a record through the route matching its kind
    pub async fn delete_image(&self, image: &ImageRecord) -> Result<(), AppError> {
        self.delete_by_id(&image.id, image.kind).await
    }

    /// `DELETE /images/:id` for uploads, `DELETE /processes/:id` for outputs
    pub async fn delete_by_id(&self, id: &str, kind: ImageKind) -> Result<(), AppError> {
        let token = self.bearer()?;
        self.tracked("delete", async {
            let request = self
                .http_client
                .delete(self.url(&format!("{}/{}", kind.collection_path(), id)))
                .bearer_auth(&token);
            self.send(request, "image").await?;
            tracing::info!("Deleted {} image {}", kind.label(), id);
            Ok(())
        })
        .await
    }

    /// `PUT /images` with the flipped flag; returns the updated record
    pub async fn toggle_favorite(&self, image: &ImageRecord) -> Result<ImageRecord, AppError> {
        let token = self.bearer()?;
        let new_value = !image.is_favorite;

        self.tracked("favorite", async {
            let request = self
                .http_client
                .put(self.url("images"))
                .bearer_auth(&token)
                .json(&json!({ "imageId": image.id, "user_favorite": new_value }));
            self.send(request, "image").await?;

            Ok(ImageRecord {
                is_favorite: new_value,
                ..image.clone()
            })
        })
        .await
    }

    /// `GET /processes/:id`
    pub async fn get_process(&self, id: &str) -> Result<ImageRecord, AppError> {
        let token = self.bearer()?;
        self.tracked("process", async {
            let request = self
                .http_client
                .get(self.url(&format!("processes/{}", id)))
                .bearer_auth(&token);
            let body = read_json(self.send(request, "process").await?).await?;

            let entry = body.get("image").cloned().unwrap_or(body);
            let entry: RawImageEntry = serde_json::from_value(entry)
                .map_err(|e| AppError::InvalidResponse(format!("Malformed process: {}", e)))?;
            Ok(self
                .mapper
                .with_default_kind(ImageKind::Processed)
                .into_record(entry))
        })
        .await
    }

    /// `GET /processes/recent`
    pub async fn recent_processes(&self) -> Result<Vec<ImageRecord>, AppError> {
        self.process_collection("processes/recent").await
    }

    /// `GET /processes/favorite`
    pub async fn favorite_processes(&self) -> Result<Vec<ImageRecord>, AppError> {
        self.process_collection("processes/favorite").await
    }

    async fn process_collection(&self, path: &str) -> Result<Vec<ImageRecord>, AppError> {
        let token = self.bearer()?;
        self.tracked("processes", async {
            let request = self.http_client.get(self.url(path)).bearer_auth(&token);
            let body = read_json(self.send(request, "processes").await?).await?;
            self.mapper
                .with_default_kind(ImageKind::Processed)
                .parse_list(body)
        })
        .await
    }
}

/// Map a transport failure (no response) into the error taxonomy
fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout
    } else if e.is_connect() {
        AppError::Network(format!("Cannot connect to server: {}", e))
    } else {
        AppError::Network(format!("Request failed: {}", e))
    }
}

/// Map an HTTP error status into the error taxonomy
pub(crate) fn error_for_status(
    status: StatusCode,
    server_message: Option<String>,
    subject: &str,
) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthenticated,
        StatusCode::NOT_FOUND => AppError::NotFound(format!("{} not found", subject)),
        StatusCode::CONFLICT => AppError::Conflict(format!("{} already exists", subject)),
        s if s.is_server_error() => AppError::ServerError {
            status: s.as_u16(),
            message: "server error".to_string(),
        },
        s => AppError::Rejected {
            status: s.as_u16(),
            message: server_message
                .or_else(|| s.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request rejected".to_string()),
        },
    }
}

/// Pull the human-readable message out of an error body
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "Description"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

async fn read_json(response: Response) -> Result<Value, AppError> {
    let text = response.text().await.map_err(transport_error)?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| AppError::InvalidResponse(format!("Response is not JSON: {}", e)))
}

fn string_field(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Result id from `{id}`, `{Id}` or `{image: {Id|id}}`
fn extract_id(body: &Value) -> Option<String> {
    string_field(body, &["id", "Id"]).or_else(|| {
        body.get("image")
            .and_then(|image| string_field(image, &["Id", "id"]))
    })
}

/// Accept plain paths and `file://` URIs
fn local_path(uri: &str) -> Result<PathBuf, AppError> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("image URI is empty".to_string()));
    }
    Ok(PathBuf::from(trimmed.strip_prefix("file://").unwrap_or(trimmed)))
}

fn generated_filename(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("jpg");
    format!("upload-{}.{}", Uuid::new_v4(), extension.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, None, "account"),
            AppError::NotFound(msg) if msg == "account not found"
        ));
        assert!(matches!(
            error_for_status(StatusCode::CONFLICT, None, "account"),
            AppError::Conflict(msg) if msg == "account already exists"
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, None, "image"),
            AppError::ServerError { status: 502, .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, None, "image"),
            AppError::Unauthenticated
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_REQUEST, Some("bad id".to_string()), "image"),
            AppError::Rejected { status: 400, message } if message == "bad id"
        ));
    }

    #[test]
    fn test_server_message_keys() {
        assert_eq!(server_message(r#"{"msg":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(
            server_message(r#"{"Description":"Código inválido"}"#).as_deref(),
            Some("Código inválido")
        );
        assert_eq!(server_message("<html>"), None);
    }

    #[test]
    fn test_extract_id_shapes() {
        assert_eq!(extract_id(&json!({ "id": "p1" })).as_deref(), Some("p1"));
        assert_eq!(extract_id(&json!({ "image": { "Id": 9 } })).as_deref(), Some("9"));
        assert_eq!(extract_id(&json!({ "ok": true })), None);
    }

    #[test]
    fn test_local_path_strips_file_scheme() {
        assert_eq!(
            local_path("file:///tmp/a.png").unwrap(),
            PathBuf::from("/tmp/a.png")
        );
        assert!(local_path("  ").is_err());
    }

    #[test]
    fn test_generated_filename_keeps_extension() {
        let name = generated_filename(Path::new("/tmp/photo.PNG"));
        assert!(name.starts_with("upload-"));
        assert!(name.ends_with(".png"));
        assert!(generated_filename(Path::new("/tmp/raw")).ends_with(".jpg"));
    }

    #[test]
    fn test_grant_debug_hides_token() {
        let grant = AccountGrant {
            token: "secret-token".to_string(),
            user_name: None,
        };
        assert!(!format!("{:?}", grant).contains("secret-token"));
    }
}
