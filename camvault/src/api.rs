//! CamVault - HTTP API
//!
//! POST /signup, POST /login: account registration and login
//! POST /upload: raw camera payload (application/octet-stream or image/jpeg)
//! POST /decrypt-images: decrypt an owner's images into the plain cache
//! POST /get-decrypted-images: list already-decrypted images
//! GET  /images/{filename}: decrypted images as static files
//! GET  /health

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::decrypt::IMAGES_ROUTE;
use crate::error::{VaultError, VaultResult};
use crate::model::{
    AccountSummary, DecryptRequest, ImageDescriptor, ListDecryptedRequest, LoginRequest,
    SignupRequest,
};
use crate::vault::ImageVault;

/// Header carrying the uploading camera's product number
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Content types accepted on /upload
const UPLOAD_CONTENT_TYPES: &[&str] = &["application/octet-stream", "image/jpeg"];

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE BODIES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: AccountSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub success: bool,
    pub message: String,
    pub images: Vec<ImageDescriptor>,
}

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A vault error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub VaultError);

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = if self.0.is_internal() {
            tracing::error!("Request failed: {}", self.0);
            ErrorBody {
                success: false,
                message: "Server error".into(),
                error: Some(self.0.to_string()),
            }
        } else {
            ErrorBody {
                success: false,
                message: self.0.to_string(),
                error: None,
            }
        };

        (status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Build the full axum Router
pub fn build_router(vault: Arc<ImageVault>, max_upload_bytes: usize) -> Router {
    let images = ServeDir::new(vault.plain_cache_dir());

    Router::new()
        .route("/health", get(health))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/decrypt-images", post(decrypt_images))
        .route("/get-decrypted-images", post(get_decrypted_images))
        .nest_service(IMAGES_ROUTE, images)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(vault)
}

/// Run store and crypto work off the async runtime
async fn blocking<T, F>(vault: Arc<ImageVault>, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&ImageVault) -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&vault))
        .await
        .map_err(|e| ApiError(VaultError::StorageUnavailable(format!("Task join error: {}", e))))?
        .map_err(ApiError)
}

/// Malformed or absent JSON is treated like an empty form, so field
/// validation reports what is missing.
fn form<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(value)) => value,
        Err(rejection) => {
            tracing::debug!("Unreadable JSON body: {}", rejection);
            T::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// POST /signup
async fn signup(
    State(vault): State<Arc<ImageVault>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let req = form(payload);
    blocking(vault, move |v| v.accounts().register(&req)).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message: "User registered successfully".into(),
        }),
    ))
}

/// POST /login
async fn login(
    State(vault): State<Arc<ImageVault>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let req = form(payload);
    let user = blocking(vault, move |v| v.accounts().login(&req)).await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        user,
    }))
}

/// POST /upload
///
/// The body is the raw image. `X-Device-Id` is optional unless the server
/// binds uploads to devices.
async fn upload(
    State(vault): State<Arc<ImageVault>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if !UPLOAD_CONTENT_TYPES.contains(&mime.as_str()) {
        return Err(VaultError::UnsupportedMediaType(content_type.to_string()).into());
    }

    let device_id = headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let receipt = blocking(vault, move |v| v.uploads().upload(&body, device_id.as_deref())).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "Image received and encrypted".into(),
        filename: receipt.filename,
    }))
}

/// POST /decrypt-images
async fn decrypt_images(
    State(vault): State<Arc<ImageVault>>,
    payload: Result<Json<DecryptRequest>, JsonRejection>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let req = form(payload);
    let images = blocking(vault, move |v| {
        v.decryptor()
            .decrypt_all(req.email.as_deref(), req.aes_key.as_deref())
    })
    .await?;

    Ok(Json(ImagesResponse {
        success: true,
        message: "Images decrypted successfully".into(),
        images,
    }))
}

/// POST /get-decrypted-images
async fn get_decrypted_images(
    State(vault): State<Arc<ImageVault>>,
    payload: Result<Json<ListDecryptedRequest>, JsonRejection>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let req = form(payload);
    let images = blocking(vault, move |v| v.decryptor().list_decrypted(req.email.as_deref())).await?;

    Ok(Json(ImagesResponse {
        success: true,
        message: "Decrypted images fetched successfully".into(),
        images,
    }))
}
