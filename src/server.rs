//! HTTP server for the image catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/images/list` | All images with their tags |
//! | `POST` | `/images/upload` | Multipart upload (`file` + JSON `metadata`) |
//! | `GET`  | `/images/img/{id}` | Raw image bytes (`{id}` or `{id}{ext}`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Upload body
//!
//! `multipart/form-data` with a `file` part carrying the image (its
//! filename and content type are used when present) and an optional
//! `metadata` part holding JSON text:
//!
//! ```json
//! { "caption": "cat", "tags": ["pet", "orange"] }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid image format" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large`
//! (413), `unprocessable` (422), `internal` (500).

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db;
use crate::error::CatalogError;
use crate::ingest::{self, Upload};
use crate::migrate;
use crate::models::{ImageMetadata, ImageResponse, UploadMetadata};
use crate::query;
use crate::storage::ImageStorage;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    storage: Arc<ImageStorage>,
}

impl AppState {
    pub fn new(pool: SqlitePool, storage: ImageStorage) -> Self {
        Self {
            pool,
            storage: Arc::new(storage),
        }
    }

    /// Connection for the current request. It returns to the pool when
    /// dropped, whichever way the handler exits.
    async fn acquire(&self) -> Result<PoolConnection<Sqlite>, AppError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| AppError::from(CatalogError::Database(e)))
    }
}

/// Starts the HTTP server.
///
/// Opens the database, ensures the schema and image directory exist (any
/// failure here aborts startup), then binds to `[server].bind` and serves
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let storage = ImageStorage::new(&config.storage.image_path);
    storage.ensure_root().await?;

    let app = router(AppState::new(pool, storage), config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "image catalog listening");
    println!("Image catalog listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with all endpoints and middleware.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/images/list", get(handle_list_images))
        .route("/images/upload", post(handle_upload_image))
        .route("/images/img/{file}", get(handle_get_image))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn unprocessable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        code: "unprocessable".to_string(),
        message: message.into(),
    }
}

fn internal() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "internal server error".to_string(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => not_found("image not found"),
            err if err.is_client_error() => bad_request(err.to_string()),
            other => {
                tracing::error!(error = %other, "request failed");
                internal()
            }
        }
    }
}

/// Multipart failures carry their own status (413 when the body limit
/// is hit, 400 otherwise).
fn multipart_error(err: MultipartError) -> AppError {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "bad_request"
    };
    AppError {
        status,
        code: code.to_string(),
        message: err.body_text(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /images/list ============

async fn handle_list_images(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageMetadata>>, AppError> {
    let mut conn = state.acquire().await?;
    let images = query::list_images(&mut conn).await?;
    Ok(Json(images))
}

// ============ POST /images/upload ============

/// Reads the `file` and `metadata` parts, then runs ingestion.
///
/// Returns `400` for a missing file part or a rejected image, `422` when
/// `metadata` is not valid JSON.
async fn handle_upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImageResponse>, AppError> {
    let mut upload = Upload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.filename = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.data = field.bytes().await.map_err(multipart_error)?.to_vec();
                has_file = true;
            }
            Some("metadata") => {
                let text = field.text().await.map_err(multipart_error)?;
                upload.metadata = parse_upload_metadata(&text)?;
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(bad_request("missing multipart part: file"));
    }

    let mut conn = state.acquire().await?;
    let image = ingest::ingest(&mut conn, &state.storage, upload).await?;
    Ok(Json(image.to_response()?))
}

fn parse_upload_metadata(text: &str) -> Result<UploadMetadata, AppError> {
    if text.trim().is_empty() {
        return Ok(UploadMetadata::default());
    }
    serde_json::from_str(text).map_err(|e| unprocessable(format!("invalid metadata: {}", e)))
}

// ============ GET /images/img/{id} ============

/// Splits `12` or `12.png` into the id and optional extension.
fn parse_image_segment(segment: &str) -> Option<(i64, Option<&str>)> {
    let (id, ext) = match segment.find('.') {
        Some(i) => (&segment[..i], Some(&segment[i..])),
        None => (segment, None),
    };
    Some((id.parse().ok()?, ext))
}

/// Streams an image's payload with its stored content type.
///
/// `404` when the id is unknown or the requested extension does not match
/// the record; a record whose file is missing is a `500`.
async fn handle_get_image(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Response, AppError> {
    let (image_id, ext) =
        parse_image_segment(&segment).ok_or_else(|| not_found("image not found"))?;

    let mut conn = state.acquire().await?;
    let (image, data) = query::load_image_file(&mut conn, &state.storage, image_id).await?;
    drop(conn);

    if let Some(ext) = ext {
        if !ext.eq_ignore_ascii_case(image.file_ext()?) {
            return Err(not_found("image not found"));
        }
    }

    Ok(([(header::CONTENT_TYPE, image.content_type)], data).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_segment() {
        assert_eq!(parse_image_segment("12"), Some((12, None)));
        assert_eq!(parse_image_segment("12.png"), Some((12, Some(".png"))));
        assert_eq!(parse_image_segment("abc.png"), None);
        assert_eq!(parse_image_segment(""), None);
        assert_eq!(parse_image_segment(".png"), None);
    }

    #[test]
    fn test_parse_upload_metadata() {
        let m = parse_upload_metadata(r#"{"caption":"cat","tags":["pet"]}"#).unwrap();
        assert_eq!(m.caption.as_deref(), Some("cat"));
        assert_eq!(m.tags, vec!["pet"]);

        assert_eq!(parse_upload_metadata("  ").unwrap(), UploadMetadata::default());

        let err = parse_upload_metadata("{not json").unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_catalog_error_mapping() {
        assert_eq!(
            AppError::from(CatalogError::InvalidImage).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CatalogError::UnknownMimeType).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CatalogError::NotFound(4)).status,
            StatusCode::NOT_FOUND
        );
        let internal = AppError::from(CatalogError::MissingId);
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.message, "internal server error");
    }
}
