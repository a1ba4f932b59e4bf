//! HTTP wrapper around [`crate::backfill::process`].
//!
//! ```text
//! POST /process             multipart `file` → run stats (JSON)
//! GET  /download/:filename  processed deck as an attachment
//! GET  /status              liveness + folder occupancy
//! ```
//!
//! The vision model is built once at startup and shared by every request
//! through [`AppState`]. Each request is still processed sequentially.

use crate::backfill;
use crate::config::BackfillConfig;
use crate::error::{AltTextError, ImageFailure};
use crate::model::ImageDescriber;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: `0.0.0.0:5001`.
    pub bind: SocketAddr,
    /// Where uploads are stored while they are processed. Default: `uploads`.
    pub upload_dir: PathBuf,
    /// Where processed decks are kept for download. Default: `processed`.
    pub output_dir: PathBuf,
    /// Largest accepted request body. Default: 200 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5001)),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("processed"),
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

/// State shared by all routes.
#[derive(Clone)]
pub struct AppState {
    pub describer: Arc<dyn ImageDescriber>,
    pub backfill: BackfillConfig,
    pub config: Arc<ServerConfig>,
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let limit = state.config.max_upload_bytes;
    Router::new()
        .route("/process", post(process_upload))
        .route("/download/:filename", get(download))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Create the working directories, bind, and serve until the process exits.
pub async fn serve(
    config: ServerConfig,
    describer: Arc<dyn ImageDescriber>,
    backfill: BackfillConfig,
) -> Result<(), AltTextError> {
    for dir in [&config.upload_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AltTextError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
    }

    let addr = config.bind;
    let state = AppState {
        describer,
        backfill,
        config: Arc::new(config),
    };
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AltTextError::Internal(format!("cannot bind {addr}: {e}")))?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| AltTextError::Internal(format!("server error: {e}")))
}

/// JSON error body `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<AltTextError> for ApiError {
    fn from(e: AltTextError) -> Self {
        let status = if e.is_document_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Body of a successful `POST /process`.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub message: String,
    pub slides_processed: usize,
    pub images_found: usize,
    pub images_updated: usize,
    pub images_skipped: usize,
    pub images_failed: usize,
    pub output_filename: String,
    pub failures: Vec<ImageFailure>,
}

/// POST /process — accept one `.pptx` upload and backfill it.
async fn process_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let mut upload: Option<(String, axum::body::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("upload interrupted: {e}")))?;
        upload = Some((original, data));
        break;
    }

    let (original, data) = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    if original.trim().is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    let filename = sanitize_filename(&original)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid file name '{original}'")))?;
    if !filename.to_ascii_lowercase().ends_with(".pptx") {
        return Err(ApiError::bad_request("Only .pptx files are supported"));
    }

    info!("Received upload '{}' ({} bytes)", filename, data.len());

    let config = &state.config;
    let output_name = format!("processed_{filename}");
    let output_path = config.output_dir.join(&output_name);

    for dir in [&config.upload_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("cannot create {}: {e}", dir.display()),
            )
        })?;
    }

    // Every request gets its own stored copy, so two uploads of `deck.pptx`
    // never share an input file. Dropping the handle deletes it.
    let stored = tempfile::Builder::new()
        .prefix("upload_")
        .suffix(".pptx")
        .tempfile_in(&config.upload_dir)
        .map_err(|e| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("cannot store upload: {e}"),
            )
        })?;
    tokio::fs::write(stored.path(), &data).await.map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("cannot store upload: {e}"),
        )
    })?;
    debug!(upload = %stored.path().display(), "Stored upload");

    let input = stored.path().to_string_lossy().into_owned();
    let result = backfill::process(
        &input,
        Some(output_path.as_path()),
        state.describer.as_ref(),
        &state.backfill,
    )
    .await;

    if let Err(e) = stored.close() {
        warn!("Could not remove upload {}: {}", input, e);
    }

    let stats = result?;
    Ok(Json(ProcessResponse {
        message: "File processed successfully".to_string(),
        slides_processed: stats.slides_processed,
        images_found: stats.images_found,
        images_updated: stats.images_updated,
        images_skipped: stats.images_skipped,
        images_failed: stats.images_failed,
        output_filename: stats.output_filename().unwrap_or(output_name),
        failures: stats.failures,
    }))
}

/// GET /download/:filename — stream a processed deck back as an attachment.
///
/// Only names `sanitize_filename` would have produced are served, which
/// rules out separators and parent components while still allowing names
/// like `processed_deck..v2.pptx`.
async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if sanitize_filename(&filename).as_deref() != Some(filename.as_str()) {
        warn!(filename = %filename, "Rejected suspicious download path");
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let path = state.config.output_dir.join(&filename);
    debug!(path = %path.display(), "Serving processed deck");

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::new(StatusCode::NOT_FOUND, "File not found"));
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to open processed deck");
            return Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read file",
            ));
        }
    };

    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PPTX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// GET /status — liveness and how many files each folder holds.
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uploads = count_files(&state.config.upload_dir).await;
    let outputs = count_files(&state.config.output_dir).await;
    Json(json!({
        "status": "running",
        "upload_folder": uploads,
        "output_folder": outputs,
    }))
}

async fn count_files(dir: &std::path::Path) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(_) => return 0,
    };
    let mut n = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            n += 1;
        }
    }
    n
}

/// Reduce a client-supplied file name to a safe base name.
///
/// Directory components are dropped, spaces become `_`, and anything other
/// than ASCII letters, digits, `.`, `-` and `_` is removed. Leading dots are
/// stripped so the result is never hidden or relative. `None` when nothing
/// usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            _ => None,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}
