//! HTTP API over the conversion pipeline.
//!
//! | Method | Path                       | Response                                   |
//! |--------|----------------------------|--------------------------------------------|
//! | GET    | `/`                        | liveness message                           |
//! | POST   | `/fileConverter`           | convert the multipart field `file`         |
//! | GET    | `/fileConverter/:fileName` | page-image URLs for an earlier conversion  |
//! | GET    | `/get-pdf/:fileName`       | URL of `{fileName}.pdf`                    |
//! | GET    | `/jobs/:jobId`             | job manifest                               |
//! | GET    | `/uploads/*`               | static files under the upload root         |
//!
//! Errors are `{"error": "..."}`. Server-side failures use a fixed message
//! per endpoint; the cause goes to the log only.

use crate::convert::Converter;
use crate::error::{ConvertError, ErrorKind};
use crate::manifest::JobManifest;
use crate::pipeline::dispatch::base_name_of;
use crate::progress::{ProgressHandle, TracingProgress};
use crate::storage::{self, find_pdf, list_page_images, mime_for_path};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

const CONVERSION_FAILED: &str = "File conversion failed";
const IMAGES_FAILED: &str = "Error fetching images";
const PDF_FAILED: &str = "Error fetching PDF";
const JOB_FAILED: &str = "Error fetching job";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub original_file_name: String,
    pub images: Vec<String>,
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    pub success: bool,
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfResponse {
    pub success: bool,
    pub pdf_url: String,
}

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Map a library error to a client-facing one. `internal` replaces the
    /// message of anything that is not the client's fault.
    fn from_convert(err: ConvertError, internal: &str) -> Self {
        let (status, message) = match err.kind() {
            ErrorKind::BadInput => (StatusCode::BAD_REQUEST, client_message(&err)),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, client_message(&err)),
            ErrorKind::Internal => {
                error!("{}: {}", internal, err);
                (StatusCode::INTERNAL_SERVER_ERROR, internal.to_string())
            }
        };
        Self { status, message }
    }

    fn multipart(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

fn client_message(err: &ConvertError) -> String {
    match err {
        ConvertError::MissingFile => "No file uploaded",
        ConvertError::UnsupportedFormat { .. } => "Unsupported file format",
        ConvertError::InvalidFileName { .. } => "Invalid file name",
        ConvertError::ImagesNotFound { .. } => "No images found",
        ConvertError::PdfNotFound { .. } => "PDF file not found",
        ConvertError::JobNotFound { .. } => "Job not found",
        _ => "Request failed",
    }
    .to_string()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.converter.config();
    let files = ServeDir::new(&config.upload_root);
    let prefix = config.public_prefix.trim_end_matches('/').to_string();
    let body_limit = DefaultBodyLimit::max(config.max_upload_bytes);

    let api = Router::new()
        .route("/", get(health))
        .route("/fileConverter", post(upload_and_convert))
        .route("/fileConverter/:fileName", get(get_images))
        .route("/get-pdf/:fileName", get(get_pdf))
        .route("/jobs/:jobId", get(get_job));

    let app = if prefix.is_empty() {
        api.fallback_service(files)
    } else {
        api.nest_service(&prefix, files)
    };

    app.layer(body_limit)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(converter: Converter) -> std::io::Result<()> {
    let config = converter.config();
    storage::ensure_layout(config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server is running on {}", addr);

    let app = router(AppState { converter });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "code": 200,
        "message": "Server is running successfully.",
    }))
}

async fn upload_and_convert(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let missing = || ApiError::from_convert(ConvertError::MissingFile, CONVERSION_FAILED);
    let mut multipart = multipart.map_err(|_| missing())?;

    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(ApiError::multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let mime = field
            .content_type()
            .map(str::to_owned)
            .unwrap_or_else(|| mime_for_path(std::path::Path::new(&name)).to_string());
        let bytes = field.bytes().await.map_err(ApiError::multipart)?;
        file = Some((name, mime, bytes));
        break;
    }
    let (name, mime, bytes) = file.ok_or_else(missing)?;

    let base_name = base_name_of(std::path::Path::new(&name));
    let progress: ProgressHandle = Arc::new(TracingProgress::new(base_name));
    let job = state
        .converter
        .store_and_convert(&name, &mime, &bytes, Some(progress))
        .await
        .map_err(|e| ApiError::from_convert(e, CONVERSION_FAILED))?;

    Ok(Json(UploadResponse {
        success: true,
        message: "File converted successfully!".into(),
        images: job.images(),
        original_file_name: job.source.original_name,
        job_id: job.job_id.to_string(),
    }))
}

async fn get_images(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let images = list_page_images(state.converter.config(), &file_name)
        .await
        .map_err(|e| ApiError::from_convert(e, IMAGES_FAILED))?;
    Ok(Json(ImagesResponse {
        success: true,
        images,
    }))
}

async fn get_pdf(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<PdfResponse>, ApiError> {
    let pdf_url = find_pdf(state.converter.config(), &file_name)
        .await
        .map_err(|e| ApiError::from_convert(e, PDF_FAILED))?;
    Ok(Json(PdfResponse {
        success: true,
        pdf_url,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobManifest>, ApiError> {
    let manifest = JobManifest::load(state.converter.config(), &job_id)
        .await
        .map_err(|e| ApiError::from_convert(e, JOB_FAILED))?;
    Ok(Json(manifest))
}
