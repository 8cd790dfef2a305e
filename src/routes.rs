//! Axum route handlers for the typescope HTTP API.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::future::join_all;
use multer::{Constraints, Multipart, SizeLimit};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::classify::{
    classify_file, extension_of, format_size, guess_mime, ClassificationResult, Report,
    DEFAULT_MIME, UNKNOWN,
};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::exec::{ExecProxy, ExecuteRequest};
use crate::storage::{sanitize_filename, ScratchDir, UploadStore, UPLOAD_PREFIX};
use crate::tables::lookup_extension;

// ── Shared state ─────────────────────────────────────────────────────────────

pub struct AppState {
    pub uploads: UploadStore,
    pub scratch: ScratchDir,
    pub exec: ExecProxy,
    pub max_body_bytes: u64,
}

impl AppState {
    pub async fn from_config(config: &ServerConfig) -> std::io::Result<Self> {
        Ok(Self {
            uploads: UploadStore::open(&config.upload_dir).await?,
            scratch: ScratchDir::new()?,
            exec: ExecProxy::new(config.exec.clone()),
            max_body_bytes: config.max_body_bytes,
        })
    }
}

type Shared = Arc<AppState>;

// ── Request / response types ──────────────────────────────────────────────────

/// One file as the browser described it.
#[derive(Debug, Deserialize)]
pub struct ClientFileInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime: String,
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct ValidatedFile {
    pub name: String,
    pub size: u64,
    pub browser_type: String,
    pub browser_category: String,
    pub mime_type: String,
    pub extension: String,
    pub filetype: &'static str,
    pub category: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IdentifyStats {
    pub count: usize,
    pub total_size: String,
}

#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub validated_files: Vec<ValidatedFile>,
    pub stats: IdentifyStats,
}

#[derive(Debug, Serialize)]
pub struct FilenameResponse {
    pub filename: Option<String>,
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn create_router(state: Shared) -> Router {
    let limit = usize::try_from(state.max_body_bytes).unwrap_or(usize::MAX);
    Router::new()
        .route("/analyze", post(analyze))
        .route("/identify", post(identify))
        .route("/upload", post(upload))
        .route("/latest-image", get(latest_image))
        .route("/file/:filename", get(get_file))
        .route("/file/:filename/text", get(get_file_text))
        .route("/execute", post(execute))
        .route("/health", get(health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(limit)),
        )
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "running", "ready": true}))
}

/// `POST /analyze` — classify every `files` part of a multipart upload.
///
/// Parts are staged in the scratch directory, classified concurrently, and
/// removed before the response is sent.
pub async fn analyze(
    State(state): State<Shared>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<Report>, AppError> {
    let limit = state.max_body_bytes;
    let mut form = multipart(&headers, body, limit)?;
    let mut staged = Staged::default();
    let mut saw_files = false;

    while let Some(mut field) = form.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("files") {
            continue;
        }
        saw_files = true;
        let filename = match field.file_name() {
            Some(name) if !name.is_empty() => sanitize_filename(name),
            _ => continue,
        };

        let path = state.scratch.slot(&filename);
        staged.0.push((filename, path.clone()));
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
    }

    if !saw_files {
        return Err(AppError::InvalidRequest("No files provided".to_owned()));
    }

    let tasks = staged.0.iter().map(|(name, path)| {
        let (name, path) = (name.clone(), path.clone());
        tokio::task::spawn_blocking(move || classify_file(&path, &name))
    });
    let files: Vec<ClassificationResult> = join_all(tasks)
        .await
        .into_iter()
        .zip(&staged.0)
        .map(|(joined, (name, _))| {
            joined.unwrap_or_else(|e| ClassificationResult::Error {
                filename: name.clone(),
                error: format!("classification task failed: {e}"),
            })
        })
        .collect();
    drop(staged);

    let failed = files.iter().filter(|r| r.is_error()).count();
    info!(count = files.len(), failed, "analyzed upload batch");
    Ok(Json(Report::new(files)))
}

/// `POST /identify` — check browser-side detections against the file name.
/// No bytes are sent, so only the extension tier applies.
pub async fn identify(body: Bytes) -> Result<Json<IdentifyResponse>, AppError> {
    let no_data = || AppError::InvalidRequest("No file data provided".to_owned());

    let value: serde_json::Value = serde_json::from_slice(&body).map_err(|_| no_data())?;
    let files = value.get("files").cloned().ok_or_else(no_data)?;
    let files: Vec<ClientFileInfo> = serde_json::from_value(files)
        .map_err(|e| AppError::InvalidRequest(format!("invalid file entry: {e}")))?;

    let validated_files: Vec<ValidatedFile> = files.into_iter().map(validate_claim).collect();
    let total: u64 = validated_files.iter().map(|f| f.size).sum();
    let stats = IdentifyStats {
        count: validated_files.len(),
        total_size: format_size(total),
    };
    Ok(Json(IdentifyResponse { validated_files, stats }))
}

fn validate_claim(info: ClientFileInfo) -> ValidatedFile {
    let ext = extension_of(&info.name);
    let kind = lookup_extension(&ext).unwrap_or(UNKNOWN);
    ValidatedFile {
        mime_type: guess_mime(&info.name).unwrap_or_else(|| "unknown".to_owned()),
        extension: ext.to_uppercase(),
        filetype: kind.label,
        category: kind.category,
        name: info.name,
        size: info.size,
        browser_type: info.mime,
        browser_category: info.category,
    }
}

/// `POST /upload` — store the `file` part under a generated `img_<millis>` name.
pub async fn upload(
    State(state): State<Shared>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<FilenameResponse>, AppError> {
    let limit = state.max_body_bytes;
    let mut form = multipart(&headers, body, limit)?;

    while let Some(mut field) = form.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("file") {
            continue;
        }
        let original = field.file_name().unwrap_or_default().to_owned();
        let (name, mut file) = state.uploads.create(&original).await?;

        let written = async {
            while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, AppError>(())
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(rm) = state.uploads.remove(&name).await {
                warn!(filename = %name, error = %rm, "failed to remove partial upload");
            }
            return Err(e);
        }

        info!(filename = %name, original = %original, "stored upload");
        return Ok(Json(FilenameResponse { filename: Some(name) }));
    }

    Err(AppError::InvalidRequest("No file provided".to_owned()))
}

/// `GET /latest-image`
pub async fn latest_image(State(state): State<Shared>) -> Result<Json<FilenameResponse>, AppError> {
    let filename = state.uploads.latest(UPLOAD_PREFIX).await?;
    Ok(Json(FilenameResponse { filename }))
}

/// `GET /file/:filename` — raw bytes of a stored upload.
pub async fn get_file(
    State(state): State<Shared>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let bytes = read_upload(&state, &filename).await?;
    let mime = guess_mime(&filename).unwrap_or_else(|| DEFAULT_MIME.to_owned());
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// `GET /file/:filename/text` — the same upload decoded as UTF-8.
pub async fn get_file_text(
    State(state): State<Shared>,
    Path(filename): Path<String>,
) -> Result<String, AppError> {
    let bytes = read_upload(&state, &filename).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_upload(state: &AppState, filename: &str) -> Result<Vec<u8>, AppError> {
    match state.uploads.read(filename).await? {
        Some(bytes) => Ok(bytes),
        None => {
            warn!(filename, "requested upload not found");
            Err(AppError::NotFound("File not found".to_owned()))
        }
    }
}

/// `POST /execute` — relay a script to the remote run-code service.
pub async fn execute(State(state): State<Shared>, body: Bytes) -> Result<Response, AppError> {
    let req: ExecuteRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("invalid execution request: {e}")))?;

    for (field, value) in [("script", &req.script), ("language", &req.language)] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(AppError::InvalidRequest(format!("missing field `{field}`")));
        }
    }

    let relayed = state.exec.execute(&req).await?;
    Ok((relayed.status, Json(relayed.body)).into_response())
}

// ── Multipart helpers ─────────────────────────────────────────────────────────

fn multipart(headers: &HeaderMap, body: Body, limit: u64) -> Result<Multipart<'static>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::InvalidRequest("expected a multipart/form-data body".to_owned()))?;
    let boundary = multer::parse_boundary(content_type)
        .map_err(|e| AppError::InvalidRequest(format!("invalid multipart request: {e}")))?;
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    Ok(Multipart::with_constraints(body.into_data_stream(), boundary, constraints))
}

fn multipart_error(e: multer::Error, limit: u64) -> AppError {
    match e {
        multer::Error::StreamSizeExceeded { .. } | multer::Error::FieldSizeExceeded { .. } => {
            AppError::PayloadTooLarge { limit }
        }
        other => AppError::InvalidRequest(format!("invalid multipart body: {other}")),
    }
}

/// Scratch copies of one `/analyze` batch, deleted on drop so an aborted
/// request leaves nothing behind.
#[derive(Default)]
struct Staged(Vec<(String, PathBuf)>);

impl Drop for Staged {
    fn drop(&mut self) {
        for (_, path) in &self.0 {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove scratch file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_validation_uses_extension_table_only() {
        let v = validate_claim(ClientFileInfo {
            name: "top.sv".to_owned(),
            size: 12,
            mime: String::new(),
            category: "Code".to_owned(),
        });
        assert_eq!(v.extension, "SV");
        assert_eq!((v.filetype, v.category), ("SystemVerilog", "HDL"));
        assert_eq!(v.browser_category, "Code");
    }

    #[test]
    fn claim_without_extension_is_unknown() {
        let v = validate_claim(ClientFileInfo {
            name: "LICENSE".to_owned(),
            size: 1,
            mime: "text/plain".to_owned(),
            category: "Text".to_owned(),
        });
        assert_eq!(v.mime_type, "unknown");
        assert_eq!(v.extension, "");
        assert_eq!(v.filetype, "UNKNOWN");
    }

    #[test]
    fn oversized_stream_maps_to_413() {
        let err = multipart_error(multer::Error::StreamSizeExceeded { limit: 8 }, 8);
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 8 }));
    }
}
