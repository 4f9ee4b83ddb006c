//! Static file service over a single web root.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Error, Debug)]
pub enum FileServingError {
    #[error("path escapes the web root: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },
}

impl FileServingError {
    pub fn status(&self) -> StatusCode {
        match self {
            FileServingError::Forbidden(_) => StatusCode::FORBIDDEN,
            FileServingError::NotFound(_) => StatusCode::NOT_FOUND,
            FileServingError::ReadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> &'static str {
        match self {
            FileServingError::Forbidden(_) => "Forbidden.",
            FileServingError::NotFound(_) => "Not found.",
            FileServingError::ReadFailed { .. } => "Server error.",
        }
    }
}

impl IntoResponse for FileServingError {
    fn into_response(self) -> Response {
        match &self {
            FileServingError::ReadFailed { .. } => tracing::error!(error = %self, "serving failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }
        (self.status(), [(header::CONTENT_TYPE, PLAIN_TEXT)], self.body()).into_response()
    }
}

/// Content type by file extension, case-insensitive.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Map a raw request path to a file under `root`.
///
/// The path is percent-decoded (invalid UTF-8 is not found) and normalized lexically; `/` means
/// `/index.html`. Any `..` that would climb above the root is rejected.
pub fn resolve(root: &Path, request_path: &str) -> Result<PathBuf, FileServingError> {
    let decoded = urlencoding::decode(request_path)
        .map_err(|_| FileServingError::NotFound(request_path.to_string()))?;
    let decoded = if decoded == "/" { "/index.html".into() } else { decoded };

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(FileServingError::Forbidden(request_path.to_string()));
                }
            }
            s if s.contains('\0') => return Err(FileServingError::Forbidden(request_path.to_string())),
            s => segments.push(s),
        }
    }

    Ok(segments.iter().fold(root.to_path_buf(), |path, s| path.join(s)))
}

async fn load(root: &Path, request_path: &str) -> Result<Response, FileServingError> {
    let mut path = resolve(root, request_path)?;
    let not_found = || FileServingError::NotFound(request_path.to_string());

    let meta = tokio::fs::metadata(&path).await.map_err(|_| not_found())?;
    if meta.is_dir() {
        path.push("index.html");
        tokio::fs::metadata(&path).await.map_err(|_| not_found())?;
    }

    let data = tokio::fs::read(&path)
        .await
        .map_err(|source| FileServingError::ReadFailed { path: path.clone(), source })?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "served");
    Ok(([(header::CONTENT_TYPE, content_type(&path))], data).into_response())
}

async fn serve(State(root): State<Arc<PathBuf>>, uri: Uri) -> Result<Response, FileServingError> {
    load(&root, uri.path()).await
}

pub fn router(root: PathBuf) -> Router {
    Router::new().fallback(serve).with_state(Arc::new(root))
}
