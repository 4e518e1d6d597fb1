// POST /upload handler: stores one attachment and returns its reference

use std::convert::Infallible;
use std::path::Path;
use std::path::PathBuf;

use bytes::BufMut;
use futures_util::TryStreamExt;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::Reply;

use crate::models::{ErrorDetail, UploadReply};
use crate::source::UPLOAD_MIME_TYPES;

const FILE_FIELD: &str = "file";
const FALLBACK_NAME: &str = "upload";

#[derive(Debug, Error)]
enum UploadError {
    #[error("form has no `file` field")]
    MissingFile,

    #[error("malformed upload: {0}")]
    Malformed(#[from] warp::Error),

    #[error("Unsupported file type: {0}. Allowed types: {allowed}", allowed = UPLOAD_MIME_TYPES.join(", "))]
    UnsupportedType(String),

    #[error("failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingFile | UploadError::Malformed(_) => StatusCode::BAD_REQUEST,
            UploadError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub async fn upload_handler(form: FormData, dir: PathBuf) -> Result<warp::reply::Response, Infallible> {
    match receive(form, &dir).await {
        Ok(reply) => {
            info!(url = %reply.url, "stored upload");
            Ok(warp::reply::json(&reply).into_response())
        }
        Err(e) => {
            match &e {
                UploadError::Storage(_) => error!(error = %e, dir = %dir.display(), "upload failed"),
                _ => warn!(error = %e, "rejected upload"),
            }
            let status = e.status();
            let body = ErrorDetail { detail: e.to_string() };
            Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
        }
    }
}

async fn receive(form: FormData, dir: &Path) -> Result<UploadReply, UploadError> {
    futures_util::pin_mut!(form);
    while let Some(part) = form.try_next().await? {
        if part.name() == FILE_FIELD {
            return store(part, dir).await;
        }
    }
    Err(UploadError::MissingFile)
}

async fn store(part: Part, dir: &Path) -> Result<UploadReply, UploadError> {
    let content_type = media_type(part.content_type());
    if !UPLOAD_MIME_TYPES.contains(&content_type.as_str()) {
        return Err(UploadError::UnsupportedType(content_type));
    }

    let filename = format!("{}_{}", Uuid::new_v4().simple(), base_name(part.filename()));
    let data = part
        .stream()
        .try_fold(Vec::new(), |mut data, chunk| async move {
            data.put(chunk);
            Ok(data)
        })
        .await?;

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&filename), &data).await?;

    Ok(UploadReply {
        url: format!("/uploads/{}", filename),
        filename,
    })
}

/// `image/png; charset=..` -> `image/png`
fn media_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Last path component of a client-supplied filename.
fn base_name(filename: Option<&str>) -> &str {
    filename
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_NAME)
}
