use std::collections::HashSet;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use pcat_publish::{sweep_stale_temp_files, PublishRequest};
use pcat_store::FileStore;
use pcat_types::{is_leaf, normalize, validate_upload_name, PublishResponse, SaveMode, TempSuffix};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Name of the multipart field carrying uploaded files.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub save: Option<String>,
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Publish a batch of files and report what the server still lacks.
///
/// Files are written under temp names when `save` is `ifcomplete` or `no`,
/// otherwise under their final names. Nothing is written until every part
/// has been read, so a malformed request leaves no files behind. The whole
/// request runs under the database lock so two publishes to one database
/// never interleave.
pub async fn upload_handler(
    State(state): State<AppState>,
    Path(database_id): Path<String>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ServerResult<Json<PublishResponse>> {
    let (database_id, store) = state.database(&database_id)?;
    let save = SaveMode::from_query(query.save.as_deref());
    let _guard = state.locks().lock(&database_id).await;

    if save.is_staged() {
        let ttl = state.publisher().config().stale_temp_ttl();
        match sweep_stale_temp_files(&store, ttl).await {
            Ok(report) if !report.removed.is_empty() => {
                info!(%database_id, removed = report.removed.len(), "swept stale temp files");
            }
            Ok(_) => {}
            Err(e) => warn!(%database_id, error = %e, "stale temp sweep failed"),
        }
    }

    let mut parts = Vec::new();
    let mut seen = HashSet::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }
        let name = field
            .file_name()
            .map(normalize)
            .ok_or_else(|| ServerError::BadRequest("file part without a file name".into()))?;
        validate_upload_name(&name).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        if !seen.insert(name.clone()) {
            return Err(ServerError::BadRequest(format!("duplicate file {name}")));
        }
        parts.push((name, field.bytes().await?));
    }

    let suffix = save.is_staged().then(TempSuffix::new);
    let mut uploaded = Vec::with_capacity(parts.len());
    for (name, bytes) in parts {
        let stored = match &suffix {
            Some(suffix) => suffix.stage(&name),
            None => name,
        };
        store.write(&stored, &bytes).await?;
        debug!(name = %stored, size = bytes.len(), "stored upload");
        uploaded.push(stored);
    }

    info!(%database_id, ?save, files = uploaded.len(), "publish request");
    let request = match suffix {
        Some(suffix) => PublishRequest::staged(&database_id, uploaded, save, suffix),
        None => PublishRequest::direct(&database_id, uploaded),
    };
    let outcome = state.publisher().publish(&store, request).await?;
    Ok(Json(PublishResponse::new(outcome.missing_files)))
}

/// Serve one stored file.
pub async fn download_handler(
    State(state): State<AppState>,
    Path((database_id, file_name)): Path<(String, String)>,
) -> ServerResult<impl IntoResponse> {
    let (_, store) = state.database(&database_id)?;
    let name = normalize(&file_name);
    let bytes = store
        .read(&name)
        .await?
        .ok_or(ServerError::NotFound(name.clone()))?;
    let content_type = if is_leaf(&name) {
        "application/octet-stream"
    } else {
        "application/json"
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
