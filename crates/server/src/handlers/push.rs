//! Push pipeline: accept an artifact and upload it in the background.

use crate::error::{ApiError, ApiResult, Envelope};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, State};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use templar_core::object_key;
use templar_metadata::{
    JOB_TYPE_TEMPLATE_PUSH, JobRepo, JobUpdate, MetadataStore, TemplateRepo, TemplateRow,
    TemplateVersionRow, VersionRepo, job_status,
};
use templar_storage::io::{HashingReader, ProgressReader};
use templar_storage::{ObjectReader, ObjectStore};
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Successful push acknowledgement.
#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub message: String,
}

/// Validated push request with the artifact spooled to disk.
struct PushRequest {
    template_id: Uuid,
    version: i64,
    spool_path: PathBuf,
    file_size: u64,
}

/// `POST /api/v1/push` — multipart form: `template_id`, `version`, `file`.
///
/// The artifact is spooled to a temp file while the request body streams in;
/// a pending job row is committed before the background upload is enqueued so
/// clients polling `/jobs` always observe the job before it starts moving.
pub async fn push(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<Envelope<PushResponse>>> {
    let request = read_push_request(multipart).await?;

    let metadata_json = serde_json::json!({
        "template_id": request.template_id,
        "version": request.version,
        "file_size": request.file_size,
    })
    .to_string();

    // The job row is committed before any checks so it is immediately
    // visible; failed checks below mark it as errored.
    let job_id = state
        .metadata
        .create_job(
            JOB_TYPE_TEMPLATE_PUSH,
            request.template_id,
            Some(request.version),
            job_status::PENDING,
            0,
            OffsetDateTime::now_utc(),
            &metadata_json,
        )
        .await?;

    if let Err(e) = prepare_push(&state, &request).await {
        let update = JobUpdate::status(job_status::ERROR)
            .with_error(e.to_string())
            .with_completed_at(OffsetDateTime::now_utc());
        if let Err(update_err) = state.metadata.update_job(job_id, &update).await {
            warn!(job_id, error = %update_err, "failed to mark rejected job as error");
        }
        remove_spool(&request.spool_path).await;
        return Err(e);
    }

    let task = run_push_job(
        state.metadata.clone(),
        state.store.clone(),
        job_id,
        request.template_id,
        request.version,
        request.spool_path.clone(),
        request.file_size,
    );
    state.jobs.enqueue(job_id, task).await?;

    Ok(Envelope::data(PushResponse {
        message: "Template pushed, will be available in a few seconds".to_string(),
    }))
}

/// Parse and validate the multipart form, spooling the file field to disk.
///
/// `spooled` lives outside the parse block so a request rejected after the
/// file field arrived still gets its spool file cleaned up.
async fn read_push_request(mut multipart: Multipart) -> ApiResult<PushRequest> {
    let mut spooled: Option<(PathBuf, u64)> = None;

    let result = async {
        let mut template_id: Option<Uuid> = None;
        let mut version: Option<i64> = None;

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "template_id" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(format!("read template_id: {e}")))?;
                    let id = Uuid::parse_str(text.trim())
                        .map_err(|_| ApiError::Validation(format!("invalid template_id: {text}")))?;
                    template_id = Some(id);
                }
                "version" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(format!("read version: {e}")))?;
                    let v: i64 = text
                        .trim()
                        .parse()
                        .map_err(|_| ApiError::Validation(format!("invalid version: {text}")))?;
                    version = Some(v);
                }
                "file" => {
                    let path =
                        std::env::temp_dir().join(format!(".templar-push.{}", Uuid::new_v4()));
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .map_err(|e| ApiError::Internal(format!("create spool file: {e}")))?;
                    let mut size: u64 = 0;
                    // Keep the path from the first chunk on so an error
                    // mid-stream still gets cleaned up.
                    spooled = Some((path, 0));
                    while let Some(chunk) = field
                        .chunk()
                        .await
                        .map_err(|e| ApiError::Validation(format!("read file field: {e}")))?
                    {
                        size += chunk.len() as u64;
                        file.write_all(&chunk)
                            .await
                            .map_err(|e| ApiError::Internal(format!("write spool file: {e}")))?;
                    }
                    file.flush()
                        .await
                        .map_err(|e| ApiError::Internal(format!("flush spool file: {e}")))?;
                    if let Some(entry) = spooled.as_mut() {
                        entry.1 = size;
                    }
                }
                other => {
                    debug!(field = %other, "ignoring unknown multipart field");
                }
            }
        }

        let template_id =
            template_id.ok_or_else(|| ApiError::Validation("template_id is required".into()))?;
        let version = version.ok_or_else(|| ApiError::Validation("version is required".into()))?;
        if version < 1 {
            return Err(ApiError::Validation(format!(
                "version must be at least 1, got {version}"
            )));
        }
        let (spool_path, file_size) = spooled
            .take()
            .ok_or_else(|| ApiError::Validation("file is required".into()))?;

        Ok(PushRequest {
            template_id,
            version,
            spool_path,
            file_size,
        })
    }
    .await;

    if result.is_err() {
        if let Some((path, _)) = &spooled {
            remove_spool(path).await;
        }
    }
    result
}

/// Template/duplicate checks run after the job row exists.
async fn prepare_push(state: &AppState, request: &PushRequest) -> ApiResult<()> {
    // Create the parent template implicitly on first push.
    if state.metadata.get_template(request.template_id).await?.is_none() {
        let now = OffsetDateTime::now_utc();
        let row = TemplateRow {
            id: request.template_id,
            name: request.template_id.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        match state.metadata.create_template(&row).await {
            Ok(()) => {}
            // A concurrent push of the same new template can win the insert.
            Err(templar_metadata::MetadataError::Constraint(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if state
        .metadata
        .get_version(request.template_id, request.version)
        .await?
        .is_some()
    {
        return Err(ApiError::VersionAlreadyExists {
            template_id: request.template_id,
            version: request.version,
        });
    }

    Ok(())
}

/// The background upload task: hash + progress + tiered upload, then the
/// version row, then the terminal job update.
async fn run_push_job(
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn ObjectStore>,
    job_id: i64,
    template_id: Uuid,
    version: i64,
    spool_path: PathBuf,
    file_size: u64,
) {
    let key = object_key(template_id, version);
    debug!(job_id, key = %key, "pushing template");

    let result = execute_upload(
        metadata.clone(),
        store,
        job_id,
        template_id,
        version,
        &spool_path,
        file_size,
        &key,
    )
    .await;

    remove_spool(&spool_path).await;

    let update = match result {
        Ok(()) => JobUpdate::status(job_status::COMPLETED)
            .with_progress(100)
            .with_completed_at(OffsetDateTime::now_utc()),
        Err(e) => JobUpdate::status(job_status::ERROR)
            .with_error(e.to_string())
            .with_completed_at(OffsetDateTime::now_utc()),
    };
    if let Err(e) = metadata.update_job(job_id, &update).await {
        warn!(job_id, error = %e, "failed to write terminal job state");
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute_upload(
    metadata: Arc<dyn MetadataStore>,
    store: Arc<dyn ObjectStore>,
    job_id: i64,
    template_id: Uuid,
    version: i64,
    spool_path: &Path,
    file_size: u64,
    key: &str,
) -> ApiResult<()> {
    let file = tokio::fs::File::open(spool_path)
        .await
        .map_err(|e| ApiError::Internal(format!("open spooled file: {e}")))?;

    // Hash and count in one pass over the stream.
    let (hash_reader, digest) = HashingReader::new(file);
    let (progress_reader, counter) = ProgressReader::new(hash_reader, file_size);
    let reader: ObjectReader = Box::pin(progress_reader);

    // Mark the job as uploading right away, then report progress once per
    // second until the stream has been fully consumed.
    let update = JobUpdate::status(job_status::UPLOADING).with_progress(counter.percent());
    metadata.update_job(job_id, &update).await?;

    let reporter = {
        let metadata = metadata.clone();
        let counter = counter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let percent = counter.percent();
                let update = JobUpdate::status(job_status::UPLOADING).with_progress(percent);
                if let Err(e) = metadata.update_job(job_id, &update).await {
                    warn!(job_id, error = %e, "failed to report progress");
                }
                if counter.fraction() >= 1.0 {
                    return;
                }
            }
        })
    };

    let upload_result = store.upload(key, reader).await;

    // Stop the reporter before any terminal write so job status never moves
    // backwards from a terminal state.
    reporter.abort();
    let _ = reporter.await;

    let uploaded = upload_result.map_err(ApiError::Storage)?;

    let row = TemplateVersionRow {
        id: Uuid::new_v4(),
        template_id,
        version_number: version,
        object_key: key.to_string(),
        file_size: Some(uploaded as i64),
        file_hash: Some(digest.finalize().to_hex()),
        created_at: OffsetDateTime::now_utc(),
    };
    metadata.create_version(&row).await?;

    Ok(())
}

async fn remove_spool(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove spool file");
        }
    }
}
