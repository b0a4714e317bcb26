//! Handlers for batch job submission, status and download.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use imgbatch_core::error::CoreError;
use imgbatch_core::image_ref::sanitize_file_name;
use imgbatch_core::job::{Job, JobStatus};
use imgbatch_core::types::{JobId, Timestamp};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the input table.
pub const UPLOAD_FIELD: &str = "file";

/// Response for an accepted upload.
#[derive(Debug, Serialize)]
pub struct UploadAccepted {
    pub message: &'static str,
    pub request_id: JobId,
}

/// Public view of a job.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub request_id: JobId,
    pub status: JobStatus,
    /// Output table location; `null` until the job completed.
    pub processed_file: Option<String>,
    pub submitted_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl From<Job> for JobStatusView {
    fn from(job: Job) -> Self {
        Self {
            request_id: job.id,
            status: job.status,
            processed_file: job.output_path.map(|p| p.display().to_string()),
            submitted_at: job.submitted_at,
            finished_at: job.finished_at,
        }
    }
}

// ── Upload ───────────────────────────────────────────────────────────

/// POST /api/v1/upload
///
/// Stage the uploaded table in the upload directory and hand it to the
/// batch engine. Responds `202` with the job handle before any image is
/// processed.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadAccepted>>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = sanitize_file_name(field.file_name().unwrap_or_default());
        let data = field
            .bytes()
            .await
            .map_err(multipart_error)?;

        let upload_dir = &state.config.upload_dir;
        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(|e| internal(format!("Failed to create upload dir: {e}")))?;

        let staged = upload_dir.join(format!("{}-{original_name}", uuid::Uuid::new_v4()));
        tokio::fs::write(&staged, &data)
            .await
            .map_err(|e| internal(format!("Failed to stage upload: {e}")))?;

        let file = tokio::fs::File::open(&staged)
            .await
            .map_err(|e| internal(format!("Failed to open staged upload: {e}")))?
            .into_std()
            .await;

        let request_id = state.engine.submit(file, &original_name).await?;
        tracing::info!(
            request_id = %request_id,
            original_name = %original_name,
            bytes = data.len(),
            staged = %staged.display(),
            "Upload accepted",
        );

        return Ok((
            StatusCode::ACCEPTED,
            Json(DataResponse {
                data: UploadAccepted {
                    message: "File uploaded successfully. Processing started.",
                    request_id,
                },
            }),
        ));
    }

    Err(AppError::BadRequest(format!(
        "Missing multipart field '{UPLOAD_FIELD}'"
    )))
}

// ── Status ───────────────────────────────────────────────────────────

/// GET /api/v1/status/{request_id}
pub async fn status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<DataResponse<JobStatusView>>> {
    let id = parse_request_id(&request_id)?;
    let job = state.registry.get(id).await?;
    Ok(Json(DataResponse { data: job.into() }))
}

// ── Download ─────────────────────────────────────────────────────────

/// GET /api/v1/download/{request_id}
///
/// Return the output table of a completed job as a CSV attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_request_id(&request_id)?;
    let job = state.registry.get(id).await?;

    let path = match (job.status, job.output_path) {
        (JobStatus::Completed, Some(path)) => path,
        (status, _) => {
            return Err(CoreError::Conflict(format!(
                "Job {id} is {status}; no output table available"
            ))
            .into())
        }
    };

    let body = tokio::fs::read(&path)
        .await
        .map_err(|e| internal(format!("Failed to read {}: {e}", path.display())))?;

    let file_name = path
        .file_name()
        .map(|n| {
            n.to_string_lossy()
                .chars()
                .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
                .collect::<String>()
        })
        .unwrap_or_else(|| format!("processed-{id}.csv"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

/// Map a multipart read failure, keeping "body too large" distinct.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Parse a job handle from a path segment.
///
/// A handle that is not a UUID cannot name a job, so it is reported the same
/// way as an unknown one.
fn parse_request_id(raw: &str) -> AppResult<JobId> {
    raw.parse().map_err(|_| AppError::NotFound(raw.to_string()))
}

fn internal(msg: String) -> AppError {
    CoreError::Internal(msg).into()
}
