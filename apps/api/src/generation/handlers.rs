//! Axum route handlers for the Résumé API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::pipeline::{load_active_template, load_owned_job};
use crate::models::resume::{NewResume, ResumeRow, ResumeStatus};
use crate::queue::status::JobStatus;
use crate::queue::GenerationPayload;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: Uuid,
    pub job_description_id: Uuid,
    pub template_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub status: ResumeStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes/generate
///
/// Validates ownership and template, creates a pending résumé, and enqueues
/// its generation. Returns immediately with the job handle to poll.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let resume = NewResume {
        user_id: request.user_id,
        job_description_id: request.job_description_id,
        template_id: request.template_id,
    };
    let response = start_generation(&state, resume).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// POST /api/v1/resumes/:id/regenerate?user_id=
///
/// Starts a fresh résumé from an existing one's inputs. The original record
/// is left untouched; failed jobs are never resumed.
pub async fn handle_regenerate(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let original = load_owned_resume(&state, resume_id, owner.user_id).await?;
    info!("Regenerating resume {resume_id} for user {}", owner.user_id);

    let response = start_generation(&state, NewResume::from(&original)).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/v1/resumes/jobs/:job_id
pub async fn handle_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatus>, AppError> {
    let status = state
        .queue
        .get_status(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
    Ok(Json(status))
}

/// GET /api/v1/resumes/:id?user_id=
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = load_owned_resume(&state, resume_id, owner.user_id).await?;
    Ok(Json(resume))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn start_generation(
    state: &AppState,
    resume: NewResume,
) -> Result<GenerateResponse, AppError> {
    // Rejected here so a bad request never becomes a queued job.
    load_owned_job(&state.repos, resume.job_description_id, resume.user_id).await?;
    load_active_template(&state.repos, resume.template_id).await?;

    let row = state.repos.resumes.create_pending(resume).await?;
    let payload = GenerationPayload {
        resume_id: row.id,
        user_id: row.user_id,
        job_description_id: row.job_description_id,
        template_id: row.template_id,
    };

    let job_id = match state.queue.enqueue(payload).await {
        Ok(job_id) => job_id,
        Err(e) => {
            error!("Failed to enqueue resume {}: {e}", row.id);
            state.repos.resumes.mark_failed(row.id, &e.user_message()).await?;
            return Err(e);
        }
    };

    info!("Resume {} queued as job {job_id}", row.id);
    Ok(GenerateResponse {
        resume_id: row.id,
        job_id,
        status: ResumeStatus::Pending,
    })
}

async fn load_owned_resume(
    state: &AppState,
    resume_id: Uuid,
    user_id: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume = state
        .repos
        .resumes
        .get(resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    if resume.user_id != user_id {
        return Err(AppError::Forbidden(format!("Resume {resume_id} belongs to another user")));
    }
    Ok(resume)
}
