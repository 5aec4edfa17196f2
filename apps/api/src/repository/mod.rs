//! Persistence boundaries consumed by the generation pipeline.
//!
//! `PgRepository` implements every trait against PostgreSQL. Tests use
//! `memory::MemoryRepository`.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{JobAnalysis, JobDescription};
use crate::models::profile::{Education, Project, Skill, UserProfile, WorkExperience};
use crate::models::resume::{GenerationResult, NewResume, ResumeRow};
use crate::models::template::TemplateRow;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgRepository;

/// Career facts. Every list is ordered by `display_order` ascending.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;
    async fn list_experiences(&self, user_id: Uuid) -> Result<Vec<WorkExperience>, AppError>;
    async fn list_education(&self, user_id: Uuid) -> Result<Vec<Education>, AppError>;
    async fn list_skills(&self, user_id: Uuid) -> Result<Vec<Skill>, AppError>;
    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, AppError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get_job_description(&self, job_id: Uuid) -> Result<Option<JobDescription>, AppError>;
    /// Stores an analysis produced on demand. Existing analyses are never replaced.
    async fn save_analysis(&self, job_id: Uuid, analysis: &JobAnalysis) -> Result<(), AppError>;
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn get_template(&self, template_id: Uuid) -> Result<Option<TemplateRow>, AppError>;
}

/// Résumé records. Status moves pending → processing → completed | failed and
/// never leaves a terminal state.
#[async_trait]
pub trait ResumeRepository: Send + Sync {
    async fn create_pending(&self, resume: NewResume) -> Result<ResumeRow, AppError>;
    async fn mark_processing(&self, resume_id: Uuid) -> Result<(), AppError>;
    async fn save_result(&self, resume_id: Uuid, result: &GenerationResult) -> Result<(), AppError>;
    async fn mark_failed(&self, resume_id: Uuid, reason: &str) -> Result<(), AppError>;
    async fn get(&self, resume_id: Uuid) -> Result<Option<ResumeRow>, AppError>;
}

/// All repositories behind trait objects, shared by handlers and workers.
#[derive(Clone)]
pub struct Repositories {
    pub profiles: Arc<dyn ProfileRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub resumes: Arc<dyn ResumeRepository>,
}

impl Repositories {
    /// Uses one backend for every repository.
    pub fn from_backend<R>(backend: Arc<R>) -> Self
    where
        R: ProfileRepository + JobRepository + TemplateRepository + ResumeRepository + 'static,
    {
        Self {
            profiles: backend.clone(),
            jobs: backend.clone(),
            templates: backend.clone(),
            resumes: backend,
        }
    }
}
