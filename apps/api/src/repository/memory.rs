//! In-memory repositories for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{JobAnalysis, JobDescription};
use crate::models::profile::{Education, Project, Skill, UserProfile, WorkExperience};
use crate::models::resume::{GenerationResult, NewResume, ResumeRow, ResumeStatus};
use crate::models::template::TemplateRow;
use crate::repository::{JobRepository, ProfileRepository, ResumeRepository, TemplateRepository};

#[derive(Default)]
pub struct MemoryRepository {
    pub users: Mutex<HashMap<Uuid, UserProfile>>,
    pub experiences: Mutex<Vec<WorkExperience>>,
    pub education: Mutex<Vec<Education>>,
    pub skills: Mutex<Vec<Skill>>,
    pub projects: Mutex<Vec<Project>>,
    pub jobs: Mutex<HashMap<Uuid, JobDescription>>,
    pub templates: Mutex<HashMap<Uuid, TemplateRow>>,
    pub resumes: Mutex<HashMap<Uuid, ResumeRow>>,
}

fn owned_by<T: Clone>(
    items: &Mutex<Vec<T>>,
    keep: impl Fn(&T) -> bool,
    order: impl Fn(&T) -> i32,
) -> Vec<T> {
    let mut out: Vec<T> = items.lock().unwrap().iter().filter(|&i| keep(i)).cloned().collect();
    out.sort_by_key(|i| order(i));
    out
}

impl MemoryRepository {
    pub fn resume_status(&self, resume_id: Uuid) -> Option<String> {
        self.resumes.lock().unwrap().get(&resume_id).map(|r| r.status.clone())
    }

    fn update_active(&self, resume_id: Uuid, apply: impl FnOnce(&mut ResumeRow)) -> bool {
        let mut resumes = self.resumes.lock().unwrap();
        match resumes.get_mut(&resume_id) {
            Some(row) if row.status != "completed" && row.status != "failed" => {
                apply(row);
                row.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ProfileRepository for MemoryRepository {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn list_experiences(&self, user_id: Uuid) -> Result<Vec<WorkExperience>, AppError> {
        Ok(owned_by(&self.experiences, |e| e.user_id == user_id, |e| e.display_order))
    }

    async fn list_education(&self, user_id: Uuid) -> Result<Vec<Education>, AppError> {
        Ok(owned_by(&self.education, |e| e.user_id == user_id, |e| e.display_order))
    }

    async fn list_skills(&self, user_id: Uuid) -> Result<Vec<Skill>, AppError> {
        Ok(owned_by(&self.skills, |s| s.user_id == user_id, |s| s.display_order))
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, AppError> {
        Ok(owned_by(&self.projects, |p| p.user_id == user_id, |p| p.display_order))
    }
}

#[async_trait]
impl JobRepository for MemoryRepository {
    async fn get_job_description(&self, job_id: Uuid) -> Result<Option<JobDescription>, AppError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn save_analysis(&self, job_id: Uuid, analysis: &JobAnalysis) -> Result<(), AppError> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            if job.analysis.is_none() {
                job.analysis = Some(analysis.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for MemoryRepository {
    async fn get_template(&self, template_id: Uuid) -> Result<Option<TemplateRow>, AppError> {
        Ok(self.templates.lock().unwrap().get(&template_id).cloned())
    }
}

#[async_trait]
impl ResumeRepository for MemoryRepository {
    async fn create_pending(&self, resume: NewResume) -> Result<ResumeRow, AppError> {
        let now = Utc::now();
        let row = ResumeRow {
            id: Uuid::new_v4(),
            user_id: resume.user_id,
            job_description_id: resume.job_description_id,
            template_id: resume.template_id,
            status: ResumeStatus::Pending.as_str().to_string(),
            file_name: None,
            file_path: None,
            ats_score: None,
            generated_content: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.resumes.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn mark_processing(&self, resume_id: Uuid) -> Result<(), AppError> {
        self.update_active(resume_id, |row| {
            row.status = ResumeStatus::Processing.as_str().to_string();
        });
        Ok(())
    }

    async fn save_result(
        &self,
        resume_id: Uuid,
        result: &GenerationResult,
    ) -> Result<(), AppError> {
        let ats_score = serde_json::to_value(&result.ats_score).map_err(anyhow::Error::from)?;
        let content = serde_json::to_value(&result.generated_content).map_err(anyhow::Error::from)?;
        let updated = self.update_active(resume_id, |row| {
            row.status = result.status.as_str().to_string();
            row.file_name = Some(result.file_name.clone());
            row.file_path = Some(result.file_path.clone());
            row.ats_score = Some(ats_score);
            row.generated_content = Some(content);
            row.failure_reason = None;
        });
        if !updated {
            return Err(AppError::NotFound(format!("Active resume {resume_id}")));
        }
        Ok(())
    }

    async fn mark_failed(&self, resume_id: Uuid, reason: &str) -> Result<(), AppError> {
        self.update_active(resume_id, |row| {
            row.status = ResumeStatus::Failed.as_str().to_string();
            row.failure_reason = Some(reason.to_string());
            row.file_name = None;
            row.file_path = None;
        });
        Ok(())
    }

    async fn get(&self, resume_id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        Ok(self.resumes.lock().unwrap().get(&resume_id).cloned())
    }
}
