use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{JobAnalysis, JobDescription, JobDescriptionRow};
use crate::models::profile::{Education, Project, Skill, UserProfile, WorkExperience};
use crate::models::resume::{GenerationResult, NewResume, ResumeRow, ResumeStatus};
use crate::models::template::TemplateRow;
use crate::repository::{JobRepository, ProfileRepository, ResumeRepository, TemplateRepository};

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize {what}: {e}")))
}

#[async_trait]
impl ProfileRepository for PgRepository {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, first_name, last_name, email, phone, location,
                   linkedin_url, github_url, website_url
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_experiences(&self, user_id: Uuid) -> Result<Vec<WorkExperience>, AppError> {
        let rows = sqlx::query_as::<_, WorkExperience>(
            r#"
            SELECT id, user_id, company, position, location, start_date, end_date,
                   description, achievements, technologies, display_order
            FROM work_experiences
            WHERE user_id = $1
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_education(&self, user_id: Uuid) -> Result<Vec<Education>, AppError> {
        let rows = sqlx::query_as::<_, Education>(
            r#"
            SELECT id, user_id, institution, degree, field_of_study, start_date, end_date,
                   gpa, achievements, display_order
            FROM education
            WHERE user_id = $1
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_skills(&self, user_id: Uuid) -> Result<Vec<Skill>, AppError> {
        let rows = sqlx::query_as::<_, Skill>(
            r#"
            SELECT id, user_id, name, category, proficiency, years_of_experience, display_order
            FROM skills
            WHERE user_id = $1
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, AppError> {
        let rows = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, user_id, title, description, technologies, highlights, url,
                   start_date, end_date, display_order
            FROM projects
            WHERE user_id = $1
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl JobRepository for PgRepository {
    async fn get_job_description(&self, job_id: Uuid) -> Result<Option<JobDescription>, AppError> {
        let row = sqlx::query_as::<_, JobDescriptionRow>(
            r#"
            SELECT id, user_id, company, position, raw_text, analyzed_data
            FROM job_descriptions
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobDescription::try_from)
            .transpose()
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Stored job analysis is malformed: {e}"))
            })
    }

    async fn save_analysis(&self, job_id: Uuid, analysis: &JobAnalysis) -> Result<(), AppError> {
        let value = to_json(analysis, "JobAnalysis")?;
        sqlx::query(
            r#"
            UPDATE job_descriptions
            SET analyzed_data = $2, updated_at = NOW()
            WHERE id = $1 AND analyzed_data IS NULL
            "#,
        )
        .bind(job_id)
        .bind(&value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TemplateRepository for PgRepository {
    async fn get_template(&self, template_id: Uuid) -> Result<Option<TemplateRow>, AppError> {
        let template = sqlx::query_as::<_, TemplateRow>(
            "SELECT id, name, source_markup, is_active FROM templates WHERE id = $1",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(template)
    }
}

const RESUME_COLUMNS: &str = "id, user_id, job_description_id, template_id, status, file_name, \
     file_path, ats_score, generated_content, failure_reason, created_at, updated_at";

#[async_trait]
impl ResumeRepository for PgRepository {
    async fn create_pending(&self, resume: NewResume) -> Result<ResumeRow, AppError> {
        let row = sqlx::query_as::<_, ResumeRow>(&format!(
            r#"
            INSERT INTO resumes (id, user_id, job_description_id, template_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RESUME_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(resume.user_id)
        .bind(resume.job_description_id)
        .bind(resume.template_id)
        .bind(ResumeStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn mark_processing(&self, resume_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE resumes SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(resume_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_result(
        &self,
        resume_id: Uuid,
        result: &GenerationResult,
    ) -> Result<(), AppError> {
        let ats_score = to_json(&result.ats_score, "AtsScore")?;
        let content = to_json(&result.generated_content, "OptimizedContent")?;

        let updated = sqlx::query(
            r#"
            UPDATE resumes
            SET status = $2, file_name = $3, file_path = $4, ats_score = $5,
                generated_content = $6, failure_reason = NULL, updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(resume_id)
        .bind(result.status.as_str())
        .bind(&result.file_name)
        .bind(&result.file_path)
        .bind(&ats_score)
        .bind(&content)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Active resume {resume_id}")));
        }
        Ok(())
    }

    async fn mark_failed(&self, resume_id: Uuid, reason: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE resumes
            SET status = 'failed', failure_reason = $2, file_name = NULL, file_path = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed')
            "#,
        )
        .bind(resume_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, resume_id: Uuid) -> Result<Option<ResumeRow>, AppError> {
        let row = sqlx::query_as::<_, ResumeRow>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1"
        ))
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
