//! Résumé generation pipeline: one queue job, start to finish.
//!
//! Flow: fetch profile + job → (analyze job) → select_content → rewrite →
//!       score ATS → fetch template → render → compile → persist result.
//!
//! The pipeline never retries internally. A failed attempt surfaces its error
//! to the queue, which decides whether to run the whole pipeline again.
//! Nothing is written to the résumé record until the final persist, so every
//! attempt can safely start from scratch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::compiler::DocumentCompiler;
use crate::errors::AppError;
use crate::generation::ats::score_ats;
use crate::generation::content_selector::{select_content, CareerSnapshot};
use crate::generation::jd_parser::analyze_job_description;
use crate::generation::rewriter::{ContentRewriter, JobContext};
use crate::llm_client::TextGenerator;
use crate::models::job::JobDescription;
use crate::models::resume::{GenerationResult, ResumeStatus};
use crate::models::template::TemplateRow;
use crate::queue::{GenerationPayload, JobHandler, ProgressSink};
use crate::render::{render_template, TemplateContext};
use crate::repository::Repositories;

/// Progress checkpoints reported to pollers. Advisory only.
mod checkpoint {
    pub const STARTED: u8 = 10;
    pub const FETCHED: u8 = 25;
    pub const SELECTED: u8 = 35;
    pub const OPTIMIZED: u8 = 50;
    pub const SCORED: u8 = 65;
    pub const TEMPLATE: u8 = 70;
    pub const RENDERED: u8 = 75;
    pub const COMPILED: u8 = 90;
    pub const DONE: u8 = 100;
}

#[derive(Clone)]
pub struct GenerationPipeline {
    repos: Repositories,
    llm: Arc<dyn TextGenerator>,
    rewriter: ContentRewriter,
    compiler: DocumentCompiler,
}

impl GenerationPipeline {
    pub fn new(
        repos: Repositories,
        llm: Arc<dyn TextGenerator>,
        compiler: DocumentCompiler,
    ) -> Self {
        Self {
            rewriter: ContentRewriter::new(llm.clone()),
            repos,
            llm,
            compiler,
        }
    }

    /// Runs every stage for one résumé and persists the completed result.
    pub async fn generate(
        &self,
        payload: &GenerationPayload,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationResult, AppError> {
        let resume_id = payload.resume_id;
        let today = Utc::now().date_naive();

        self.repos.resumes.mark_processing(resume_id).await?;
        progress.report(checkpoint::STARTED).await;

        // Step 1: Profile snapshot and job description
        let job = load_owned_job(&self.repos, payload.job_description_id, payload.user_id).await?;
        let snapshot = self.load_snapshot(payload.user_id).await?;
        let analysis = match job.analysis.clone() {
            Some(analysis) => analysis,
            None => {
                info!("Job {} has no analysis yet; analyzing", job.id);
                let analysis = analyze_job_description(&job, self.llm.as_ref()).await?;
                self.repos.jobs.save_analysis(job.id, &analysis).await?;
                analysis
            }
        };
        progress.report(checkpoint::FETCHED).await;

        // Step 2: Content selection
        let selected = select_content(snapshot, &analysis, today);
        info!(
            "Resume {resume_id}: selected {} experiences, {} skills, {} projects, {} education",
            selected.experiences.len(),
            selected.skills.len(),
            selected.projects.len(),
            selected.education.len()
        );
        progress.report(checkpoint::SELECTED).await;

        // Step 3: Rewrite (never fails; falls back to original text)
        let job_context = JobContext {
            company: &job.company,
            position: &job.position,
            skills: &analysis.skills,
            keywords: &analysis.keywords,
        };
        let optimized = self.rewriter.optimize(selected, job_context).await;
        progress.report(checkpoint::OPTIMIZED).await;

        // Step 4: ATS score over the final content
        let ats_score = score_ats(&optimized, &analysis, today);
        info!("Resume {resume_id}: ATS score {}/100", ats_score.overall);
        progress.report(checkpoint::SCORED).await;

        // Step 5: Template
        let template = load_active_template(&self.repos, payload.template_id).await?;
        progress.report(checkpoint::TEMPLATE).await;

        let context = TemplateContext::from_optimized(&optimized);
        let source = render_template(&template.source_markup, &context);
        progress.report(checkpoint::RENDERED).await;

        // Step 6: Compile and store the artifact
        let artifact = self.compiler.compile(&source, resume_id).await?;
        progress.report(checkpoint::COMPILED).await;

        // Step 7: Persist
        let result = GenerationResult {
            file_name: artifact.file_name,
            file_path: artifact.file_path,
            ats_score,
            generated_content: optimized,
            status: ResumeStatus::Completed,
        };
        self.repos.resumes.save_result(resume_id, &result).await?;
        progress.report(checkpoint::DONE).await;

        info!("Resume {resume_id} generated: {}", result.file_path);
        Ok(result)
    }

    async fn load_snapshot(&self, user_id: Uuid) -> Result<CareerSnapshot, AppError> {
        let profiles = &self.repos.profiles;
        let profile = profiles
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        let (experiences, education, skills, projects) = tokio::try_join!(
            profiles.list_experiences(user_id),
            profiles.list_education(user_id),
            profiles.list_skills(user_id),
            profiles.list_projects(user_id),
        )?;

        Ok(CareerSnapshot {
            profile,
            experiences,
            education,
            skills,
            projects,
        })
    }
}

/// Fetches a job description, rejecting one owned by another user.
pub async fn load_owned_job(
    repos: &Repositories,
    job_description_id: Uuid,
    user_id: Uuid,
) -> Result<JobDescription, AppError> {
    let job = repos
        .jobs
        .get_job_description(job_description_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job description {job_description_id}")))?;

    if job.user_id != user_id {
        return Err(AppError::Forbidden(format!(
            "Job description {job_description_id} belongs to another user"
        )));
    }
    Ok(job)
}

/// Fetches a template, rejecting inactive ones.
pub async fn load_active_template(
    repos: &Repositories,
    template_id: Uuid,
) -> Result<TemplateRow, AppError> {
    let template = repos
        .templates
        .get_template(template_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {template_id}")))?;

    if !template.is_active {
        return Err(AppError::Validation(format!("Template '{}' is not active", template.name)));
    }
    Ok(template)
}

#[async_trait]
impl JobHandler for GenerationPipeline {
    async fn run(
        &self,
        payload: &GenerationPayload,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationResult, AppError> {
        self.generate(payload, progress).await
    }

    async fn fail(&self, payload: &GenerationPayload, reason: &str) {
        if let Err(e) = self.repos.resumes.mark_failed(payload.resume_id, reason).await {
            error!("Failed to mark resume {} as failed: {e}", payload.resume_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::*;
    use crate::compiler::testing::{stub_compiler, WRITES_PDF_EXITS_NONZERO};
    use crate::compiler::CompileError;
    use crate::generation::content_selector::fixtures;
    use crate::llm_client::testing::{FailingGenerator, ScriptedGenerator};
    use crate::models::job::JobAnalysis;
    use crate::models::profile::{Skill, WorkExperience};
    use crate::models::resume::NewResume;
    use crate::repository::memory::MemoryRepository;
    use crate::repository::ResumeRepository;

    const TEMPLATE: &str = "\\documentclass{article}\n\\begin{document}\n\
        {{name}} -- {{email}}\n\n{{summary}}\n\n{{experience}}\n\n{{skills}}\n\
        \\end{document}\n";

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<u8>>);

    #[async_trait]
    impl ProgressSink for RecordingProgress {
        async fn report(&self, progress: u8) {
            self.0.lock().unwrap().push(progress);
        }
    }

    struct Fixture {
        repo: Arc<MemoryRepository>,
        payload: GenerationPayload,
        _work: TempDir,
        artifacts: TempDir,
        compiler: DocumentCompiler,
    }

    fn analysis() -> JobAnalysis {
        JobAnalysis {
            skills: vec!["Rust".to_string(), "PostgreSQL".to_string()],
            keywords: vec!["distributed systems".to_string()],
            ..Default::default()
        }
    }

    async fn fixture(
        script: &str,
        analysis: Option<JobAnalysis>,
        template_active: bool,
    ) -> Fixture {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(MemoryRepository::default());

        let mut profile = fixtures::profile();
        profile.id = user_id;
        repo.users.lock().unwrap().insert(user_id, profile);

        repo.experiences.lock().unwrap().push(WorkExperience {
            id: Uuid::new_v4(),
            user_id,
            company: "Acme & Sons".to_string(),
            position: "Backend Engineer".to_string(),
            location: None,
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: None,
            description: Some("Built distributed systems in Rust".to_string()),
            achievements: vec!["Reduced p99 latency by 40%".to_string()],
            technologies: vec!["Rust".to_string()],
            display_order: 0,
        });
        repo.skills.lock().unwrap().push(Skill {
            id: Uuid::new_v4(),
            user_id,
            name: "Rust".to_string(),
            category: Some("Languages".to_string()),
            proficiency: Some("expert".to_string()),
            years_of_experience: Some(4),
            display_order: 0,
        });

        let job_id = Uuid::new_v4();
        repo.jobs.lock().unwrap().insert(
            job_id,
            JobDescription {
                id: job_id,
                user_id,
                company: "Initech".to_string(),
                position: "Staff Engineer".to_string(),
                raw_text: "We need Rust and PostgreSQL experience.".to_string(),
                analysis,
            },
        );

        let template_id = Uuid::new_v4();
        repo.templates.lock().unwrap().insert(
            template_id,
            TemplateRow {
                id: template_id,
                name: "classic".to_string(),
                source_markup: TEMPLATE.to_string(),
                is_active: template_active,
            },
        );

        let resume = repo
            .create_pending(NewResume {
                user_id,
                job_description_id: job_id,
                template_id,
            })
            .await
            .unwrap();

        let work = TempDir::new().unwrap();
        let artifacts = TempDir::new().unwrap();
        let compiler =
            stub_compiler(script, work.path(), artifacts.path(), Duration::from_secs(10));

        Fixture {
            repo,
            payload: GenerationPayload {
                resume_id: resume.id,
                user_id,
                job_description_id: job_id,
                template_id,
            },
            _work: work,
            artifacts,
            compiler,
        }
    }

    fn pipeline(fx: &Fixture, llm: Arc<dyn TextGenerator>) -> GenerationPipeline {
        let repos = Repositories::from_backend(fx.repo.clone());
        GenerationPipeline::new(repos, llm, fx.compiler.clone())
    }

    #[tokio::test]
    async fn test_generates_and_persists_with_ai_unavailable() {
        let fx = fixture(WRITES_PDF_EXITS_NONZERO, Some(analysis()), true).await;
        let progress = RecordingProgress::default();

        let result = pipeline(&fx, Arc::new(FailingGenerator))
            .generate(&fx.payload, &progress)
            .await
            .unwrap();

        assert_eq!(result.status, ResumeStatus::Completed);
        assert_eq!(result.file_name, format!("resume_{}.pdf", fx.payload.resume_id));
        assert!(fx.artifacts.path().join(&result.file_name).exists());
        // Fallbacks: summary synthesized, bullets unchanged.
        assert!(!result.generated_content.summary.is_empty());
        assert_eq!(
            result.generated_content.experiences[0].fact.achievements,
            vec!["Reduced p99 latency by 40%".to_string()]
        );
        assert_eq!(fx.repo.resume_status(fx.payload.resume_id).as_deref(), Some("completed"));

        let seen = progress.0.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress out of order: {seen:?}");
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_missing_analysis_is_produced_and_saved() {
        let fx = fixture(WRITES_PDF_EXITS_NONZERO, None, true).await;
        let llm = Arc::new(ScriptedGenerator::new(vec![Ok(
            r#"{"analysis": {"skills": ["Rust"], "keywords": ["latency"],
                "experience_level": "senior"}}"#,
        )]));

        pipeline(&fx, llm.clone())
            .generate(&fx.payload, &RecordingProgress::default())
            .await
            .unwrap();

        let jobs = fx.repo.jobs.lock().unwrap();
        let saved = jobs[&fx.payload.job_description_id].analysis.as_ref().unwrap();
        assert_eq!(saved.skills, vec!["Rust".to_string()]);
        assert!(llm.call_count() >= 1);
    }

    #[tokio::test]
    async fn test_job_of_another_user_is_forbidden() {
        let mut fx = fixture(WRITES_PDF_EXITS_NONZERO, Some(analysis()), true).await;
        fx.payload.user_id = Uuid::new_v4();

        let err = pipeline(&fx, Arc::new(FailingGenerator))
            .generate(&fx.payload, &RecordingProgress::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_inactive_template_is_rejected() {
        let fx = fixture(WRITES_PDF_EXITS_NONZERO, Some(analysis()), false).await;

        let err = pipeline(&fx, Arc::new(FailingGenerator))
            .generate(&fx.payload, &RecordingProgress::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_compile_failure_persists_no_artifact() {
        let script = "echo '! Undefined control sequence.'; exit 1";
        let fx = fixture(script, Some(analysis()), true).await;
        let pipeline = pipeline(&fx, Arc::new(FailingGenerator));

        let err = pipeline
            .generate(&fx.payload, &RecordingProgress::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Compile(CompileError::Failed { .. })));

        pipeline.fail(&fx.payload, &err.user_message()).await;
        let row = fx.repo.resumes.lock().unwrap()[&fx.payload.resume_id].clone();
        assert_eq!(row.status, "failed");
        assert!(row.file_path.is_none());
        assert!(row.failure_reason.is_some());
    }

    #[tokio::test]
    async fn test_completed_resume_is_not_failed_afterwards() {
        let fx = fixture(WRITES_PDF_EXITS_NONZERO, Some(analysis()), true).await;
        let pipeline = pipeline(&fx, Arc::new(FailingGenerator));
        pipeline
            .generate(&fx.payload, &RecordingProgress::default())
            .await
            .unwrap();

        pipeline.fail(&fx.payload, "late failure").await;
        assert_eq!(fx.repo.resume_status(fx.payload.resume_id).as_deref(), Some("completed"));
    }
}
