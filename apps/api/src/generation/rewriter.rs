//! AI Rewriter: professional summary and bullet rewriting with strict fallbacks.
//!
//! Every failure is absorbed here: the summary falls back to a deterministic
//! template and bullets fall back to the original text. Generation never fails
//! because of this stage.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::generation::content_selector::{PersonalInfo, SelectedContent};
use crate::generation::prompts::{
    BULLETS_PROMPT_TEMPLATE, BULLETS_SYSTEM, SUMMARY_PROMPT_TEMPLATE, SUMMARY_SYSTEM,
};
use crate::generation::scoring::ScoredFact;
use crate::llm_client::prompts::NO_FABRICATION_INSTRUCTION;
use crate::llm_client::{CompletionOptions, TextGenerator};
use crate::models::profile::{Education, Project, Skill, WorkExperience};

const SUMMARY_ROLE_COUNT: usize = 3;
const SUMMARY_SKILL_COUNT: usize = 10;
const FALLBACK_SKILL_COUNT: usize = 5;

const SUMMARY_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.7,
    max_tokens: 300,
};
const BULLET_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.5,
    max_tokens: 1000,
};

/// Selected content after rewriting. This is what gets persisted, scored, and rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizedContent {
    pub personal_info: PersonalInfo,
    pub summary: String,
    pub experiences: Vec<ScoredFact<WorkExperience>>,
    pub education: Vec<Education>,
    pub skills: Vec<ScoredFact<Skill>>,
    pub projects: Vec<ScoredFact<Project>>,
}

/// Target job context shared by every rewrite call.
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    pub company: &'a str,
    pub position: &'a str,
    pub skills: &'a [String],
    pub keywords: &'a [String],
}

#[derive(Clone)]
pub struct ContentRewriter {
    llm: Arc<dyn TextGenerator>,
}

impl ContentRewriter {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Rewrites summary, experience achievements, and project highlights concurrently.
    pub async fn optimize(
        &self,
        selected: SelectedContent,
        job: JobContext<'_>,
    ) -> OptimizedContent {
        let summary = self.generate_summary(&selected, job);

        let experience_bullets = join_all(selected.experiences.iter().map(|exp| {
            let context = format!("{} at {}", exp.fact.position, exp.fact.company);
            async move {
                self.optimize_bullets(&exp.fact.achievements, &context, job)
                    .await
            }
        }));

        let project_bullets = join_all(selected.projects.iter().map(|project| {
            let context = format!("project \"{}\"", project.fact.title);
            async move {
                self.optimize_bullets(&project.fact.highlights, &context, job)
                    .await
            }
        }));

        let (summary, experience_bullets, project_bullets) =
            tokio::join!(summary, experience_bullets, project_bullets);

        let SelectedContent {
            personal_info,
            mut experiences,
            education,
            skills,
            mut projects,
        } = selected;

        for (exp, bullets) in experiences.iter_mut().zip(experience_bullets) {
            exp.fact.achievements = bullets;
        }
        for (project, bullets) in projects.iter_mut().zip(project_bullets) {
            project.fact.highlights = bullets;
        }

        OptimizedContent {
            personal_info,
            summary,
            experiences,
            education,
            skills,
            projects,
        }
    }

    /// Generates a 2–3 sentence summary. Falls back to a deterministic template on
    /// any call failure or empty output.
    pub async fn generate_summary(
        &self,
        selected: &SelectedContent,
        job: JobContext<'_>,
    ) -> String {
        let prompt = build_summary_prompt(selected, job);

        match self.llm.complete(&prompt, Some(SUMMARY_SYSTEM), SUMMARY_OPTIONS).await {
            Ok(text) => match clean_summary(&text) {
                Some(summary) => summary,
                None => {
                    warn!("Summary generation returned unusable output, using fallback");
                    fallback_summary(selected, job.position)
                }
            },
            Err(e) => {
                warn!("Summary generation failed, using fallback: {e}");
                fallback_summary(selected, job.position)
            }
        }
    }

    /// Rewrites bullets one per line. Output length always equals input length:
    /// missing lines are filled from the originals, extra lines are dropped.
    pub async fn optimize_bullets(
        &self,
        bullets: &[String],
        context: &str,
        job: JobContext<'_>,
    ) -> Vec<String> {
        if bullets.is_empty() {
            return Vec::new();
        }

        let prompt = BULLETS_PROMPT_TEMPLATE
            .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
            .replace("{context}", context)
            .replace("{job_skills}", &job.skills.join(", "))
            .replace("{keywords}", &job.keywords.join(", "))
            .replace("{count}", &bullets.len().to_string())
            .replace(
                "{bullets}",
                &bullets
                    .iter()
                    .map(|b| format!("- {b}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            );

        match self.llm.complete(&prompt, Some(BULLETS_SYSTEM), BULLET_OPTIONS).await {
            Ok(text) => {
                let rewritten = parse_bullet_lines(&text);
                if rewritten.len() != bullets.len() {
                    info!(
                        "Bullet rewrite for {context} returned {} lines for {} bullets, aligning",
                        rewritten.len(),
                        bullets.len()
                    );
                }
                align_to_input(rewritten, bullets)
            }
            Err(e) => {
                warn!("Bullet optimization for {context} failed, keeping originals: {e}");
                bullets.to_vec()
            }
        }
    }
}

fn build_summary_prompt(selected: &SelectedContent, job: JobContext<'_>) -> String {
    let roles = recent_roles(selected)
        .take(SUMMARY_ROLE_COUNT)
        .map(|exp| {
            let end = exp
                .end_date
                .map(|d| d.format("%Y").to_string())
                .unwrap_or_else(|| "present".to_string());
            format!(
                "- {} at {} ({}–{})",
                exp.position,
                exp.company,
                exp.start_date.format("%Y"),
                end
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let skills = selected
        .skills
        .iter()
        .take(SUMMARY_SKILL_COUNT)
        .map(|s| s.fact.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    SUMMARY_PROMPT_TEMPLATE
        .replace("{no_fabrication}", NO_FABRICATION_INSTRUCTION)
        .replace("{position}", job.position)
        .replace("{company}", job.company)
        .replace("{roles}", if roles.is_empty() { "(none listed)" } else { roles.as_str() })
        .replace("{skills}", if skills.is_empty() { "(none listed)" } else { skills.as_str() })
        .replace("{job_skills}", &job.skills.join(", "))
        .replace("{keywords}", &job.keywords.join(", "))
}

/// Experiences ordered most recent first, independent of relevance order.
fn recent_roles(selected: &SelectedContent) -> impl Iterator<Item = &WorkExperience> {
    let mut roles: Vec<&WorkExperience> = selected.experiences.iter().map(|e| &e.fact).collect();
    roles.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    roles.into_iter()
}

fn clean_summary(text: &str) -> Option<String> {
    let mut summary = text.trim();
    for heading in ["professional summary:", "summary:"] {
        if summary.len() >= heading.len()
            && summary.is_char_boundary(heading.len())
            && summary[..heading.len()].eq_ignore_ascii_case(heading)
        {
            summary = summary[heading.len()..].trim_start();
        }
    }
    let summary = summary.trim_matches('"').trim();
    if summary.is_empty() {
        None
    } else {
        Some(summary.to_string())
    }
}

/// Deterministic summary built from top skills and the most recent role.
pub fn fallback_summary(selected: &SelectedContent, position: &str) -> String {
    let skills: Vec<&str> = selected
        .skills
        .iter()
        .take(FALLBACK_SKILL_COUNT)
        .map(|s| s.fact.name.as_str())
        .collect();
    let expertise = if skills.is_empty() {
        String::new()
    } else {
        format!(" with expertise in {}", skills.join(", "))
    };

    match recent_roles(selected).next() {
        Some(role) => format!(
            "Experienced professional{expertise}, most recently working as {} at {}. \
             Eager to bring this background to the {position} role.",
            role.position, role.company
        ),
        None => format!(
            "Motivated professional{expertise}. \
             Eager to bring this background to the {position} role."
        ),
    }
}

fn parse_bullet_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_bullet_marker)
        .filter(|line| !line.is_empty())
        .collect()
}

fn strip_bullet_marker(line: &str) -> String {
    let mut s = line
        .trim()
        .trim_start_matches(['-', '*', '•', '·', '–', '—', '>'])
        .trim_start();

    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if after.starts_with(char::is_whitespace) {
                s = after.trim_start();
            }
        }
    }

    s.to_string()
}

/// Index-aligns rewritten lines to the originals.
fn align_to_input(rewritten: Vec<String>, originals: &[String]) -> Vec<String> {
    let mut rewritten = rewritten.into_iter();
    originals
        .iter()
        .map(|original| rewritten.next().unwrap_or_else(|| original.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::content_selector::fixtures::profile;
    use crate::generation::scoring::fixtures::{date, experience, skill};
    use crate::llm_client::testing::{FailingGenerator, ScriptedGenerator};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn job<'a>(skills: &'a [String], keywords: &'a [String]) -> JobContext<'a> {
        JobContext {
            company: "Initech",
            position: "Platform Engineer",
            skills,
            keywords,
        }
    }

    fn selected() -> SelectedContent {
        SelectedContent {
            personal_info: PersonalInfo::from(&profile()),
            experiences: vec![
                ScoredFact::new(
                    experience(
                        "Old Co",
                        "Developer",
                        date(2012, 1, 1),
                        Some(date(2015, 1, 1)),
                        &["Wrote code"],
                    ),
                    3,
                ),
                ScoredFact::new(
                    experience(
                        "Acme",
                        "Senior Engineer",
                        date(2018, 1, 1),
                        None,
                        &["Built Rust services", "Led migration"],
                    ),
                    9,
                ),
            ],
            education: vec![],
            skills: vec![
                ScoredFact::new(skill("Rust", None, 0), 10),
                ScoredFact::new(skill("Kubernetes", None, 1), 5),
            ],
            projects: vec![],
        }
    }

    #[tokio::test]
    async fn test_empty_bullets_skip_the_model() {
        let llm = Arc::new(ScriptedGenerator::new(vec![]));
        let rewriter = ContentRewriter::new(llm.clone());
        let out = rewriter.optimize_bullets(&[], "ctx", job(&[], &[])).await;
        assert!(out.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_short_response_padded_with_originals() {
        let llm = Arc::new(ScriptedGenerator::new(vec![Ok("- Rewritten one")]));
        let rewriter = ContentRewriter::new(llm);
        let input = strings(&["one", "two", "three"]);
        let out = rewriter.optimize_bullets(&input, "ctx", job(&[], &[])).await;
        assert_eq!(out, strings(&["Rewritten one", "two", "three"]));
    }

    #[tokio::test]
    async fn test_long_response_truncated() {
        let llm = Arc::new(ScriptedGenerator::new(vec![Ok("1. A\n2. B\n3. C\n\n4. D")]));
        let rewriter = ContentRewriter::new(llm);
        let input = strings(&["one", "two"]);
        let out = rewriter.optimize_bullets(&input, "ctx", job(&[], &[])).await;
        assert_eq!(out, strings(&["A", "B"]));
    }

    #[tokio::test]
    async fn test_failed_call_returns_originals_verbatim() {
        let rewriter = ContentRewriter::new(Arc::new(FailingGenerator));
        let input = strings(&["  keep me  ", "and me"]);
        let out = rewriter.optimize_bullets(&input, "ctx", job(&[], &[])).await;
        assert_eq!(out, input);
    }

    #[tokio::test]
    async fn test_bullet_count_invariant_for_any_response() {
        let input = strings(&["a", "b", "c", "d"]);
        for response in [Ok(""), Ok("x"), Ok("x\ny\nz\nw\nv\nu"), Err("boom")] {
            let rewriter = ContentRewriter::new(Arc::new(ScriptedGenerator::new(vec![response])));
            let out = rewriter.optimize_bullets(&input, "ctx", job(&[], &[])).await;
            assert_eq!(out.len(), input.len());
        }
    }

    #[test]
    fn test_strip_bullet_marker_variants() {
        assert_eq!(strip_bullet_marker("- Built X"), "Built X");
        assert_eq!(strip_bullet_marker("• Built X"), "Built X");
        assert_eq!(strip_bullet_marker("  * Built X"), "Built X");
        assert_eq!(strip_bullet_marker("3) Built X"), "Built X");
        assert_eq!(strip_bullet_marker("12. Built X"), "Built X");
        assert_eq!(strip_bullet_marker("40% faster builds"), "40% faster builds");
        assert_eq!(strip_bullet_marker("2.5x throughput"), "2.5x throughput");
    }

    #[tokio::test]
    async fn test_summary_uses_model_output() {
        let llm = Arc::new(ScriptedGenerator::new(vec![Ok(
            "\"Senior engineer with a decade of Rust experience.\"",
        )]));
        let rewriter = ContentRewriter::new(llm.clone());
        let summary = rewriter.generate_summary(&selected(), job(&[], &[])).await;
        assert_eq!(summary, "Senior engineer with a decade of Rust experience.");

        let prompt = llm.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Senior Engineer at Acme"));
        assert!(prompt.contains("Rust, Kubernetes"));
        assert!(prompt.contains("Do NOT invent information"));
    }

    #[tokio::test]
    async fn test_summary_falls_back_on_failure() {
        let rewriter = ContentRewriter::new(Arc::new(FailingGenerator));
        let summary = rewriter.generate_summary(&selected(), job(&[], &[])).await;
        assert_eq!(summary, fallback_summary(&selected(), "Platform Engineer"));
        assert!(summary.contains("Rust, Kubernetes"));
        assert!(summary.contains("Senior Engineer at Acme"));
    }

    #[tokio::test]
    async fn test_summary_falls_back_on_blank_output() {
        let rewriter = ContentRewriter::new(Arc::new(ScriptedGenerator::new(vec![Ok("  \n ")])));
        let summary = rewriter.generate_summary(&selected(), job(&[], &[])).await;
        assert!(summary.starts_with("Experienced professional"));
    }

    #[test]
    fn test_fallback_without_experience_or_skills() {
        let mut content = selected();
        content.experiences.clear();
        content.skills.clear();
        assert_eq!(
            fallback_summary(&content, "Analyst"),
            "Motivated professional. Eager to bring this background to the Analyst role."
        );
    }

    #[tokio::test]
    async fn test_optimize_survives_total_model_outage() {
        let rewriter = ContentRewriter::new(Arc::new(FailingGenerator));
        let input = selected();
        let optimized = rewriter.optimize(input.clone(), job(&[], &[])).await;
        assert!(!optimized.summary.is_empty());
        assert_eq!(optimized.experiences.len(), input.experiences.len());
        for (before, after) in input.experiences.iter().zip(&optimized.experiences) {
            assert_eq!(before.fact.achievements, after.fact.achievements);
        }
    }
}
