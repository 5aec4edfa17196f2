//! Content Selector: picks the most relevant career facts for one (user, job) pair.
//!
//! Scores with `generation::scoring`, consolidates experiences, then applies
//! per-section limits. Education is never truncated. No LLM calls.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::generation::consolidator::consolidate_experiences;
use crate::generation::scoring::{
    build_keyword_set, rank, score_experience, score_project, score_skill, ScoredFact,
};
use crate::models::job::JobAnalysis;
use crate::models::profile::{Education, Project, Skill, UserProfile, WorkExperience};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Header block. Absent optional fields are empty strings, never null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl From<&UserProfile> for PersonalInfo {
    fn from(profile: &UserProfile) -> Self {
        let or_empty = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_string();
        Self {
            first_name: profile.first_name.trim().to_string(),
            last_name: profile.last_name.trim().to_string(),
            email: profile.email.trim().to_string(),
            phone: or_empty(&profile.phone),
            location: or_empty(&profile.location),
            linkedin: or_empty(&profile.linkedin_url),
            github: or_empty(&profile.github_url),
            website: or_empty(&profile.website_url),
        }
    }
}

/// The chosen subset of a user's career facts for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedContent {
    pub personal_info: PersonalInfo,
    pub experiences: Vec<ScoredFact<WorkExperience>>,
    pub education: Vec<Education>,
    pub skills: Vec<ScoredFact<Skill>>,
    pub projects: Vec<ScoredFact<Project>>,
}

/// Read snapshot of everything stored for a user.
#[derive(Debug, Clone)]
pub struct CareerSnapshot {
    pub profile: UserProfile,
    pub experiences: Vec<WorkExperience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub projects: Vec<Project>,
}

// ────────────────────────────────────────────────────────────────────────────
// Selection algorithm
// ────────────────────────────────────────────────────────────────────────────

/// Section-level limits for entry selection.
pub const EXPERIENCE_LIMIT: usize = 5;
pub const SKILL_LIMIT: usize = 20;
pub const PROJECT_LIMIT: usize = 3;

/// Selects, ranks, and filters career facts for résumé generation.
///
/// Algorithm:
/// 1. Build the keyword set from the job analysis
/// 2. Score experiences, consolidate per employer, rank, keep top 5
/// 3. Score skills, rank, keep top 20
/// 4. Score projects, rank, keep top 3
/// 5. Keep all education in stored order
pub fn select_content(
    snapshot: CareerSnapshot,
    analysis: &JobAnalysis,
    today: NaiveDate,
) -> SelectedContent {
    let keywords = build_keyword_set(analysis);

    let scored_experiences: Vec<_> = snapshot
        .experiences
        .into_iter()
        .map(|exp| {
            let score = score_experience(&exp, &keywords, today);
            ScoredFact::new(exp, score)
        })
        .collect();
    let mut experiences = consolidate_experiences(scored_experiences, today);
    rank(&mut experiences);
    experiences.truncate(EXPERIENCE_LIMIT);

    let mut skills: Vec<_> = snapshot
        .skills
        .into_iter()
        .map(|skill| {
            let score = score_skill(&skill, &keywords);
            ScoredFact::new(skill, score)
        })
        .collect();
    rank(&mut skills);
    skills.truncate(SKILL_LIMIT);

    let mut projects: Vec<_> = snapshot
        .projects
        .into_iter()
        .map(|project| {
            let score = score_project(&project, &keywords, today);
            ScoredFact::new(project, score)
        })
        .collect();
    rank(&mut projects);
    projects.truncate(PROJECT_LIMIT);

    debug!(
        "Selected {} experiences, {} skills, {} projects from {} keywords",
        experiences.len(),
        skills.len(),
        projects.len(),
        keywords.len()
    );

    SelectedContent {
        personal_info: PersonalInfo::from(&snapshot.profile),
        experiences,
        education: snapshot.education,
        skills,
        projects,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
