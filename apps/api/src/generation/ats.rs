//! ATS Scorer: weighted compatibility score over the final optimized content.
//!
//! Four dimensions, each 0–100:
//! - keyword_match (0.4): job skills ∪ keywords found anywhere in the résumé text
//! - experience_relevance (0.3): total tenure against the job's seniority band
//! - format_parseability (0.2): structural completeness
//! - education_match (0.1): degree level the job asks for vs. degrees held
//!
//! Pure and deterministic. `today` is injected.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::generation::rewriter::OptimizedContent;
use crate::generation::scoring::months_between;
use crate::models::job::{ExperienceLevel, JobAnalysis};

const KEYWORD_WEIGHT: f64 = 0.4;
const EXPERIENCE_WEIGHT: f64 = 0.3;
const FORMAT_WEIGHT: f64 = 0.2;
const EDUCATION_WEIGHT: f64 = 0.1;

const MAX_MISSING_KEYWORDS: usize = 10;
const MIN_SUMMARY_CHARS: usize = 50;

// Matched as whole words. A bare "master" is too common outside degrees
// ("Scrum Master"), so only degree phrasings count.
const PHD_TERMS: &[&str] = &["phd", "ph.d", "doctorate", "doctoral", "doctor of"];
const MASTER_TERMS: &[&str] = &["master's", "masters", "master of", "msc", "m.s.", "mba"];
const BACHELOR_TERMS: &[&str] = &["bachelor", "bachelor's", "bachelors", "bsc", "b.s.", "b.a."];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsBreakdown {
    pub keyword_match: u32,
    pub experience_relevance: u32,
    pub format_parseability: u32,
    pub education_match: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsScore {
    pub overall: u32, // 0 – 100
    pub breakdown: AtsBreakdown,
    pub missing_keywords: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn score_ats(
    content: &OptimizedContent,
    analysis: &JobAnalysis,
    today: NaiveDate,
) -> AtsScore {
    let (keyword_match, missing_keywords) = keyword_match(content, analysis);
    let experience_relevance = experience_relevance(content, analysis.experience_level, today);
    let format_parseability = format_parseability(content);
    let education_match = education_match(content, analysis);

    let weighted = KEYWORD_WEIGHT * keyword_match as f64
        + EXPERIENCE_WEIGHT * experience_relevance as f64
        + FORMAT_WEIGHT * format_parseability as f64
        + EDUCATION_WEIGHT * education_match as f64;
    let overall = (weighted.round() as u32).min(100);

    let breakdown = AtsBreakdown {
        keyword_match,
        experience_relevance,
        format_parseability,
        education_match,
    };
    let suggestions = build_suggestions(&breakdown, &missing_keywords);

    AtsScore {
        overall,
        breakdown,
        missing_keywords,
        suggestions,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Keyword match
// ────────────────────────────────────────────────────────────────────────────

fn resume_text(content: &OptimizedContent) -> String {
    let mut parts: Vec<&str> = vec![content.summary.as_str()];

    for exp in &content.experiences {
        let exp = &exp.fact;
        parts.push(&exp.position);
        parts.push(&exp.company);
        if let Some(description) = &exp.description {
            parts.push(description);
        }
        parts.extend(exp.achievements.iter().map(String::as_str));
        parts.extend(exp.technologies.iter().map(String::as_str));
    }

    parts.extend(content.skills.iter().map(|s| s.fact.name.as_str()));

    for project in &content.projects {
        let project = &project.fact;
        parts.push(&project.title);
        if let Some(description) = &project.description {
            parts.push(description);
        }
        parts.extend(project.technologies.iter().map(String::as_str));
        parts.extend(project.highlights.iter().map(String::as_str));
    }

    parts.join(" ").to_lowercase()
}

/// Returns (percentage found, first unmatched terms). No job terms scores 100.
fn keyword_match(content: &OptimizedContent, analysis: &JobAnalysis) -> (u32, Vec<String>) {
    let mut seen = HashSet::new();
    let terms: Vec<&str> = analysis
        .skills
        .iter()
        .chain(analysis.keywords.iter())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .collect();

    if terms.is_empty() {
        return (100, Vec::new());
    }

    let text = resume_text(content);
    let (found, missing): (Vec<&str>, Vec<&str>) = terms
        .iter()
        .copied()
        .partition(|term| text.contains(&term.to_lowercase()));

    let percentage = (found.len() as f64 / terms.len() as f64 * 100.0).round() as u32;
    let missing = missing
        .into_iter()
        .take(MAX_MISSING_KEYWORDS)
        .map(str::to_string)
        .collect();

    (percentage, missing)
}

// ────────────────────────────────────────────────────────────────────────────
// Experience relevance
// ────────────────────────────────────────────────────────────────────────────

/// (min years, max years, base score) per seniority band.
fn experience_band(level: ExperienceLevel) -> Option<(f64, f64, i32)> {
    match level {
        ExperienceLevel::Entry => Some((0.0, 2.0, 80)),
        ExperienceLevel::Junior => Some((1.0, 3.0, 80)),
        ExperienceLevel::Mid => Some((2.0, 5.0, 85)),
        ExperienceLevel::Senior => Some((5.0, 10.0, 90)),
        ExperienceLevel::Lead => Some((7.0, 15.0, 90)),
        ExperienceLevel::Principal => Some((10.0, 20.0, 95)),
        ExperienceLevel::Other => None,
    }
}

fn experience_relevance(
    content: &OptimizedContent,
    level: ExperienceLevel,
    today: NaiveDate,
) -> u32 {
    let experiences = &content.experiences;

    let total_months: f64 = experiences
        .iter()
        .map(|e| months_between(e.fact.start_date, e.fact.end_date.unwrap_or(today)))
        .sum();
    let years = total_months / 12.0;

    let mut score = match experience_band(level) {
        Some((_, max, base)) if years > max => (base - 5).max(70),
        Some((min, _, base)) if years < min => (base - 20).max(50),
        Some((_, _, base)) => base,
        None if experiences.is_empty() => 50,
        None => 75,
    };

    if experiences.len() >= 3 {
        score = (score + 10).min(100);
    }

    // Ongoing roles count as ended today.
    let most_recent = experiences.iter().max_by_key(|e| e.fact.start_date);
    if let Some(recent) = most_recent {
        let ended = recent.fact.end_date.unwrap_or(today);
        if months_between(ended, today) < 6.0 {
            score = (score + 5).min(100);
        }
    }

    score.clamp(0, 100) as u32
}

// ────────────────────────────────────────────────────────────────────────────
// Format parseability
// ────────────────────────────────────────────────────────────────────────────

fn format_parseability(content: &OptimizedContent) -> u32 {
    let mut score: i32 = 100;

    if content.summary.trim().chars().count() < MIN_SUMMARY_CHARS {
        score -= 10;
    }
    if content.experiences.is_empty() {
        score -= 20;
    }
    if content.skills.is_empty() {
        score -= 15;
    }
    if content.education.is_empty() {
        score -= 10;
    }

    for exp in &content.experiences {
        if exp.fact.achievements.is_empty() {
            score -= 5;
        }
        if exp.fact.company.trim().is_empty() || exp.fact.position.trim().is_empty() {
            score -= 5;
        }
    }

    if !content.projects.is_empty() {
        score = (score + 5).min(100);
    }
    let info = &content.personal_info;
    if !info.email.is_empty() && !info.phone.is_empty() {
        score = (score + 5).min(100);
    }

    score.clamp(0, 100) as u32
}

// ────────────────────────────────────────────────────────────────────────────
// Education match
// ────────────────────────────────────────────────────────────────────────────

fn mentions_any(text: &str, terms: &[&str]) -> bool {
    let is_word = |c: Option<char>| c.is_some_and(char::is_alphanumeric);
    terms.iter().any(|term| {
        text.match_indices(term).any(|(at, _)| {
            !is_word(text[..at].chars().next_back())
                && !is_word(text[at + term.len()..].chars().next())
        })
    })
}

fn degree_text<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    lines
        .map(|line| line.to_lowercase().replace('\u{2019}', "'"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn education_match(content: &OptimizedContent, analysis: &JobAnalysis) -> u32 {
    if content.education.is_empty() {
        return 50;
    }

    let requirements = degree_text(analysis.requirements.iter().map(|r| r.text.as_str()));
    let degrees = degree_text(content.education.iter().map(|e| e.degree.as_str()));

    let asked_and_held =
        |terms: &[&str]| mentions_any(&requirements, terms) && mentions_any(&degrees, terms);

    let mut score = if asked_and_held(PHD_TERMS) {
        100
    } else if asked_and_held(MASTER_TERMS) {
        95
    } else if asked_and_held(BACHELOR_TERMS) {
        90
    } else {
        70
    };

    if content.education.iter().any(|e| e.gpa.is_some_and(|gpa| gpa >= 3.5)) {
        score = (score + 5).min(100);
    }
    if content.education.iter().any(|e| !e.achievements.is_empty()) {
        score = (score + 5).min(100);
    }

    score
}

// ────────────────────────────────────────────────────────────────────────────
// Suggestions
// ────────────────────────────────────────────────────────────────────────────

fn build_suggestions(breakdown: &AtsBreakdown, missing_keywords: &[String]) -> Vec<String> {
    let mut suggestions = Vec::new();

    if breakdown.keyword_match < 70 {
        suggestions.push(
            "Add more of the job's required skills and keywords to your experience \
             and skills sections."
                .to_string(),
        );
    }
    if breakdown.experience_relevance < 70 {
        suggestions.push(
            "Highlight experience that matches the seniority level this role is looking for."
                .to_string(),
        );
    }
    if breakdown.format_parseability < 80 {
        suggestions.push(
            "Complete every section: a summary of at least 50 characters, \
             achievements for each role, skills, and education."
                .to_string(),
        );
    }
    if breakdown.education_match < 70 {
        suggestions.push(
            "Add your education details, including degree and field of study.".to_string(),
        );
    }
    if !missing_keywords.is_empty() {
        suggestions.push(format!(
            "Consider including these missing keywords where they truthfully apply: {}",
            missing_keywords.join(", ")
        ));
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::content_selector::fixtures::{education, profile};
    use crate::generation::content_selector::PersonalInfo;
    use crate::generation::scoring::fixtures::{analysis, date, experience, project, skill};
    use crate::generation::scoring::ScoredFact;
    use crate::models::job::{JobRequirement, RequirementCategory, RequirementType};

    fn today() -> NaiveDate {
        date(2024, 6, 1)
    }

    fn content() -> OptimizedContent {
        let mut personal_info = PersonalInfo::from(&profile());
        personal_info.phone = "+44 20 0000 0000".to_string();
        OptimizedContent {
            personal_info,
            summary: "Backend engineer with eight years building distributed Rust and Python \
                      services."
                .to_string(),
            experiences: vec![ScoredFact::new(
                experience(
                    "Acme",
                    "Senior Engineer",
                    date(2016, 6, 1),
                    None,
                    &["Built Rust services on AWS", "Reduced latency by 40%"],
                ),
                10,
            )],
            education: vec![education("BSc Computer Science")],
            skills: vec![
                ScoredFact::new(skill("Rust", None, 0), 10),
                ScoredFact::new(skill("Python", None, 1), 10),
            ],
            projects: vec![ScoredFact::new(project("ledger", &["postgres"]), 2)],
        }
    }

    fn requirement(text: &str) -> JobRequirement {
        JobRequirement {
            text: text.to_string(),
            category: RequirementCategory::Required,
            kind: RequirementType::Education,
            importance: 0.5,
        }
    }

    #[test]
    fn test_keyword_match_percentage_and_missing() {
        let job = analysis(&["Rust", "Python", "Go"], &["AWS", "kafka", "rust"]);
        let score = score_ats(&content(), &job, today());
        // rust, python, go, aws, kafka → 3 of 5 found ("go" is absent)
        assert_eq!(score.breakdown.keyword_match, 60);
        assert_eq!(score.missing_keywords, vec!["Go", "kafka"]);
    }

    #[test]
    fn test_missing_keywords_capped_at_ten() {
        let terms: Vec<String> = (0..15).map(|i| format!("zzterm{i}")).collect();
        let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
        let score = score_ats(&content(), &analysis(&refs, &[]), today());
        assert_eq!(score.breakdown.keyword_match, 0);
        assert_eq!(score.missing_keywords.len(), MAX_MISSING_KEYWORDS);
    }

    #[test]
    fn test_no_job_terms_scores_full_keyword_match() {
        let score = score_ats(&content(), &analysis(&[], &[]), today());
        assert_eq!(score.breakdown.keyword_match, 100);
        assert!(score.missing_keywords.is_empty());
    }

    #[test]
    fn test_experience_in_band_and_recent() {
        let mut job = analysis(&[], &[]);
        job.experience_level = ExperienceLevel::Senior;
        // 8 years, ongoing → in band 90, +5 recency
        let score = score_ats(&content(), &job, today());
        assert_eq!(score.breakdown.experience_relevance, 95);
    }

    #[test]
    fn test_experience_below_and_above_band() {
        let mut job = analysis(&[], &[]);
        job.experience_level = ExperienceLevel::Principal;
        // 8 years < 10 → 95 - 20 = 75, +5 recency
        assert_eq!(score_ats(&content(), &job, today()).breakdown.experience_relevance, 80);

        job.experience_level = ExperienceLevel::Entry;
        // 8 years > 2 → max(80 - 5, 70) = 75, +5 recency
        assert_eq!(score_ats(&content(), &job, today()).breakdown.experience_relevance, 80);
    }

    #[test]
    fn test_unknown_level_without_experience() {
        let mut c = content();
        c.experiences.clear();
        let score = score_ats(&c, &analysis(&[], &[]), today());
        assert_eq!(score.breakdown.experience_relevance, 50);
    }

    #[test]
    fn test_format_penalties() {
        let mut c = content();
        assert_eq!(format_parseability(&c), 100);

        c.summary = "Too short.".to_string();
        c.skills.clear();
        c.experiences[0].fact.achievements.clear();
        c.projects.clear();
        // 100 - 10 - 15 - 5, no project bonus, +5 for email and phone
        assert_eq!(format_parseability(&c), 75);
    }

    #[test]
    fn test_education_degree_precedence() {
        let mut c = content();
        let mut job = analysis(&[], &[]);
        job.requirements = vec![requirement("Bachelor's or Master's degree in CS")];
        assert_eq!(education_match(&c, &job), 90);

        c.education = vec![education("MSc Computer Science")];
        assert_eq!(education_match(&c, &job), 95);

        c.education[0].gpa = Some(3.8);
        assert_eq!(education_match(&c, &job), 100);

        c.education.clear();
        assert_eq!(education_match(&c, &job), 50);
    }

    #[test]
    fn test_degree_terms_match_whole_words_only() {
        let mut c = content();
        c.education = vec![education("Master of Science, Computer Science")];
        let mut job = analysis(&[], &[]);

        job.requirements = vec![requirement("Scrum Master certification")];
        assert_eq!(education_match(&c, &job), 70);

        job.requirements = vec![requirement("Experience with embargo and mbank APIs")];
        c.education = vec![education("MBA")];
        assert_eq!(education_match(&c, &job), 70);

        job.requirements = vec![requirement("MBA preferred")];
        assert_eq!(education_match(&c, &job), 95);

        job.requirements = vec![requirement("Master\u{2019}s degree required")];
        c.education = vec![education("Master of Engineering")];
        assert_eq!(education_match(&c, &job), 95);
    }

    #[test]
    fn test_suggestions_follow_thresholds() {
        let mut c = content();
        c.education.clear();
        c.skills.clear();
        let score = score_ats(&c, &analysis(&["kubernetes"], &[]), today());
        assert!(score.suggestions.iter().any(|s| s.contains("required skills")));
        assert!(score.suggestions.iter().any(|s| s.contains("education details")));
        assert!(score.suggestions.iter().any(|s| s.contains("kubernetes")));
    }

    #[test]
    fn test_scores_stay_in_bounds_for_degenerate_content() {
        let mut empty = content();
        empty.summary.clear();
        empty.experiences = (0..30)
            .map(|i| {
                let ended = Some(date(2000 + i, 1, 1));
                ScoredFact::new(experience("", "", date(2000, 1, 1), ended, &[]), 0)
            })
            .collect();
        empty.skills.clear();
        empty.education.clear();
        empty.projects.clear();

        for level in [ExperienceLevel::Entry, ExperienceLevel::Principal, ExperienceLevel::Other] {
            let mut job = analysis(&["x"], &["y"]);
            job.experience_level = level;
            let score = score_ats(&empty, &job, today());
            let b = score.breakdown;
            for value in [
                score.overall,
                b.keyword_match,
                b.experience_relevance,
                b.format_parseability,
                b.education_match,
            ] {
                assert!(value <= 100);
            }
            assert_eq!(b.format_parseability, 0);
        }
    }

    #[test]
    fn test_overall_is_rounded_weighted_sum() {
        let job = analysis(&["Rust"], &[]);
        let score = score_ats(&content(), &job, today());
        let b = score.breakdown;
        let expected = (0.4 * b.keyword_match as f64
            + 0.3 * b.experience_relevance as f64
            + 0.2 * b.format_parseability as f64
            + 0.1 * b.education_match as f64)
            .round() as u32;
        assert_eq!(score.overall, expected);
    }
}
