//! Relevance Scorer: deterministic keyword scoring of career facts against a job analysis.
//!
//! Pure functions, no I/O. `today` is passed in so results are reproducible.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::JobAnalysis;
use crate::models::profile::{Ordered, Project, Skill, WorkExperience};

/// A career fact annotated with its per-request relevance score.
///
/// `source_ids` traces back to the stored records this entry was built from
/// (more than one after consolidation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFact<T> {
    pub fact: T,
    pub relevance_score: u32,
    pub source_ids: Vec<Uuid>,
}

impl<T: Ordered> ScoredFact<T> {
    pub fn new(fact: T, relevance_score: u32) -> Self {
        let source_ids = vec![fact.fact_id()];
        Self {
            fact,
            relevance_score,
            source_ids,
        }
    }
}

/// Lowercase keyword set: job skills ∪ keywords ∪ requirement tokens longer than 3 chars.
pub fn build_keyword_set(analysis: &JobAnalysis) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();

    for term in analysis.skills.iter().chain(analysis.keywords.iter()) {
        let term = term.trim().to_lowercase();
        if !term.is_empty() {
            keywords.insert(term);
        }
    }

    for requirement in &analysis.requirements {
        for token in requirement.text.split_whitespace() {
            let token = token
                .trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '(' | ')' | '!' | '?'))
                .to_lowercase();
            if token.chars().count() > 3 {
                keywords.insert(token);
            }
        }
    }

    keywords
}

fn count_matches(haystack: &str, keywords: &BTreeSet<String>) -> u32 {
    keywords.iter().filter(|kw| haystack.contains(kw.as_str())).count() as u32
}

/// 2 × keyword matches + recency bonus + duration bonus.
pub fn score_experience(
    experience: &WorkExperience,
    keywords: &BTreeSet<String>,
    today: NaiveDate,
) -> u32 {
    let text = [
        experience.position.as_str(),
        experience.company.as_str(),
        experience.description.as_deref().unwrap_or(""),
        &experience.achievements.join(" "),
        &experience.technologies.join(" "),
    ]
    .join(" ")
    .to_lowercase();

    let mut score = 2 * count_matches(&text, keywords);

    let end = experience.end_date.unwrap_or(today);
    let months_since_end = months_between(end, today);
    if months_since_end < 12.0 {
        score += 5;
    } else if months_since_end < 36.0 {
        score += 3;
    }

    let duration = months_between(experience.start_date, end);
    if duration > 24.0 {
        score += 3;
    } else if duration > 12.0 {
        score += 2;
    }

    score
}

/// Exact keyword hit (10) + 5 per partial overlap + proficiency bonus + capped years.
pub fn score_skill(skill: &Skill, keywords: &BTreeSet<String>) -> u32 {
    let name = skill.name.trim().to_lowercase();
    let mut score = 0;

    if keywords.contains(&name) {
        score += 10;
    }

    if !name.is_empty() {
        for keyword in keywords {
            if *keyword != name && (keyword.contains(&name) || name.contains(keyword.as_str())) {
                score += 5;
            }
        }
    }

    score += match skill.proficiency.as_deref().map(str::to_lowercase).as_deref() {
        Some("expert") => 4,
        Some("advanced") => 3,
        Some("intermediate") => 2,
        Some("beginner") => 1,
        _ => 0,
    };

    score += skill.years_of_experience.unwrap_or(0).clamp(0, 5) as u32;

    score
}

/// 2 × keyword matches + recency bonus + 2 for a public URL.
pub fn score_project(project: &Project, keywords: &BTreeSet<String>, today: NaiveDate) -> u32 {
    let text = [
        project.title.as_str(),
        project.description.as_deref().unwrap_or(""),
        &project.technologies.join(" "),
        &project.highlights.join(" "),
    ]
    .join(" ")
    .to_lowercase();

    let mut score = 2 * count_matches(&text, keywords);

    // Ongoing projects count as current; undated projects get no recency bonus.
    let reference = project
        .end_date
        .or(project.start_date.map(|_| today));
    if let Some(reference) = reference {
        let months = months_between(reference, today);
        if months < 12.0 {
            score += 3;
        } else if months < 24.0 {
            score += 2;
        }
    }

    if project.url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
        score += 2;
    }

    score
}

/// Fractional months from `start` to `end`, floored at zero.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> f64 {
    let years = end.year() - start.year();
    let months = end.month() as i32 - start.month() as i32;
    let total = years * 12 + months;
    let day_frac = (end.day() as f64 - start.day() as f64) / 30.0;
    (total as f64 + day_frac).max(0.0)
}

/// Sorts descending by score; ties keep stored display order ascending.
pub fn rank<T: Ordered>(facts: &mut [ScoredFact<T>]) {
    facts.sort_by(|a, b| {
        b.relevance_score
            .cmp(&a.relevance_score)
            .then_with(|| a.fact.display_order().cmp(&b.fact.display_order()))
    });
}
