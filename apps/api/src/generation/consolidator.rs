//! Experience Consolidator: collapses multiple records at one employer into a single entry.
//!
//! Same title + overlapping dates → duplicate merge (top 5 achievements).
//! Anything else → career progression (top 6 achievements, "promoted from" title).
//! Never widens the date span beyond the union of the source records.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::generation::scoring::ScoredFact;
use crate::models::profile::WorkExperience;

const DUPLICATE_ACHIEVEMENT_LIMIT: usize = 5;
const PROGRESSION_ACHIEVEMENT_LIMIT: usize = 6;

const LEGAL_SUFFIXES: &[&str] = &["inc", "corp", "corporation", "ltd", "limited", "llc"];

const STRONG_VERBS: &[&str] = &[
    "developed",
    "implemented",
    "designed",
    "led",
    "managed",
    "created",
    "improved",
    "increased",
    "reduced",
    "optimized",
    "automated",
    "built",
    "architected",
    "launched",
    "delivered",
    "achieved",
    "spearheaded",
];

const IMPACT_NOUNS: &[&str] = &[
    "revenue",
    "efficiency",
    "performance",
    "scalability",
    "quality",
    "time",
    "cost",
];

/// Lowercases, collapses whitespace, and strips trailing legal suffixes.
///
/// `"Acme Corp, Inc."` and `"Acme Corp"` both normalize to `"acme"`.
pub fn normalize_company(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

    while tokens.len() > 1 {
        let last = tokens[tokens.len() - 1].trim_matches(|c: char| c == '.' || c == ',');
        if last.is_empty() || LEGAL_SUFFIXES.contains(&last) {
            tokens.pop();
        } else {
            break;
        }
    }

    tokens
        .join(" ")
        .trim_end_matches(|c: char| c == ',' || c == '.')
        .to_string()
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Heuristic quality of a single achievement line.
pub fn achievement_quality(text: &str) -> u32 {
    let lower = text.trim().to_lowercase();
    let mut score = 0;

    if lower.chars().any(|c| c.is_ascii_digit()) {
        score += 10;
        if lower.contains('%') {
            score += 5;
        }
    }

    let first_word = lower
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .unwrap_or("");
    if STRONG_VERBS.contains(&first_word) {
        score += 8;
    }

    let words = lower.split_whitespace().count();
    if (8..=25).contains(&words) {
        score += 5;
    }

    if IMPACT_NOUNS.iter().any(|noun| lower.contains(noun)) {
        score += 5;
    }

    score
}

/// Picks the `limit` best achievements, deduplicated by trimmed text.
/// Ties keep first occurrence.
fn top_achievements<'a>(
    achievements: impl Iterator<Item = &'a String>,
    limit: usize,
) -> Vec<String> {
    let mut unique: Vec<(String, u32)> = Vec::new();
    for achievement in achievements {
        let trimmed = achievement.trim();
        if trimmed.is_empty() {
            continue;
        }
        let quality = achievement_quality(trimmed);
        match unique.iter_mut().find(|(text, _)| text == trimmed) {
            Some(existing) => existing.1 = existing.1.max(quality),
            None => unique.push((trimmed.to_string(), quality)),
        }
    }

    unique.sort_by(|a, b| b.1.cmp(&a.1));
    unique.into_iter().take(limit).map(|(text, _)| text).collect()
}

fn union_technologies(group: &[ScoredFact<WorkExperience>]) -> Vec<String> {
    let mut seen = Vec::new();
    let mut technologies = Vec::new();
    for tech in group.iter().flat_map(|e| e.fact.technologies.iter()) {
        let key = tech.trim().to_lowercase();
        if !key.is_empty() && !seen.contains(&key) {
            seen.push(key);
            technologies.push(tech.trim().to_string());
        }
    }
    technologies
}

fn intervals_overlap(a: &WorkExperience, b: &WorkExperience, today: NaiveDate) -> bool {
    let a_end = a.end_date.unwrap_or(today);
    let b_end = b.end_date.unwrap_or(today);
    a.start_date <= b_end && b.start_date <= a_end
}

fn any_pair_overlaps(group: &[ScoredFact<WorkExperience>], today: NaiveDate) -> bool {
    group.iter().enumerate().any(|(i, a)| {
        group[i + 1..]
            .iter()
            .any(|b| intervals_overlap(&a.fact, &b.fact, today))
    })
}

/// Earliest start; latest end, staying open-ended only if the most recent record is.
fn merged_span(
    group: &[ScoredFact<WorkExperience>],
    today: NaiveDate,
) -> (NaiveDate, Option<NaiveDate>) {
    let start = group
        .iter()
        .map(|e| e.fact.start_date)
        .min()
        .unwrap_or(today);
    let end = match group.first() {
        Some(most_recent) if most_recent.fact.end_date.is_none() => None,
        _ => group
            .iter()
            .map(|e| e.fact.end_date.unwrap_or(today))
            .max(),
    };
    (start, end)
}

fn merge_group(
    mut group: Vec<ScoredFact<WorkExperience>>,
    today: NaiveDate,
) -> ScoredFact<WorkExperience> {
    // Most recent first; `sort_by` is stable so equal starts keep input order.
    group.sort_by(|a, b| b.fact.start_date.cmp(&a.fact.start_date));

    let primary_title = normalize_title(&group[0].fact.position);
    let same_title = group
        .iter()
        .all(|e| normalize_title(&e.fact.position) == primary_title);
    let is_duplicate = same_title && any_pair_overlaps(&group, today);

    let (start_date, end_date) = merged_span(&group, today);
    let technologies = union_technologies(&group);
    let relevance_score = group.iter().map(|e| e.relevance_score).max().unwrap_or(0);
    let display_order = group
        .iter()
        .map(|e| e.fact.display_order)
        .min()
        .unwrap_or(0);
    let source_ids = group
        .iter()
        .flat_map(|e| e.source_ids.iter().copied())
        .collect();

    let limit = if is_duplicate {
        DUPLICATE_ACHIEVEMENT_LIMIT
    } else {
        PROGRESSION_ACHIEVEMENT_LIMIT
    };
    let achievements = top_achievements(
        group.iter().flat_map(|e| e.fact.achievements.iter()),
        limit,
    );

    let position = if is_duplicate {
        group[0].fact.position.clone()
    } else {
        let mut previous: Vec<&str> = Vec::new();
        let mut seen = vec![primary_title.clone()];
        for entry in &group[1..] {
            let normalized = normalize_title(&entry.fact.position);
            if !seen.contains(&normalized) {
                seen.push(normalized);
                previous.push(entry.fact.position.trim());
            }
        }
        if previous.is_empty() {
            group[0].fact.position.clone()
        } else {
            format!(
                "{} (promoted from {})",
                group[0].fact.position,
                previous.join(", ")
            )
        }
    };

    let mut merged = group.swap_remove(0).fact;
    merged.position = position;
    merged.start_date = start_date;
    merged.end_date = end_date;
    merged.technologies = technologies;
    merged.achievements = achievements;
    merged.display_order = display_order;

    ScoredFact {
        fact: merged,
        relevance_score,
        source_ids,
    }
}

/// Groups experiences by normalized employer and merges each group.
/// Output is sorted by start date, most recent first.
pub fn consolidate_experiences(
    experiences: Vec<ScoredFact<WorkExperience>>,
    today: NaiveDate,
) -> Vec<ScoredFact<WorkExperience>> {
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ScoredFact<WorkExperience>>> = Vec::new();

    for experience in experiences {
        let key = normalize_company(&experience.fact.company);
        match group_index.get(&key) {
            Some(&idx) => groups[idx].push(experience),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![experience]);
            }
        }
    }

    let mut consolidated: Vec<_> = groups
        .into_iter()
        .map(|mut group| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                merge_group(group, today)
            }
        })
        .collect();

    consolidated.sort_by(|a, b| b.fact.start_date.cmp(&a.fact.start_date));
    consolidated
}
