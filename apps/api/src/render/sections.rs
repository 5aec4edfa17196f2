//! Markup blocks for the list sections. Every user-derived string goes through
//! `escape_latex`; an empty collection renders as an empty string.

use chrono::NaiveDate;

use crate::generation::scoring::ScoredFact;
use crate::models::profile::{Education, Project, Skill, WorkExperience};
use crate::render::escape::escape_latex;

const BLOCK_SEPARATOR: &str = "\n\n";
const UNCATEGORIZED_SKILLS: &str = "Other";

/// `Jan 2020`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// `Jan 2020 -- Present` when the end date is absent.
pub fn format_date_range(start: NaiveDate, end: Option<NaiveDate>) -> String {
    let end = end.map(format_date).unwrap_or_else(|| "Present".to_string());
    format!("{} -- {}", format_date(start), end)
}

fn itemize(items: &[String]) -> Option<String> {
    let items: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("  \\item {}", escape_latex(item)))
        .collect();
    // An empty itemize environment does not compile.
    if items.is_empty() {
        return None;
    }
    Some(format!("\\begin{{itemize}}\n{}\n\\end{{itemize}}", items.join("\n")))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn render_experience(experiences: &[ScoredFact<WorkExperience>]) -> String {
    experiences
        .iter()
        .map(|scored| {
            let exp = &scored.fact;
            let mut lines = vec![
                format!(
                    "\\textbf{{{}}} \\hfill {}\\\\",
                    escape_latex(&exp.position),
                    format_date_range(exp.start_date, exp.end_date)
                ),
                match non_empty(exp.location.as_deref()) {
                    Some(location) => format!(
                        "\\textit{{{}}} \\hfill {}",
                        escape_latex(&exp.company),
                        escape_latex(location)
                    ),
                    None => format!("\\textit{{{}}}", escape_latex(&exp.company)),
                },
            ];
            if let Some(list) = itemize(&exp.achievements) {
                lines.push(list);
            }
            if !exp.technologies.is_empty() {
                lines.push(format!(
                    "\\textit{{Technologies:}} {}",
                    escape_latex(&exp.technologies.join(", "))
                ));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

pub fn render_education(education: &[Education]) -> String {
    education
        .iter()
        .map(|edu| {
            let degree = match non_empty(edu.field_of_study.as_deref()) {
                Some(field) => format!("{} in {}", edu.degree, field),
                None => edu.degree.clone(),
            };
            let mut lines = vec![
                format!(
                    "\\textbf{{{}}} \\hfill {}\\\\",
                    escape_latex(&degree),
                    format_date_range(edu.start_date, edu.end_date)
                ),
                match edu.gpa {
                    Some(gpa) => format!(
                        "\\textit{{{}}} \\hfill GPA: {gpa:.2}",
                        escape_latex(&edu.institution)
                    ),
                    None => format!("\\textit{{{}}}", escape_latex(&edu.institution)),
                },
            ];
            if let Some(list) = itemize(&edu.achievements) {
                lines.push(list);
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// One line per category, categories in order of first appearance so the
/// most relevant group leads.
pub fn render_skills(skills: &[ScoredFact<Skill>]) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for scored in skills {
        let skill = &scored.fact;
        let category = non_empty(skill.category.as_deref()).unwrap_or(UNCATEGORIZED_SKILLS);
        match groups.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(category)) {
            Some((_, names)) => names.push(skill.name.as_str()),
            None => groups.push((category, vec![skill.name.as_str()])),
        }
    }

    groups
        .into_iter()
        .map(|(category, names)| {
            format!(
                "\\textbf{{{}:}} {}",
                escape_latex(category),
                escape_latex(&names.join(", "))
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

pub fn render_projects(projects: &[ScoredFact<Project>]) -> String {
    projects
        .iter()
        .map(|scored| {
            let project = &scored.fact;
            let heading = match project.start_date {
                Some(start) => format!(
                    "\\textbf{{{}}} \\hfill {}",
                    escape_latex(&project.title),
                    format_date_range(start, project.end_date)
                ),
                None => format!("\\textbf{{{}}}", escape_latex(&project.title)),
            };
            let mut lines = vec![heading];
            if !project.technologies.is_empty() {
                lines.push(format!(
                    "\\\\\\textit{{{}}}",
                    escape_latex(&project.technologies.join(", "))
                ));
            }
            if let Some(url) = non_empty(project.url.as_deref()) {
                lines.push(format!("\\\\{}", escape_latex(url)));
            }
            if let Some(description) = non_empty(project.description.as_deref()) {
                lines.push(format!("\\\\{}", escape_latex(description)));
            }
            if let Some(list) = itemize(&project.highlights) {
                lines.push(list);
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}
