//! One-pass `{{slot}}` interpreter over a trusted template.
//!
//! Slots resolve through a typed `TemplateContext`. Substituted values are
//! appended to the output and never re-scanned, so user text that happens to
//! contain `{{...}}` can't trigger a second substitution.

use tracing::warn;

use crate::generation::rewriter::OptimizedContent;
use crate::render::escape::escape_latex;
use crate::render::sections::{render_education, render_experience, render_projects, render_skills};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Name,
    FirstName,
    LastName,
    Email,
    Phone,
    Location,
    Linkedin,
    Github,
    Website,
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
}

impl Slot {
    pub fn parse(identifier: &str) -> Option<Self> {
        let slot = match identifier {
            "name" | "full_name" => Self::Name,
            "first_name" | "firstName" => Self::FirstName,
            "last_name" | "lastName" => Self::LastName,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "location" => Self::Location,
            "linkedin" => Self::Linkedin,
            "github" => Self::Github,
            "website" => Self::Website,
            "summary" => Self::Summary,
            "experience" => Self::Experience,
            "education" => Self::Education,
            "skills" => Self::Skills,
            "projects" => Self::Projects,
            _ => return None,
        };
        Some(slot)
    }
}

/// Fully escaped values for every slot.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
    pub summary: String,
    pub experience: String,
    pub education: String,
    pub skills: String,
    pub projects: String,
}

impl TemplateContext {
    pub fn from_optimized(content: &OptimizedContent) -> Self {
        let info = &content.personal_info;
        Self {
            name: escape_latex(&info.full_name()),
            first_name: escape_latex(&info.first_name),
            last_name: escape_latex(&info.last_name),
            email: escape_latex(&info.email),
            phone: escape_latex(&info.phone),
            location: escape_latex(&info.location),
            linkedin: escape_latex(&info.linkedin),
            github: escape_latex(&info.github),
            website: escape_latex(&info.website),
            summary: escape_latex(&content.summary),
            experience: render_experience(&content.experiences),
            education: render_education(&content.education),
            skills: render_skills(&content.skills),
            projects: render_projects(&content.projects),
        }
    }

    pub fn resolve(&self, slot: Slot) -> &str {
        match slot {
            Slot::Name => &self.name,
            Slot::FirstName => &self.first_name,
            Slot::LastName => &self.last_name,
            Slot::Email => &self.email,
            Slot::Phone => &self.phone,
            Slot::Location => &self.location,
            Slot::Linkedin => &self.linkedin,
            Slot::Github => &self.github,
            Slot::Website => &self.website,
            Slot::Summary => &self.summary,
            Slot::Experience => &self.experience,
            Slot::Education => &self.education,
            Slot::Skills => &self.skills,
            Slot::Projects => &self.projects,
        }
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders `template` against `context`.
///
/// `{{ident}}` with a known identifier is replaced (surrounding whitespace
/// inside the braces is allowed). A well-formed but unknown identifier is left
/// verbatim. Anything else that starts with `{{` is ordinary markup: one brace
/// is emitted and scanning resumes at the next character, so `{{{name}}}`
/// renders as `{` + value + `}`.
pub fn render_template(template: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len() + 4096);
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let candidate = &rest[start + OPEN.len()..];

        let token = candidate
            .find(CLOSE)
            .map(|end| (candidate[..end].trim(), end))
            .filter(|(ident, _)| is_identifier(ident));

        match token {
            Some((ident, end)) => {
                let consumed = OPEN.len() + end + CLOSE.len();
                match Slot::parse(ident) {
                    Some(slot) => out.push_str(context.resolve(slot)),
                    None => {
                        warn!("Unknown template slot '{ident}' left as-is");
                        out.push_str(&rest[start..start + consumed]);
                    }
                }
                rest = &rest[start + consumed..];
            }
            None => {
                out.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::content_selector::fixtures::profile;
    use crate::generation::content_selector::PersonalInfo;

    fn context() -> TemplateContext {
        TemplateContext {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            summary: r"50\% faster".to_string(),
            ..TemplateContext::default()
        }
    }

    #[test]
    fn test_known_slots_replaced() {
        let out = render_template(r"\section*{ {{name}} } {{ email }}", &context());
        assert_eq!(out, r"\section*{ Ada Lovelace } ada@example.com");
    }

    #[test]
    fn test_triple_braces_keep_latex_group() {
        let out = render_template(r"\textbf{{{name}}}", &context());
        assert_eq!(out, r"\textbf{Ada Lovelace}");
    }

    #[test]
    fn test_unknown_slot_left_verbatim() {
        let out = render_template("{{nickname}} / {{name}}", &context());
        assert_eq!(out, "{{nickname}} / Ada Lovelace");
    }

    #[test]
    fn test_unterminated_and_non_identifier_braces_pass_through() {
        let template = r"\newcommand{\x}{{\bf y}} {{name";
        assert_eq!(render_template(template, &context()), template);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let ctx = TemplateContext {
            summary: "{{name}}".to_string(),
            name: "Ada".to_string(),
            ..TemplateContext::default()
        };
        assert_eq!(render_template("{{summary}}", &ctx), "{{name}}");
    }

    #[test]
    fn test_empty_values_render_empty() {
        let out = render_template("[{{phone}}][{{projects}}]", &context());
        assert_eq!(out, "[][]");
    }

    #[test]
    fn test_context_escapes_user_text() {
        let mut info = PersonalInfo::from(&profile());
        info.first_name = "Ada_".to_string();
        let content = OptimizedContent {
            personal_info: info,
            summary: "Cut costs by 30% & more".to_string(),
            experiences: vec![],
            education: vec![],
            skills: vec![],
            projects: vec![],
        };
        let ctx = TemplateContext::from_optimized(&content);
        assert_eq!(ctx.name, r"Ada\_ Lovelace");
        assert_eq!(ctx.summary, r"Cut costs by 30\% \& more");
        assert_eq!(ctx.experience, "");
    }
}
