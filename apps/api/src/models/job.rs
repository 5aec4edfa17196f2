use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

// Labels in analyses come from model output, so they are matched loosely:
// any case, with spaces or dashes standing in for underscores.
fn normalize_label(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Anything not recognisably optional counts as required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum RequirementCategory {
    #[default]
    Required,
    Preferred,
}

impl From<String> for RequirementCategory {
    fn from(raw: String) -> Self {
        match normalize_label(&raw).as_str() {
            "preferred" | "optional" | "nice_to_have" | "bonus" => Self::Preferred,
            _ => Self::Required,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum RequirementType {
    #[default]
    Skill,
    Experience,
    Education,
    Certification,
    Other,
}

impl From<String> for RequirementType {
    fn from(raw: String) -> Self {
        match normalize_label(&raw).as_str() {
            "skill" | "skills" => Self::Skill,
            "experience" => Self::Experience,
            "education" | "degree" => Self::Education,
            "certification" | "certifications" | "certificate" => Self::Certification,
            _ => Self::Other,
        }
    }
}

/// A single requirement extracted from the job description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequirement {
    pub text: String,
    #[serde(default)]
    pub category: RequirementCategory,
    #[serde(rename = "type", default)]
    pub kind: RequirementType,
    /// 0.0 – 1.0
    #[serde(default)]
    pub importance: f64,
}

/// Seniority the posting targets. Unrecognised values deserialize to `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ExperienceLevel {
    Entry,
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
    #[default]
    Other,
}

impl From<String> for ExperienceLevel {
    fn from(raw: String) -> Self {
        match normalize_label(&raw).as_str() {
            "entry" | "entry_level" => Self::Entry,
            "junior" => Self::Junior,
            "mid" | "mid_level" => Self::Mid,
            "senior" => Self::Senior,
            "lead" => Self::Lead,
            "principal" => Self::Principal,
            _ => Self::Other,
        }
    }
}

/// Structured analysis of a job description. Produced once, read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobAnalysis {
    #[serde(default)]
    pub requirements: Vec<JobRequirement>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub company_info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobDescriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub position: String,
    pub raw_text: String,
    pub analyzed_data: Option<Value>,
}

/// A job description with its analysis decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub position: String,
    pub raw_text: String,
    pub analysis: Option<JobAnalysis>,
}

impl TryFrom<JobDescriptionRow> for JobDescription {
    type Error = serde_json::Error;

    fn try_from(row: JobDescriptionRow) -> Result<Self, Self::Error> {
        let analysis = row.analyzed_data.map(serde_json::from_value).transpose()?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            company: row.company,
            position: row.position,
            raw_text: row.raw_text,
            analysis,
        })
    }
}
