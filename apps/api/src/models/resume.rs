use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::generation::ats::AtsScore;
use crate::generation::rewriter::OptimizedContent;

/// Lifecycle of a generated résumé. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::Pending => "pending",
            ResumeStatus::Processing => "processing",
            ResumeStatus::Completed => "completed",
            ResumeStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_description_id: Uuid,
    pub template_id: Uuid,
    pub status: String,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub ats_score: Option<Value>,
    pub generated_content: Option<Value>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a completed generation writes back onto the résumé record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub file_name: String,
    pub file_path: String,
    pub ats_score: AtsScore,
    pub generated_content: OptimizedContent,
    pub status: ResumeStatus,
}

/// Inputs for a new résumé record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewResume {
    pub user_id: Uuid,
    pub job_description_id: Uuid,
    pub template_id: Uuid,
}

impl From<&ResumeRow> for NewResume {
    fn from(row: &ResumeRow) -> Self {
        Self {
            user_id: row.user_id,
            job_description_id: row.job_description_id,
            template_id: row.template_id,
        }
    }
}
