use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A trusted document template with `{{slot}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub source_markup: String,
    pub is_active: bool,
}
