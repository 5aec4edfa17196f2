//! JD Parser: produces the structured `JobAnalysis` for a raw job description.
//!
//! The model sometimes answers with the analysis object itself and sometimes
//! wraps it as `{"analysis": {...}}`. Both are normalized here; any other shape
//! fails with `LlmError::UnexpectedShape` before reaching business logic.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::generation::prompts::{JD_ANALYSIS_PROMPT_TEMPLATE, JD_ANALYSIS_SYSTEM};
use crate::llm_client::{complete_json, CompletionOptions, LlmError, TextGenerator};
use crate::models::job::{JobAnalysis, JobDescription};

const ANALYSIS_OPTIONS: CompletionOptions = CompletionOptions {
    temperature: 0.3,
    max_tokens: 2000,
};

/// Accepted response shapes. Order matters: the wrapper is tried first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnalysisShape {
    Wrapped(WrappedAnalysis),
    Bare(JobAnalysis),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WrappedAnalysis {
    analysis: JobAnalysis,
}

/// Analyzes a job description with the text-generation service.
pub async fn analyze_job_description(
    job: &JobDescription,
    llm: &dyn TextGenerator,
) -> Result<JobAnalysis, AppError> {
    let prompt = JD_ANALYSIS_PROMPT_TEMPLATE
        .replace("{company}", &job.company)
        .replace("{position}", &job.position)
        .replace("{jd_text}", &job.raw_text);

    let value: Value = complete_json(llm, &prompt, Some(JD_ANALYSIS_SYSTEM), ANALYSIS_OPTIONS)
        .await
        .map_err(|e| AppError::Llm(format!("Job analysis failed: {e}")))?;

    normalize_analysis(value).map_err(|e| AppError::Llm(format!("Job analysis failed: {e}")))
}

fn normalize_analysis(value: Value) -> Result<JobAnalysis, LlmError> {
    if !value.is_object() {
        return Err(LlmError::UnexpectedShape(format!(
            "expected an object, got {}",
            json_kind(&value)
        )));
    }

    let analysis = match serde_json::from_value::<AnalysisShape>(value) {
        Ok(AnalysisShape::Wrapped(wrapped)) => wrapped.analysis,
        Ok(AnalysisShape::Bare(analysis)) => analysis,
        Err(e) => return Err(LlmError::UnexpectedShape(e.to_string())),
    };

    if analysis.requirements.is_empty()
        && analysis.skills.is_empty()
        && analysis.keywords.is_empty()
    {
        return Err(LlmError::UnexpectedShape(
            "analysis has no requirements, skills, or keywords".to_string(),
        ));
    }

    Ok(analysis)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
