// Résumé generation: relevance scoring, consolidation, selection, AI rewriting,
// ATS scoring, and the pipeline that runs them for one queued job.
// All LLM calls go through llm_client::TextGenerator.

pub mod ats;
pub mod consolidator;
pub mod content_selector;
pub mod handlers;
pub mod jd_parser;
pub mod pipeline;
pub mod prompts;
pub mod rewriter;
pub mod scoring;
