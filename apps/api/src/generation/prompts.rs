// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for job description analysis; enforces JSON-only output.
pub const JD_ANALYSIS_SYSTEM: &str =
    "You are an expert job description analyst and resume strategist. \
    Parse a job description and extract structured information. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Job analysis prompt template. Replace `{company}`, `{position}`, `{jd_text}`.
pub const JD_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following job description for the role of {position} at {company}.

Return a JSON object with this EXACT schema (no extra fields):
{
  "requirements": [
    {"text": "5+ years of Python development", "category": "required", "type": "experience", "importance": 0.9}
  ],
  "skills": ["Python", "AWS"],
  "experience_level": "senior",
  "keywords": ["microservices", "CI/CD"],
  "company_info": "One sentence about the company"
}

Rules:
- category is "required" or "preferred"
- type is one of "skill", "experience", "education", "certification"
- importance is between 0.0 and 1.0
- experience_level is one of "entry", "junior", "mid", "senior", "lead", "principal"
- skills are concrete technologies and competencies; keywords are other ATS-relevant terms

JOB DESCRIPTION:
{jd_text}"#;

/// System prompt for summary generation.
pub const SUMMARY_SYSTEM: &str = "You are an expert resume writer. \
    You write concise, ATS-friendly professional summaries in the third person without pronouns. \
    Respond with the summary text only: no headings, no quotes, no preamble.";

/// Summary prompt template.
/// Replace: {no_fabrication}, {position}, {company}, {roles}, {skills}, {job_skills}, {keywords}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"{no_fabrication}

Write a 2-3 sentence professional summary for a candidate applying for the {position} role at {company}.

CANDIDATE'S RECENT ROLES:
{roles}

CANDIDATE'S TOP SKILLS:
{skills}

JOB SKILLS: {job_skills}
JOB KEYWORDS: {keywords}

Incorporate job keywords only where the candidate's roles and skills support them."#;

/// System prompt for bullet rewriting.
pub const BULLETS_SYSTEM: &str = "You are an expert resume writer optimizing achievement bullets \
    for Applicant Tracking Systems. Respond with exactly one rewritten bullet per line, \
    in the same order as the input, with no numbering, headings, or commentary.";

/// Bullet rewriting prompt template.
/// Replace: {no_fabrication}, {context}, {job_skills}, {keywords}, {count}, {bullets}
pub const BULLETS_PROMPT_TEMPLATE: &str = r#"{no_fabrication}

Rewrite the following {count} resume bullets for: {context}

Guidelines:
- Start each bullet with a strong action verb
- Keep every metric exactly as given; never add new numbers
- Naturally include these job skills where truthful: {job_skills}
- Naturally include these keywords where truthful: {keywords}
- Return exactly {count} lines, one per bullet, in the same order

BULLETS:
{bullets}"#;
