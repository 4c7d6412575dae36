// LLM prompt constants for resume analysis and enhancement.

/// System prompt for resume analysis.
pub const ANALYSIS_SYSTEM: &str = "You are an expert resume analyzer. \
    Analyze the resume against the job description and provide detailed feedback.";

/// Analysis prompt template. Replace `{job_description}` and `{resume_text}` before sending.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Please analyze this resume against the job description.

Answer with exactly these four labelled lines, in this order:
Match Score: <a number between 0 and 1>
Key Matches: <comma-separated skills and qualifications the resume already shows>
Missing Keywords: <comma-separated keywords and skills the resume lacks>
Suggestions: <one specific, actionable suggestion for improvement>

Job Description:
{job_description}

Resume:
{resume_text}"#;

/// System prompt for resume enhancement.
pub const ENHANCE_SYSTEM: &str = "You are an expert resume writer. \
    Enhance the resume to better match the job description while maintaining truthfulness. \
    Never invent employers, titles, dates, degrees or metrics.";

/// Enhancement prompt template. Replace `{target_areas}`, `{job_description}` and
/// `{resume_text}` before sending.
pub const ENHANCE_PROMPT_TEMPLATE: &str = r#"Please enhance this resume to better match the job description.
Focus on these areas: {target_areas}

Job Description:
{job_description}

Current Resume:
{resume_text}

Provide:
1. Enhanced resume content
2. List of improvements made
3. Explanation of each enhancement"#;

/// Used when the caller names no target areas.
pub const ALL_SECTIONS: &str = "all sections";

pub fn analysis_prompt(job_description: &str, resume_text: &str) -> String {
    ANALYSIS_PROMPT_TEMPLATE
        .replace("{job_description}", job_description)
        .replace("{resume_text}", resume_text)
}

pub fn enhance_prompt(job_description: &str, resume_text: &str, target_areas: &[String]) -> String {
    let areas: Vec<&str> = target_areas
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();
    let target_areas = if areas.is_empty() {
        ALL_SECTIONS.to_string()
    } else {
        areas.join(", ")
    };

    ENHANCE_PROMPT_TEMPLATE
        .replace("{target_areas}", &target_areas)
        .replace("{job_description}", job_description)
        .replace("{resume_text}", resume_text)
}
