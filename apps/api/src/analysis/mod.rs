// Analysis Engine
//   extract  : PDF / DOCX -> plain text (blocking pool)
//   prompts  : analysis and enhancement prompt templates
//   parser   : free-text reply -> AnalysisResult, never fails
//   engine   : analyze / enhance orchestration, one completion call each
//   handlers : /api/resumes/:id/{analyze,enhance}

pub mod engine;
pub mod extract;
pub mod handlers;
pub mod parser;
pub mod prompts;
