//! Best-effort decoding of the free-text analysis reply.
//!
//! The reply format is not guaranteed, so parsing never fails: anything not
//! recognised leaves the defaults in place.

use serde::Serialize;

pub const DEFAULT_MATCH_SCORE: f64 = 0.7;
pub const RETRY_SUGGESTION: &str = "Please try analysis again";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub match_score: f64,
    pub key_matches: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            match_score: DEFAULT_MATCH_SCORE,
            key_matches: Vec::new(),
            missing_keywords: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

impl AnalysisResult {
    fn list_mut(&mut self, label: Label) -> Option<&mut Vec<String>> {
        match label {
            Label::MatchScore => None,
            Label::KeyMatches => Some(&mut self.key_matches),
            Label::MissingKeywords => Some(&mut self.missing_keywords),
            Label::Suggestions => Some(&mut self.suggestions),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    MatchScore,
    KeyMatches,
    MissingKeywords,
    Suggestions,
}

const LABELS: [(&str, Label); 4] = [
    ("match score", Label::MatchScore),
    ("key matches", Label::KeyMatches),
    ("missing keywords", Label::MissingKeywords),
    ("suggestions", Label::Suggestions),
];

/// Scans `reply` line by line for the four labelled fields.
pub fn parse_analysis(reply: &str) -> AnalysisResult {
    let mut result = AnalysisResult::default();
    let mut recognised = false;
    let mut collecting: Option<Label> = None;
    let mut collected_any = false;

    for line in reply.lines() {
        if let Some((label, value)) = find_label(line) {
            recognised = true;
            collecting = None;
            let value = clean(value);

            if value.is_empty() {
                if let Some(list) = result.list_mut(label) {
                    list.clear();
                    collecting = Some(label);
                    collected_any = false;
                }
                continue;
            }

            match label {
                Label::MatchScore => {
                    if let Some(score) = parse_score(value) {
                        result.match_score = score;
                    }
                }
                Label::KeyMatches => result.key_matches = split_list(value),
                Label::MissingKeywords => result.missing_keywords = split_list(value),
                Label::Suggestions => result.suggestions = vec![value.to_string()],
            }
            continue;
        }

        let Some(label) = collecting else {
            continue;
        };

        if line.trim().is_empty() {
            // Blank lines between a label and its first item are tolerated.
            if collected_any {
                collecting = None;
            }
            continue;
        }

        match list_item(line) {
            Some(item) if !item.is_empty() => {
                if let Some(list) = result.list_mut(label) {
                    list.push(item.to_string());
                }
                collected_any = true;
            }
            _ => collecting = None,
        }
    }

    if !recognised {
        result.suggestions = vec![RETRY_SUGGESTION.to_string()];
    }
    result
}

/// Earliest label in the line that is followed (after optional emphasis) by a colon.
fn find_label(line: &str) -> Option<(Label, &str)> {
    // ASCII lowering keeps byte offsets aligned with `line`.
    let lower = line.to_ascii_lowercase();
    let mut best: Option<(usize, Label, &str)> = None;

    for (name, label) in LABELS {
        for (idx, _) in lower.match_indices(name) {
            let after = line[idx + name.len()..]
                .trim_start_matches(|c: char| c == '*' || c == '_' || c == ' ');
            if let Some(value) = after.strip_prefix(':') {
                if best.map_or(true, |(b, _, _)| idx < b) {
                    best = Some((idx, label, value));
                }
                break;
            }
        }
    }

    best.map(|(_, label, value)| (label, value))
}

fn clean(value: &str) -> &str {
    value.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| clean(s).trim_end_matches('.').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text of a bullet (`-`, `*`, `+`, `•`) or numbered (`1.`, `1)`) line.
fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for marker in ["- ", "* ", "+ ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return Some(clean(rest));
        }
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &trimmed[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    Some(clean(rest))
}

/// First number in the value. `n/d` is a fraction and a trailing `%` a percentage.
/// Bare values in (1, 10] are scores out of ten, (10, 100] percentages.
fn parse_score(value: &str) -> Option<f64> {
    let start = value.find(|c: char| c.is_ascii_digit())?;
    let (number, rest) = leading_number(&value[start..])?;

    let denominator = rest
        .trim_start()
        .strip_prefix('/')
        .and_then(|r| leading_number(r.trim_start()))
        .map(|(d, _)| d)
        .filter(|d| *d > 0.0);

    let percent = rest.trim_start().starts_with('%');
    let score = match denominator {
        Some(d) => number / d,
        None if percent => number / 100.0,
        None if number > 1.0 && number <= 10.0 => number / 10.0,
        None if number > 10.0 && number <= 100.0 => number / 100.0,
        None => number,
    };
    Some(score.clamp(0.0, 1.0))
}

fn leading_number(s: &str) -> Option<(f64, &str)> {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let number = s[..end].trim_end_matches('.').parse::<f64>().ok()?;
    Some((number, &s[end..]))
}
