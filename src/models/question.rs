//! Question metadata models.
//!
//! Epistemic foundation:
//! - K_i: Every question has an id, a type, and (numeric only) boundary
//!   openness metadata supplied by the platform
//! - B_i: Option names arriving from model output may be quoted, padded,
//!   or contain control characters → sanitized before use as keys

use serde::{Deserialize, Serialize};

/// Maximum length of a sanitized option name.
const MAX_OPTION_NAME_LEN: usize = 100;

/// Question type on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Yes/no question, forecast is a single probability
    Binary,
    /// Closed option set, forecast is a distribution over options
    MultipleChoice,
    /// Continuous quantity, forecast is a 201-point CDF
    Numeric,
}

impl QuestionType {
    /// Short name used in logs and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::MultipleChoice => "multiple_choice",
            Self::Numeric => "numeric",
        }
    }
}

/// Immutable per-question metadata.
///
/// K_i: Read-only to the core; supplied by the question source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    /// Platform question id
    pub id: u64,

    /// Question title (used in prompts and logs)
    pub title: String,

    /// Question type
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Ordered option names (multiple choice only, empty otherwise)
    #[serde(default)]
    pub options: Vec<String>,

    /// Whether the numeric range's lower endpoint is open
    /// (mass can exist below the displayed range)
    #[serde(default)]
    pub lower_bound_open: bool,

    /// Whether the numeric range's upper endpoint is open
    #[serde(default)]
    pub upper_bound_open: bool,

    /// Unit of measure for numeric questions, if stated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl QuestionSpec {
    /// Sanitized option names, in order.
    pub fn sanitized_options(&self) -> Vec<String> {
        self.options
            .iter()
            .map(|o| sanitize_option_name(o))
            .collect()
    }
}

/// Sanitize an option name for use as a score key.
///
/// Strips surrounding quotes, removes control characters and newlines,
/// collapses interior whitespace, and caps length. Model output and
/// platform metadata pass through the same function so lookups line up.
pub fn sanitize_option_name(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`');

    let mut out = String::with_capacity(trimmed.len());
    let mut last_was_space = false;
    for c in trimmed.chars() {
        // Newlines and tabs are whitespace first, control second.
        if c.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else if c.is_control() {
            continue;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }

    if out.len() > MAX_OPTION_NAME_LEN {
        let mut end = MAX_OPTION_NAME_LEN;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_quotes_and_controls() {
        assert_eq!(sanitize_option_name("\"Option A\""), "Option A");
        assert_eq!(sanitize_option_name("'2+'"), "2+");
        assert_eq!(sanitize_option_name("Op\ntion\tB"), "Op tion B");
        assert_eq!(sanitize_option_name("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_option_name(&long).len(), 100);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_option_name(" \"Google DeepMind\" ");
        assert_eq!(sanitize_option_name(&once), once);
    }
}
