//! Metaculus API client - question source and submission collaborator.
//!
//! Epistemic foundation:
//! - K_i: The posts API lists open tournament questions; the predict
//!   endpoint accepts one payload per question
//! - B_i: Question JSON arrives in several historical shapes → normalized
//!   tolerantly, unsupported types skipped

use crate::models::{
    DoxaError, MetaculusError, QuestionSpec, QuestionType, Result, SubmissionPayload,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Page size for posts listing.
const PAGE_SIZE: usize = 50;

/// Metaculus API client.
pub struct MetaculusClient {
    client: reqwest::Client,
    base_url: String,
}

impl MetaculusClient {
    pub fn new(token: String, base_url: String, timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Token {token}"))
            .map_err(|_| DoxaError::Internal("Token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(DoxaError::Network)?;

        Ok(Self { client, base_url })
    }

    /// List open questions in a tournament, normalized to `QuestionSpec`.
    ///
    /// Paginates through the posts API; posts whose question cannot be
    /// normalized (unsupported type, missing fields) are skipped with a
    /// warning, matching the tolerate-and-drop boundary policy.
    pub async fn list_open_questions(&self, tournament: &str) -> Result<Vec<QuestionSpec>> {
        let mut specs = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!("{}/posts/", self.base_url);
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("limit", PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                    ("order_by", "-hotness".to_string()),
                    (
                        "forecast_type",
                        "binary,multiple_choice,numeric".to_string(),
                    ),
                    ("tournaments", tournament.to_string()),
                    ("statuses", "open".to_string()),
                ])
                .send()
                .await?;

            let status = response.status().as_u16();
            if status == 401 {
                return Err(MetaculusError::AuthenticationFailed.into());
            }
            if !response.status().is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(MetaculusError::ApiError { status, message }.into());
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| MetaculusError::InvalidResponse(e.to_string()))?;

            let results = body
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    MetaculusError::InvalidResponse("posts response missing 'results'".to_string())
                })?;

            for post in results {
                match normalize_question(post) {
                    Some(spec) => specs.push(spec),
                    None => {
                        let id = post.get("id").and_then(Value::as_u64).unwrap_or(0);
                        warn!(post_id = id, "Skipping post with unsupported question shape");
                    }
                }
            }

            if results.len() < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        debug!(tournament = tournament, count = specs.len(), "Listed open questions");
        Ok(specs)
    }

    /// Submit a validated payload for a question.
    ///
    /// Success here is the trigger for `ledger.record(id)` at the caller.
    pub async fn submit(&self, question_id: u64, payload: &SubmissionPayload) -> Result<()> {
        let url = format!("{}/questions/forecast/", self.base_url);
        let body = serde_json::json!([{
            "question": question_id,
            "probability_yes": payload.probability_yes,
            "probability_yes_per_category": payload.probability_yes_per_category,
            "continuous_cdf": payload.continuous_cdf,
        }]);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status().as_u16();

        match status {
            s if (200..300).contains(&s) => Ok(()),
            401 => Err(MetaculusError::AuthenticationFailed.into()),
            404 => Err(MetaculusError::QuestionNotFound(question_id).into()),
            _ => {
                let message = response.text().await.unwrap_or_default();
                Err(MetaculusError::SubmissionRejected {
                    question_id,
                    message,
                }
                .into())
            }
        }
    }
}

/// Normalize a post's question JSON into a `QuestionSpec`.
///
/// Handles both the flat modern shape (`type`, `options`,
/// `open_lower_bound`) and the legacy nested shape
/// (`possibilities.type`, `possibilities.outcomes`). Returns None for
/// closed questions and unsupported types.
fn normalize_question(post: &Value) -> Option<QuestionSpec> {
    let q = post.get("question").unwrap_or(post);

    if let Some(status) = q.get("status").and_then(Value::as_str) {
        if status != "open" {
            return None;
        }
    }

    let id = q.get("id").and_then(Value::as_u64)?;
    let title = q
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let possibilities = q.get("possibilities");
    let type_str = q
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| possibilities?.get("type")?.as_str())?;

    let options = extract_options(q);

    let question_type = match type_str {
        "binary" => QuestionType::Binary,
        "multiple_choice" => QuestionType::MultipleChoice,
        // Legacy shape: discrete with named outcomes is multiple choice.
        "discrete" if !options.is_empty() => QuestionType::MultipleChoice,
        "numeric" | "continuous" | "discrete" => QuestionType::Numeric,
        _ => return None,
    };

    let bound = |key: &str| -> bool {
        q.get(key)
            .or_else(|| possibilities.and_then(|p| p.get(key)))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    };

    Some(QuestionSpec {
        id,
        title,
        question_type,
        options,
        lower_bound_open: bound("open_lower_bound"),
        upper_bound_open: bound("open_upper_bound"),
        unit: q
            .get("unit")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    })
}

/// Option names from either `options: ["A", ...]`,
/// `options: [{"name": "A"}, ...]`, or `possibilities.outcomes`.
fn extract_options(q: &Value) -> Vec<String> {
    let candidates = q
        .get("options")
        .and_then(Value::as_array)
        .or_else(|| {
            q.get("possibilities")?
                .get("outcomes")
                .and_then(Value::as_array)
        });

    let Some(items) = candidates else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_modern_binary() {
        let post = json!({
            "id": 999,
            "question": {
                "id": 578,
                "title": "Will it happen?",
                "type": "binary",
                "status": "open"
            }
        });
        let spec = normalize_question(&post).unwrap();
        assert_eq!(spec.id, 578);
        assert_eq!(spec.question_type, QuestionType::Binary);
        assert!(spec.options.is_empty());
    }

    #[test]
    fn test_normalize_legacy_discrete_with_outcomes() {
        let post = json!({
            "question": {
                "id": 12345,
                "title": "Which one?",
                "possibilities": {
                    "type": "discrete",
                    "outcomes": [
                        {"name": "Google"},
                        {"name": "OpenAI"},
                        {"name": "Anthropic"}
                    ]
                }
            }
        });
        let spec = normalize_question(&post).unwrap();
        assert_eq!(spec.question_type, QuestionType::MultipleChoice);
        assert_eq!(spec.options, vec!["Google", "OpenAI", "Anthropic"]);
    }

    #[test]
    fn test_normalize_numeric_with_open_bounds() {
        let post = json!({
            "question": {
                "id": 14333,
                "title": "How many?",
                "type": "numeric",
                "open_lower_bound": true,
                "open_upper_bound": false,
                "unit": "people"
            }
        });
        let spec = normalize_question(&post).unwrap();
        assert_eq!(spec.question_type, QuestionType::Numeric);
        assert!(spec.lower_bound_open);
        assert!(!spec.upper_bound_open);
        assert_eq!(spec.unit.as_deref(), Some("people"));
    }

    #[test]
    fn test_normalize_skips_closed_and_unknown() {
        let closed = json!({
            "question": {"id": 1, "title": "t", "type": "binary", "status": "resolved"}
        });
        assert!(normalize_question(&closed).is_none());

        let unknown = json!({
            "question": {"id": 2, "title": "t", "type": "conditional"}
        });
        assert!(normalize_question(&unknown).is_none());
    }
}
