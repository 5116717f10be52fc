//! World sampler pool.
//!
//! Epistemic foundation:
//! - K_i: One world = one independent model call; draws are exchangeable
//! - K_i: Fan-out is bounded; draws complete in arbitrary order
//! - B_i: Each draw may fail or return garbage → dropped at this boundary,
//!   never retried here

use crate::client::OpenRouterClient;
use crate::models::{DoxaError, ModelSpec, QuestionSpec, QuestionType, Result, WorldDraw, WorldReply};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

const WORLD_SYSTEM_PROMPT: &str =
    "Reply with a single valid JSON object. No preface, no code fences.";

/// Pool of world samplers with bounded concurrency.
pub struct WorldPool {
    /// OpenRouter client (shared)
    client: Arc<OpenRouterClient>,
    /// Available models with weights
    models: Vec<ModelSpec>,
    /// Independent draws per question
    n_worlds: usize,
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
    /// Round-robin model index
    model_index: AtomicUsize,
    /// Total weights for weighted selection
    total_weight: u32,
}

impl WorldPool {
    pub fn new(
        client: Arc<OpenRouterClient>,
        models: Vec<ModelSpec>,
        n_worlds: usize,
        pool_size: usize,
    ) -> Self {
        let total_weight: u32 = models.iter().map(|m| m.weight).sum();
        Self {
            client,
            models,
            n_worlds,
            semaphore: Arc::new(Semaphore::new(pool_size.max(1))),
            model_index: AtomicUsize::new(0),
            total_weight: total_weight.max(1),
        }
    }

    /// Select a model using weighted round-robin.
    fn select_model(&self) -> &ModelSpec {
        if self.models.len() == 1 {
            return &self.models[0];
        }

        let idx = self.model_index.fetch_add(1, Ordering::Relaxed);
        let target = (idx as u32) % self.total_weight;
        let mut cumulative = 0u32;

        for model in &self.models {
            cumulative += model.weight;
            if target < cumulative {
                return model;
            }
        }

        &self.models[0]
    }

    /// Draw all worlds for one question.
    ///
    /// Returns the usable draws plus the number attempted. Failed or
    /// unparseable worlds are logged and absent from the result; the
    /// aggregation set is simply smaller.
    pub async fn draw_worlds(
        self: &Arc<Self>,
        spec: &QuestionSpec,
        facts: &[String],
    ) -> (Vec<WorldDraw>, usize) {
        let prompt = build_world_prompt(spec, facts);
        let mut handles = Vec::with_capacity(self.n_worlds);

        for _ in 0..self.n_worlds {
            let pool = Arc::clone(self);
            let spec = spec.clone();
            let prompt = prompt.clone();
            handles.push(tokio::spawn(
                async move { pool.draw_one(&spec, &prompt).await },
            ));
        }

        let mut draws = Vec::with_capacity(self.n_worlds);
        for handle in handles {
            match handle.await {
                Ok(Ok(draw)) => draws.push(draw),
                Ok(Err(e)) => {
                    warn!(question_id = spec.id, error = %e, "World draw dropped");
                }
                Err(e) => {
                    warn!(question_id = spec.id, error = %e, "World task panicked");
                }
            }
        }

        (draws, self.n_worlds)
    }

    /// Draw a single world.
    ///
    /// B_i(draw succeeds and parses) → Result<WorldDraw>
    async fn draw_one(&self, spec: &QuestionSpec, prompt: &str) -> Result<WorldDraw> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DoxaError::Internal("Semaphore closed".to_string()))?;

        let model = self.select_model();
        let start = Instant::now();

        let response = self
            .client
            .complete_with_system(model, WORLD_SYSTEM_PROMPT, prompt)
            .await?;

        let reply = parse_world_reply(&response.content)?;
        let sample = reply.into_sample(spec).ok_or_else(|| {
            DoxaError::ParseError(format!(
                "world reply does not match {} question",
                spec.question_type.as_str()
            ))
        })?;

        Ok(WorldDraw {
            id: Uuid::new_v4().to_string(),
            question_id: spec.id,
            sample,
            model: response.model,
            drawn_at: Utc::now(),
            draw_time_ms: start.elapsed().as_millis() as u64,
            cost_usd: response.cost_usd,
        })
    }
}

/// Build the world prompt for one question.
///
/// The model samples ONE plausible future world consistent with the facts
/// and reports only the outcome fields for this question's type.
fn build_world_prompt(spec: &QuestionSpec, facts: &[String]) -> String {
    let fact_lines = if facts.is_empty() {
        "- (no recent facts)".to_string()
    } else {
        facts
            .iter()
            .take(10)
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let outcome_schema = match spec.question_type {
        QuestionType::Binary => r#""yes": true/false"#.to_string(),
        QuestionType::MultipleChoice => {
            let hints = spec
                .sanitized_options()
                .iter()
                .map(|o| format!("    {:?}: <relative likelihood score>", o))
                .collect::<Vec<_>>()
                .join(",\n");
            format!("\"scores\": {{\n{hints}\n  }}")
        }
        QuestionType::Numeric => {
            let unit = spec.unit.as_deref().unwrap_or("the question's units");
            format!(r#""value": <number, in {unit}>"#)
        }
    };

    format!(
        "You are sampling ONE plausible future world consistent with the facts below.\n\
         Return ONLY a JSON object matching the output schema exactly.\n\n\
         question:\n{title}\n\n\
         facts (dated, compact):\n{fact_lines}\n\n\
         output schema (strict):\n\
         {{\n  \"world_summary\": \"100-150 word narrative of the world dynamics\",\n  {outcome_schema}\n}}\n\
         - Keep the outcome coherent with the facts; if uncertain, be conservative.\n\
         - JSON only, no commentary.",
        title = spec.title,
    )
}

/// Extract and parse the JSON object in a model reply.
///
/// Tolerates prose around the object by slicing from the first '{' to the
/// last '}'.
fn parse_world_reply(content: &str) -> Result<WorldReply> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &content[s..=e],
        _ => content,
    };

    serde_json::from_str(json)
        .map_err(|e| DoxaError::ParseError(format!("world reply is not valid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorldSample;

    fn spec(question_type: QuestionType) -> QuestionSpec {
        QuestionSpec {
            id: 9,
            title: "Will X happen?".to_string(),
            question_type,
            options: vec!["A".to_string(), "B".to_string()],
            lower_bound_open: false,
            upper_bound_open: false,
            unit: None,
        }
    }

    #[test]
    fn test_parse_reply_with_surrounding_prose() {
        let content = "Here you go:\n{\"world_summary\": \"w\", \"yes\": true}\nDone.";
        let reply = parse_world_reply(content).unwrap();
        assert_eq!(reply.yes, Some(true));
    }

    #[test]
    fn test_parse_reply_rejects_garbage() {
        assert!(parse_world_reply("no json here").is_err());
    }

    #[test]
    fn test_reply_roundtrip_to_sample() {
        let content = r#"{"world_summary": "w", "scores": {"A": 3.0, "B": 1.0}}"#;
        let reply = parse_world_reply(content).unwrap();
        let sample = reply.into_sample(&spec(QuestionType::MultipleChoice)).unwrap();
        assert!(matches!(sample, WorldSample::Categorical { .. }));
    }

    #[test]
    fn test_prompt_mentions_options_for_multiple_choice() {
        let prompt = build_world_prompt(&spec(QuestionType::MultipleChoice), &[]);
        assert!(prompt.contains("\"A\""));
        assert!(prompt.contains("\"B\""));
        assert!(prompt.contains("world_summary"));
    }

    #[test]
    fn test_prompt_binary_schema() {
        let prompt = build_world_prompt(&spec(QuestionType::Binary), &[]);
        assert!(prompt.contains("\"yes\": true/false"));
    }
}
