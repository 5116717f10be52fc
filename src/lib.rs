//! doxa - Monte-Carlo forecast aggregation and idempotent tournament submission.
//!
//! ## Architecture
//!
//! doxa forecasts by sampling worlds:
//! - **World Pool**: Draws N independent "world" samples per question from
//!   OpenRouter models
//! - **Forecast core**: Aggregates samples into one canonical forecast per
//!   question type, sanitizes numeric CDFs to the 201-point wire contract,
//!   and validates payloads before any network call
//! - **Posted-Id Ledger**: Crash-safe record of submitted question ids, so
//!   re-runs never double-post
//!
//! ## Data flow
//!
//! Questions → World Pool → Samples → Aggregate → (numeric) Sanitize →
//! Validate → Submit → Ledger
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters
//! - I^B (Bounded): Network/API uncertainties (retry, backoff at the
//!   transport layer only; core errors are deterministic and never retried)

pub mod client;
pub mod forecast;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod pool;

// Re-exports for convenience
pub use client::{MetaculusClient, OpenRouterClient};
pub use forecast::{aggregate, sanitize_numeric_cdf, validate};
pub use ledger::PostedLedger;
pub use models::{
    AggregateForecast, Config, DoxaError, QuestionSpec, QuestionType, Result, RunStats,
    SubmissionPayload, WorldSample,
};
pub use pipeline::ForecastPipeline;
pub use pool::WorldPool;
