//! Error types for doxa.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (insufficient samples, invalid payload)
//! - I^B materialized: Infrastructure failures (network, timeout)
//! - K_i violated: Internal invariant violations (bugs, untrusted ledger)

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for doxa.
#[derive(Debug, Error)]
pub enum DoxaError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Belief proven wrong (expected failures)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    /// No usable world samples for a question. The question is skipped;
    /// the run continues.
    #[error("Insufficient samples for question {question_id}")]
    InsufficientSamples { question_id: u64 },

    /// Payload failed the pre-submission contract check. Deterministic for
    /// the same input, so the caller must not retry.
    #[error("Invalid payload for question {question_id}: {violation}")]
    PayloadInvalid {
        question_id: u64,
        violation: PayloadViolation,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    #[error("Metaculus API error: {0}")]
    MetaculusApi(#[from] MetaculusError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Invariant broken (fatal, manual intervention)
    // ═══════════════════════════════════════════════════════════════════

    /// The posted-id store exists but cannot be parsed. Proceeding would
    /// risk duplicate submissions, so the run must stop.
    #[error("Posted-id ledger at {path} is corrupt: {reason}")]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specific payload contract rule broken, with the offending value.
///
/// K_i: Every variant names exactly one rule of the external platform's
/// wire contract.
#[derive(Debug, Error)]
pub enum PayloadViolation {
    #[error("binary probability {value} outside [0.01, 0.99]")]
    ProbabilityOutOfRange { value: f64 },

    #[error("binary probability is not finite: {value}")]
    ProbabilityNotFinite { value: f64 },

    #[error("option probability for '{option}' is {value}, outside [0, 1]")]
    OptionProbabilityOutOfRange { option: String, value: f64 },

    #[error("option probabilities sum to {sum}, not 1.0 within 1e-6")]
    ProbabilitySumNotOne { sum: f64 },

    #[error("option set mismatch: expected {expected:?}, got {got:?}")]
    OptionSetMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("CDF has {len} points, expected 201")]
    CdfWrongLength { len: usize },

    #[error("CDF value {value} at index {index} outside [0, 1]")]
    CdfValueOutOfRange { index: usize, value: f64 },

    #[error("CDF decreases at index {index}: {prev} -> {value}")]
    CdfNotMonotonic { index: usize, prev: f64, value: f64 },

    #[error("CDF first value {value} violates {rule} lower bound rule")]
    CdfLowerBoundViolation { value: f64, rule: &'static str },

    #[error("CDF last value {value} violates {rule} upper bound rule")]
    CdfUpperBoundViolation { value: f64, rule: &'static str },

    #[error("forecast type {forecast} does not match question type {question}")]
    TypeMismatch {
        forecast: &'static str,
        question: &'static str,
    },
}

/// Metaculus API specific errors.
#[derive(Debug, Error)]
pub enum MetaculusError {
    #[error("Authentication failed: invalid or missing token")]
    AuthenticationFailed,

    #[error("Question not found: {0}")]
    QuestionNotFound(u64),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Submission rejected for question {question_id}: {message}")]
    SubmissionRejected { question_id: u64, message: String },
}

impl DoxaError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Check if this error is retryable at the transport layer.
    ///
    /// K_i: Core errors (InsufficientSamples, PayloadInvalid, LedgerCorrupt)
    /// are deterministic and never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Network(_)
        )
    }

    /// True for per-question errors that skip the question and let the run
    /// continue.
    pub fn is_question_scoped(&self) -> bool {
        matches!(
            self,
            Self::InsufficientSamples { .. } | Self::PayloadInvalid { .. }
        )
    }
}

/// Result type alias for doxa.
pub type Result<T> = std::result::Result<T, DoxaError>;
