//! Forecasting run pipeline.
//!
//! Pipeline flow:
//! Questions → World Pool → Samples → Aggregate → (numeric) Sanitize →
//! Validate → Submit → Ledger
//!
//! Questions are processed strictly sequentially: one question is fully
//! aggregated, validated, submitted, and recorded before the next begins,
//! so the persisted ledger always reads "fully processed so far".

use crate::client::{MetaculusClient, OpenRouterClient};
use crate::forecast::{aggregate, validate};
use crate::ledger::PostedLedger;
use crate::models::{Config, QuestionSpec, Result, RunStats, WorldSample};
use crate::pool::WorldPool;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Sequential forecasting pipeline.
pub struct ForecastPipeline {
    pool: Arc<WorldPool>,
    metaculus: MetaculusClient,
    ledger: PostedLedger,
    config: Config,
}

impl ForecastPipeline {
    /// Create a pipeline from configuration.
    ///
    /// Loads the posted-id ledger; a corrupt ledger is fatal here, before
    /// any sampling or submission is attempted.
    pub fn new(
        config: Config,
        client: Arc<OpenRouterClient>,
        metaculus: MetaculusClient,
    ) -> Result<Self> {
        let ledger = PostedLedger::load(&config.run.ledger_path)?;

        let pool = Arc::new(WorldPool::new(
            client,
            config.worlds.models.clone(),
            config.worlds.n_worlds,
            config.worlds.pool_size,
        ));

        Ok(Self {
            pool,
            metaculus,
            ledger,
            config,
        })
    }

    /// Fetch open questions for the configured tournament.
    pub async fn fetch_questions(&self) -> Result<Vec<QuestionSpec>> {
        self.metaculus
            .list_open_questions(&self.config.metaculus.tournament)
            .await
    }

    /// Run the pipeline over a set of questions.
    ///
    /// Per-question failures (insufficient samples, invalid payload,
    /// rejected submission) are counted and logged, never fatal. Ledger
    /// write failures are fatal: without a durable record the at-most-once
    /// guarantee is gone.
    pub async fn run(&mut self, questions: Vec<QuestionSpec>, force: bool) -> Result<RunStats> {
        let start = Instant::now();
        let total = questions.len();

        info!(
            total_questions = total,
            n_worlds = self.config.worlds.n_worlds,
            force = force,
            submit = self.config.run.submit,
            "Starting forecasting run"
        );

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut stats = RunStats {
            total_questions: total,
            ..Default::default()
        };

        for spec in questions {
            pb.set_message(format!("q{}", spec.id));

            if !force && self.ledger.contains(spec.id) {
                stats.already_posted += 1;
                pb.inc(1);
                continue;
            }

            if let Err(e) = self.process_question(&spec, &mut stats).await {
                if e.is_question_scoped() {
                    warn!(question_id = spec.id, error = %e, "Question skipped");
                } else {
                    pb.abandon();
                    return Err(e);
                }
            }

            pb.inc(1);
        }

        pb.finish_with_message("done");

        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();
        Ok(stats)
    }

    /// Process a single question end to end.
    async fn process_question(&mut self, spec: &QuestionSpec, stats: &mut RunStats) -> Result<()> {
        let (draws, attempted) = self.pool.draw_worlds(spec, &[]).await;

        stats.worlds_attempted += attempted;
        stats.worlds_sampled += draws.len();
        stats.sampling_cost_usd += draws.iter().map(|d| d.cost_usd).sum::<f64>();

        let samples: Vec<WorldSample> = draws.into_iter().map(|d| d.sample).collect();

        let forecast = match aggregate(&samples, spec) {
            Ok(f) => f,
            Err(e) => {
                stats.insufficient += 1;
                return Err(e);
            }
        };

        let payload = match validate(&forecast, spec) {
            Ok(p) => p,
            Err(e) => {
                stats.invalid += 1;
                return Err(e);
            }
        };

        if !self.config.run.submit {
            info!(
                question_id = spec.id,
                kind = forecast.kind(),
                "Dry run: payload validated, not submitted"
            );
            return Ok(());
        }

        match self.metaculus.submit(spec.id, &payload).await {
            Ok(()) => {
                // Record immediately after confirmed success, before the
                // next question starts.
                self.ledger.record(spec.id)?;
                stats.posted += 1;
                info!(question_id = spec.id, kind = forecast.kind(), "Forecast posted");
                Ok(())
            }
            Err(e) => {
                stats.submit_failed += 1;
                warn!(question_id = spec.id, error = %e, "Submission failed");
                Ok(())
            }
        }
    }

    /// Ledger view, for reporting.
    pub fn ledger(&self) -> &PostedLedger {
        &self.ledger
    }
}
