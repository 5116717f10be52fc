//! doxa CLI - Monte-Carlo forecasting for tournament questions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doxa::{Config, ForecastPipeline, MetaculusClient, OpenRouterClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "doxa")]
#[command(author = "Infernet <dev@infernet.org>")]
#[command(version)]
#[command(about = "Monte-Carlo forecast aggregation and idempotent tournament submission")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast open tournament questions and submit
    Run {
        /// Re-forecast questions already recorded in the posted-id ledger
        #[arg(long)]
        force: bool,

        /// Aggregate and validate only, do not submit
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# doxa configuration file

[openrouter]
# API key (can also use OPENROUTER_API_KEY env var)
# api_key = "sk-..."
base_url = "https://openrouter.ai/api/v1"
timeout_secs = 90
max_retries = 4

[metaculus]
# Token (can also use METACULUS_TOKEN env var)
# token = "..."
base_url = "https://www.metaculus.com/api"
tournament = "fall-aib-2025"

[worlds]
n_worlds = 30
pool_size = 8
models = [
    { id = "openai/gpt-4o-mini", weight = 2, input_price_per_1m = 0.15, output_price_per_1m = 0.60 },
    { id = "google/gemini-1.5-flash", weight = 1, input_price_per_1m = 0.075, output_price_per_1m = 0.30 },
]

[run]
ledger_path = "posted.json"
# force = false
# submit = true
"#;
    println!("{example}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            config
                .resolve_openrouter_key()
                .context("Failed to resolve OpenRouter API key")?;
            config
                .resolve_metaculus_token()
                .context("Failed to resolve Metaculus token")?;
            config.validate_models().context("Invalid sampling config")?;

            info!("Configuration is valid");
            info!(
                "  Worlds: {} per question, {} concurrent, {} models",
                config.worlds.n_worlds,
                config.worlds.pool_size,
                config.worlds.models.len()
            );
            info!("  Tournament: {}", config.metaculus.tournament);
            info!("  Ledger: {}", config.run.ledger_path.display());
            return Ok(());
        }

        Commands::Run { force, dry_run } => {
            let mut config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            config.validate_models().context("Invalid sampling config")?;

            if dry_run {
                config.run.submit = false;
            }
            let force = force || config.run.force;

            let api_key = config
                .resolve_openrouter_key()
                .context("Failed to resolve OpenRouter API key")?;
            let token = config
                .resolve_metaculus_token()
                .context("Failed to resolve Metaculus token")?;

            let client = Arc::new(OpenRouterClient::new(
                api_key,
                config.openrouter.base_url.clone(),
                config.openrouter.timeout_secs,
                config.openrouter.max_retries,
            )?);

            let metaculus = MetaculusClient::new(
                token,
                config.metaculus.base_url.clone(),
                config.metaculus.timeout_secs,
            )?;

            let mut pipeline = ForecastPipeline::new(config, client, metaculus)
                .context("Failed to initialize pipeline")?;

            let questions = pipeline
                .fetch_questions()
                .await
                .context("Failed to fetch open questions")?;

            let stats = pipeline.run(questions, force).await?;

            println!("\n=== Forecasting Run Complete ===");
            println!("Questions:      {}", stats.total_questions);
            println!("Already posted: {}", stats.already_posted);
            println!("Posted:         {}", stats.posted);
            println!("Insufficient:   {}", stats.insufficient);
            println!("Invalid:        {}", stats.invalid);
            println!("Submit failed:  {}", stats.submit_failed);
            println!(
                "Worlds:         {}/{} usable ({:.0}%)",
                stats.worlds_sampled,
                stats.worlds_attempted,
                stats.sample_yield * 100.0
            );
            println!("Sampling cost:  ${:.4}", stats.sampling_cost_usd);
            println!("Runtime:        {:.1}s", stats.runtime_secs);
        }
    }

    Ok(())
}
