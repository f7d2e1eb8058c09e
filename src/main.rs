//! qe-prefs CLI - score translation pairs and build preference datasets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qe_prefs::models::{Config, TiePolicy};
use qe_prefs::oracle::{HealthStatus, OracleRegistry, ScoringOracle};
use qe_prefs::{PreferenceBuilder, ScoringPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "qe-prefs")]
#[command(version)]
#[command(about = "Quality-estimation scoring and preference-pair construction for translation data")]
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
    /// Score raw bilingual records with the quality-estimation oracle
    Score {
        /// Path to input records JSONL file
        #[arg(short, long)]
        input: PathBuf,

        /// Path to scored-task JSONL file (appended to)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tasks per oracle call
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Model identifier (overrides oracle.model)
        #[arg(long)]
        model: Option<String>,

        /// Skip tasks already present in the output file
        #[arg(long)]
        resume: bool,
    },

    /// Build preference pairs from a scored-task file
    Pairs {
        /// Path to scored-task JSONL file
        input: PathBuf,

        /// Path to preference-pair JSONL file (overwritten)
        output: PathBuf,

        /// System instruction for every pair (overrides pairs.system_prompt)
        #[arg(long)]
        system_prompt: Option<String>,

        /// How exact score ties are resolved (overrides pairs.tie_policy)
        #[arg(long, value_enum)]
        tie_policy: Option<TiePolicy>,
    },

    /// Validate configuration file
    Validate {
        /// Also check that the scoring service answers
        #[arg(long)]
        ping: bool,
    },

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
    let example = r#"# qe-prefs configuration file

[oracle]
base_url = "http://localhost:8000"
model = "Unbabel/wmt23-cometkiwi-da-xxl"
# API key (can also use QE_API_KEY env var, or ${VAR} expansion here)
# api_key = "${QE_API_KEY}"
timeout_secs = 900

[scoring]
batch_size = 32
output = "translated_gaois_graded.jsonl"

[pairs]
system_prompt = "You are an AI assistant. You will be given a sentence to translate:"
tie_policy = "prefer_reference"  # or "rank_order"
"#;
    println!("{example}");
}

/// Load the config file, falling back to defaults when it is optional and absent.
fn load_config(path: &Path, required: bool) -> Result<Config> {
    if !required && !path.exists() {
        info!(path = ?path, "No config file, using defaults");
        return Ok(Config::default());
    }
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate { ping } => {
            let config = load_config(&cli.config, true)?;

            info!("Configuration is valid");
            info!("  Oracle:     {} ({})", config.oracle.base_url, config.oracle.model);
            info!("  Batch size: {}", config.scoring.batch_size);
            info!("  Tie policy: {:?}", config.pairs.tie_policy);
            if config.resolve_api_key().is_none() {
                info!("  No API key configured; requests will be unauthenticated");
            }

            if ping {
                let registry = OracleRegistry::new(config.oracle.clone(), config.resolve_api_key());
                let client = registry
                    .default_client()
                    .context("Failed to create scoring client")?;
                let health = client.health_check().await;
                match health.status {
                    HealthStatus::Healthy => info!(
                        latency_ms = health.latency_ms.unwrap_or_default(),
                        "Scoring service healthy"
                    ),
                    status => {
                        warn!(
                            error = health.error.as_deref().unwrap_or("unknown"),
                            "Scoring service {status}"
                        );
                        anyhow::bail!("Scoring service is {status}");
                    }
                }
            }
        }

        Commands::Score {
            input,
            output,
            batch_size,
            model,
            resume,
        } => {
            let mut config = load_config(&cli.config, false)?;

            // CLI overrides
            if let Some(batch_size) = batch_size {
                config.scoring.batch_size = batch_size;
            }
            if let Some(output) = output {
                config.scoring.output = output;
            }
            if let Some(model) = model {
                config.oracle.model = model;
            }
            config.validate().context("Invalid configuration")?;

            let registry = OracleRegistry::new(config.oracle.clone(), config.resolve_api_key());
            let oracle: Arc<dyn ScoringOracle> = registry
                .default_client()
                .context("Failed to create scoring client")?;

            let pipeline = ScoringPipeline::new(oracle, config.scoring.batch_size);
            let stats = pipeline
                .run(&input, &config.scoring.output, resume)
                .await
                .context("Scoring run aborted")?;

            println!("\n=== Scoring Complete ===");
            println!("Run:          {}", stats.run_id);
            println!("Started:      {}", stats.started_at.to_rfc3339());
            println!("Records:      {}", stats.total_records);
            println!("Malformed:    {}", stats.malformed_lines);
            println!("Dropped:      {}", stats.dropped_records);
            println!("Tasks:        {}", stats.total_tasks);
            if resume {
                println!("Already done: {}", stats.already_scored);
            }
            println!("Scored:       {}", stats.scored_tasks);
            println!(
                "Skipped:      {} tasks in {} batches",
                stats.skipped_tasks(),
                stats.skipped_batches.len()
            );
            println!("Throughput:   {:.0}/hr", stats.throughput_per_hour);
            println!("Runtime:      {:.1}s", stats.runtime_secs);
            println!("Output:       {:?}", config.scoring.output);
        }

        Commands::Pairs {
            input,
            output,
            system_prompt,
            tie_policy,
        } => {
            let mut config = load_config(&cli.config, false)?;

            // CLI overrides
            if let Some(system_prompt) = system_prompt {
                config.pairs.system_prompt = system_prompt;
            }
            if let Some(tie_policy) = tie_policy {
                config.pairs.tie_policy = tie_policy;
            }

            let builder = PreferenceBuilder::from_config(&config.pairs);
            let stats = builder
                .run(&input, &output)
                .with_context(|| format!("Failed to build pairs from {input:?}"))?;

            println!("\n=== Preference Pairs Complete ===");
            println!("Scored tasks: {}", stats.input_tasks);
            println!("Malformed:    {}", stats.malformed_lines);
            println!("Groups:       {}", stats.groups);
            println!("Pairs:        {}", stats.pairs);
            println!("Degenerate:   {}", stats.degenerate_groups);
            println!("Tie swaps:    {}", stats.tie_swaps);
            println!("Output:       {output:?}");
        }
    }

    Ok(())
}
