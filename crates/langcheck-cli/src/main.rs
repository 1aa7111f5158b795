//! LangCheck CLI
//!
//! Inspect, validate and change the models LangCheck uses for each metric.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use langcheck_core::{Language, Metric};
use langcheck_models::config::read_entries;
use langcheck_models::{
    validate_config, CandleModelLoader, DefaultModelManager, HubClient, HuggingFaceHub,
    MetricConfig, ModelSetting, ValidationScope, CACHE_HITS_COUNTER, CONFIG_ROLLBACKS_COUNTER,
    MODEL_LOADS_COUNTER,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "langcheck")]
#[command(about = "Manage the models behind LangCheck metrics", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the models in use as a markdown table
    List {
        /// Model configuration file (bundled defaults when omitted)
        #[arg(short, long, env = "LANGCHECK_MODEL_CONFIG")]
        config: Option<PathBuf>,

        /// Only show this language
        #[arg(short, long)]
        language: Option<Language>,

        /// Only show this metric
        #[arg(short, long)]
        metric: Option<String>,
    },

    /// Check every entry of a configuration file against the model hub
    Validate {
        /// Model configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Change the model used for a metric
    ///
    /// With `--config`, the file is updated in place when the change is valid.
    Set {
        #[arg(short, long)]
        language: Language,

        #[arg(short, long)]
        metric: String,

        /// Model name on the hub
        #[arg(long)]
        model: String,

        /// Loader function, e.g. load_auto_model_for_text_classification
        #[arg(long)]
        loader: String,

        #[arg(long)]
        tokenizer: Option<String>,

        /// Pinned model revision
        #[arg(long)]
        revision: Option<String>,

        #[arg(short, long, env = "LANGCHECK_MODEL_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Download and load the model for a metric
    Fetch {
        #[arg(short, long)]
        language: Language,

        #[arg(short, long)]
        metric: String,

        #[arg(short, long, env = "LANGCHECK_MODEL_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    describe_metrics();

    match cli.command {
        Command::List {
            config,
            language,
            metric,
        } => {
            let manager = build_manager(config.as_deref())?;
            let metric = parse_metric(language, metric.as_deref())?;
            println!("{}", manager.list_current_model_in_use(language, metric));
        }
        Command::Validate { config } => {
            let count = validate_file(&config, &HuggingFaceHub::from_env()?)?;
            println!("{}: {} model settings are valid", config.display(), count);
        }
        Command::Set {
            language,
            metric,
            model,
            loader,
            tokenizer,
            revision,
            config,
        } => {
            let metric = Metric::parse_for(language, &metric)?;
            let mut manager = build_manager(config.as_deref())?;

            let mut setting = ModelSetting::new(model, loader);
            if let Some(tokenizer) = tokenizer {
                setting = setting.with_tokenizer(tokenizer);
            }
            if let Some(revision) = revision {
                setting = setting.with_revision(revision);
            }
            manager.set_model_for_metric(language, metric, setting)?;

            if let Some(path) = config {
                std::fs::write(&path, manager.config().to_yaml()?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Updated {}", path.display());
            }
            println!("{}", manager.list_current_model_in_use(Some(language), Some(metric)));
        }
        Command::Fetch {
            language,
            metric,
            config,
        } => {
            let metric = Metric::parse_for(language, &metric)?;
            let mut manager = build_manager(config.as_deref())?;
            let model = manager.fetch_model(language, metric)?;
            println!("Loaded {} via {}", model.name(), model.loader());
        }
    }

    Ok(())
}

/// Manager over the given configuration file, or over the bundled defaults
fn build_manager(config: Option<&Path>) -> Result<DefaultModelManager> {
    let hub = HuggingFaceHub::from_env()?;
    let loader = CandleModelLoader::new();

    let manager = match config {
        Some(path) => {
            let mut manager = DefaultModelManager::new(hub, loader);
            manager
                .load_config_file(path)
                .with_context(|| format!("Invalid model configuration {}", path.display()))?;
            manager
        }
        None => DefaultModelManager::with_default_config(hub, loader)?,
    };
    Ok(manager)
}

/// Check every entry of a configuration file once, returning the entry count
fn validate_file<H: HubClient>(path: &Path, hub: &H) -> Result<usize> {
    let mut config = MetricConfig::new();
    for (language, metric, setting) in read_entries(path)? {
        config.insert(language, metric, setting);
    }

    validate_config(&config, hub, ValidationScope::all())
        .with_context(|| format!("Invalid model configuration {}", path.display()))?;
    Ok(config.len())
}

fn parse_metric(language: Option<Language>, metric: Option<&str>) -> Result<Option<Metric>> {
    let Some(metric) = metric else {
        return Ok(None);
    };
    let metric = match language {
        Some(language) => Metric::parse_for(language, metric)?,
        None => metric.parse()?,
    };
    Ok(Some(metric))
}

/// Register descriptions for the counters the model manager records
fn describe_metrics() {
    metrics::describe_counter!(
        CACHE_HITS_COUNTER,
        "Model fetches served from the cache by language and metric"
    );
    metrics::describe_counter!(
        MODEL_LOADS_COUNTER,
        "Models loaded from the hub by language and metric"
    );
    metrics::describe_counter!(
        CONFIG_ROLLBACKS_COUNTER,
        "Configuration changes rolled back after failed validation"
    );
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("langcheck=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("langcheck=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
