//! bizreg CLI - Business registry entity resolution
//!
//! Exposes the model-table lookup, JSON extraction and the two gates from the
//! command line. Full searches need a browser environment and are driven from
//! library code.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use bizreg_agent::{supported_models, AgentProvider};
use bizreg_core::Config;
use bizreg_entity_search::{
    ClassificationGate, JsonExtractor, LanguageModel, OpenAiLanguageModel, ValidationGate,
};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const REDACTED: &str = "[REDACTED]";

#[derive(Parser, Debug)]
#[command(name = "bizreg")]
#[command(about = "Resolve businesses to their state registry records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the agent type serving a model
    Provider {
        /// Model name; lists supported models when omitted
        model: Option<String>,
    },
    /// Extract a JSON object from model output
    ExtractJson {
        /// Input file (stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Classify a principal name of a registry record
    Classify {
        /// Registered principal name
        #[arg(long)]
        name: String,
        /// Entity information of the record, as JSON
        #[arg(long)]
        entity_data: String,
        /// Registry state (defaults to search.state)
        #[arg(long)]
        state: Option<String>,
    },
    /// Check that a registry record matches a business
    Validate {
        /// Registry record, as JSON
        #[arg(long)]
        registration: String,
        /// Business description, as JSON
        #[arg(long)]
        business: String,
        /// Registry state (defaults to search.state)
        #[arg(long)]
        state: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    debug!("Loaded configuration: {config:?}");

    match cli.command {
        Commands::Provider { model } => show_provider(model.as_deref()),
        Commands::ExtractJson { file } => extract_json(&config, file.as_deref()).await,
        Commands::Classify {
            name,
            entity_data,
            state,
        } => {
            let state = state.unwrap_or_else(|| config.search.state.clone());
            classify(&config, &state, &entity_data, &name).await
        }
        Commands::Validate {
            registration,
            business,
            state,
        } => {
            let state = state.unwrap_or_else(|| config.search.state.clone());
            validate(&config, &state, &registration, &business).await
        }
        Commands::Config => {
            print!("{}", redacted_toml(&config)?);
            Ok(())
        }
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "bizreg={level},bizreg_core={level},bizreg_agent={level},bizreg_entity_search={level}"
        ))
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn show_provider(model: Option<&str>) -> Result<()> {
    match model {
        Some(model) => {
            let agent_type = AgentProvider::agent_type(model)?;
            println!("{agent_type}");
        }
        None => {
            for model in supported_models() {
                let agent_type = AgentProvider::agent_type(model)?;
                println!("{model}\t{agent_type}");
            }
        }
    }
    Ok(())
}

fn language_model(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    let timeout = Duration::from_secs(config.agent.request_timeout_secs);
    let model = OpenAiLanguageModel::from_config(&config.models, timeout)
        .context("Failed to create language model client")?;
    Ok(Arc::new(model))
}

fn extractor(config: &Config, model: Arc<dyn LanguageModel>) -> JsonExtractor {
    JsonExtractor::new(model, &config.models.extraction_model)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

async fn extract_json(config: &Config, file: Option<&Path>) -> Result<()> {
    let text = read_input(file)?;
    let model = language_model(config)?;

    match extractor(config, model).extract(text.trim_end()).await? {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("null"),
    }
    Ok(())
}

async fn classify(config: &Config, state: &str, entity_data: &str, name: &str) -> Result<()> {
    let model = language_model(config)?;
    let gate = ClassificationGate::new(
        model.clone(),
        extractor(config, model),
        &config.models.classification_model,
        config.models.temperature,
    );

    let classification = gate.classify(state, entity_data, name).await?;
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

async fn validate(config: &Config, state: &str, registration: &str, business: &str) -> Result<()> {
    let model = language_model(config)?;
    let gate = ValidationGate::new(
        model.clone(),
        extractor(config, model),
        &config.models.validation_model,
        config.models.temperature,
    );

    let outcome = gate.validate(state, registration, business).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn redacted_toml(config: &Config) -> Result<String> {
    let mut config = config.clone();
    if config.agent.api_key.is_some() {
        config.agent.api_key = Some(REDACTED.to_string());
    }
    if config.models.openai_api_key.is_some() {
        config.models.openai_api_key = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&config).context("Failed to serialize configuration")
}
