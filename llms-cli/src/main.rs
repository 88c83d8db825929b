//! llms CLI - query LLM vendors from the command line
//!
//! A thin front end over the `llms` crate: run one prompt against one or
//! more models, list the known models and prices, count tokens, and manage
//! the config file.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

mod config;
mod error;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use futures::future::join_all;
use llms::prelude::*;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, config_path, load_config_from, save_config_to};
use crate::error::{CliError, Result};

/// llms - one client surface over many LLM vendor APIs
#[derive(Parser)]
#[command(name = "llms")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "LLMS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a prompt against one or more models
    Complete(CompleteArgs),

    /// List known models and their prices
    Models(ModelsArgs),

    /// Count tokens with the reference tokenizer
    Tokens(TokensArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the complete command
#[derive(Args)]
struct CompleteArgs {
    /// The prompt
    prompt: String,

    /// Model to use, as "model" or "provider/model" (repeatable)
    #[arg(short, long)]
    model: Vec<String>,

    /// System message
    #[arg(short, long)]
    system: Option<String>,

    /// Sampling temperature
    #[arg(short, long, default_value_t = 0.0)]
    temperature: f64,

    /// Maximum tokens to generate
    #[arg(long, default_value_t = CompletionRequest::DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Print fragments as they arrive
    #[arg(long, conflicts_with = "json")]
    stream: bool,

    /// Print full results as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the models command
#[derive(Args)]
struct ModelsArgs {
    /// Only list this provider's models
    #[arg(short, long)]
    provider: Option<String>,
}

/// Arguments for the tokens command
#[derive(Args)]
struct TokensArgs {
    /// Text to count; read from stdin when omitted
    text: Option<String>,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (API keys masked)
    Show,
    /// Show configuration file path
    Path,
    /// Write a configuration template
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("llms_cli={level},llms={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.unwrap_or_else(config_path);
    match cli.command {
        Commands::Complete(args) => cmd_complete(args, &path).await,
        Commands::Models(args) => cmd_models(&args),
        Commands::Tokens(args) => cmd_tokens(args),
        Commands::Config(args) => cmd_config(args, &path).await,
    }
}

/// Builds the provider serving `model`, configured from file and environment.
fn build_provider(config: &CliConfig, model: &str) -> Result<Arc<dyn Provider>> {
    let resolved = Registry::builtin().resolve(model)?;
    let settings = config
        .provider(resolved.entry.name, resolved.entry.env_prefix)
        .with_model(resolved.model);
    Ok((resolved.entry.build)(settings)?)
}

async fn cmd_complete(args: CompleteArgs, path: &Path) -> Result<()> {
    let config = load_config_from(path).await?;
    let models = if args.model.is_empty() {
        vec![config.default_model.clone()]
    } else {
        args.model
    };
    let providers = models
        .iter()
        .map(|model| build_provider(&config, model))
        .collect::<Result<Vec<_>>>()?;

    let mut request = CompletionRequest::new(args.prompt)
        .temperature(args.temperature)
        .max_tokens(args.max_tokens);
    if let Some(system) = args.system {
        request = request.system(system);
    }

    if args.stream {
        for provider in &providers {
            if providers.len() > 1 {
                println!("[{}/{}]", provider.name(), provider.model());
            }
            stream_completion(provider.as_ref(), &request).await?;
        }
        return Ok(());
    }

    let results = join_all(providers.iter().map(|p| p.acomplete(&request))).await;

    if args.json {
        let (report, failed) = json_report(&providers, results)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return completion_status(failed, providers.len());
    }

    let mut failed = 0;
    for (provider, result) in providers.iter().zip(results) {
        match result {
            Ok(result) => print_result(&result),
            Err(e) if providers.len() == 1 => return Err(e.into()),
            Err(e) => {
                failed += 1;
                println!("[{}/{}] error: {e}\n", provider.name(), provider.model());
            }
        }
    }
    completion_status(failed, providers.len())
}

fn completion_status(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        return Err(CliError::usage(format!("{failed} of {total} completions failed")));
    }
    Ok(())
}

/// JSON output of a completion run and the number of failed calls.
///
/// A single model prints its result object and fails on error. Several
/// models print an array in which a failed call is an `{"error": ..}` entry.
fn json_report(
    providers: &[Arc<dyn Provider>],
    results: Vec<llms::Result<CompletionResult>>,
) -> Result<(serde_json::Value, usize)> {
    let mut results = results.into_iter();
    if providers.len() == 1 {
        if let Some(result) = results.next() {
            return Ok((serde_json::to_value(result?)?, 0));
        }
    }

    let mut failed = 0;
    let mut entries = Vec::with_capacity(providers.len());
    for (provider, result) in providers.iter().zip(results) {
        let entry = match result {
            Ok(result) => serde_json::to_value(&result)?,
            Err(e) => {
                failed += 1;
                serde_json::json!({
                    "provider": {"name": provider.name(), "model": provider.model()},
                    "error": e.to_string(),
                })
            }
        };
        entries.push(entry);
    }
    Ok((serde_json::Value::Array(entries), failed))
}

async fn stream_completion(provider: &dyn Provider, request: &CompletionRequest) -> Result<()> {
    let mut stream = provider.acomplete_stream(request).await?;
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        write!(stdout, "{}", fragment?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

fn print_result(result: &CompletionResult) {
    let meta = &result.meta;
    let cost = meta
        .cost
        .map_or_else(String::new, |cost| format!(", ${cost:.6}"));
    println!(
        "[{}] {:.2}s, {}+{} tokens{cost}",
        result.provider,
        meta.latency.as_secs_f64(),
        meta.tokens_prompt,
        meta.tokens_completion,
    );
    println!("{}\n", result.text);
}

fn cmd_models(args: &ModelsArgs) -> Result<()> {
    let registry = Registry::builtin();
    if let Some(name) = &args.provider {
        if registry.get(name).is_none() {
            return Err(llms::Error::UnknownProvider(name.clone()).into());
        }
    }

    println!(
        "{:<10} {:<42} {:>10} {:>12} {:>9}",
        "PROVIDER", "MODEL", "PROMPT", "COMPLETION", "CONTEXT"
    );
    for (provider, model, info) in registry.models() {
        if args.provider.as_deref().is_some_and(|p| p != provider) {
            continue;
        }
        println!(
            "{provider:<10} {model:<42} {:>10.2} {:>12.2} {:>9}",
            info.prompt, info.completion, info.token_limit
        );
    }
    println!("\nPrices in USD per 1M tokens.");
    Ok(())
}

fn cmd_tokens(args: TokensArgs) -> Result<()> {
    let text = match args.text {
        Some(text) => text,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    println!("{}", Tokenizer::reference()?.count_tokens(&text));
    Ok(())
}

async fn cmd_config(args: ConfigArgs, path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Show => {
            let mut config = load_config_from(path).await?;
            for settings in config.providers.values_mut() {
                if settings.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
                    settings.api_key = Some("***".to_owned());
                }
            }
            print!(
                "{}",
                toml::to_string_pretty(&config).map_err(crate::config::ConfigError::from)?
            );
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                println!("Configuration already exists at: {}", path.display());
                println!("Use --force to overwrite.");
                return Ok(());
            }
            save_config_to(&CliConfig::template(), path).await?;
            println!("Configuration created: {}", path.display());
            println!();
            println!("Next steps:");
            println!("  1. add API keys under [providers.<name>] or export REKA_API_KEY=<key>");
            println!("  2. llms complete \"Hello\" -m reka-core");
        }
    }
    Ok(())
}
