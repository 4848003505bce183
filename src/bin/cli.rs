//! pagewatch CLI
//!
//! Runs the watch loop against a JSON subscription file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use pagewatch::{
    error::{AppError, Result},
    models::Config,
    pipeline::{CycleSettings, Scheduler, WatchCycleEngine},
    services::{ContentExtractor, HttpFetcher, LogNotifier, Notifier, WebhookNotifier},
    storage::{JsonFileRepository, SubscriptionRepository},
    utils::http,
};

/// pagewatch - web page change notifier
#[derive(Parser, Debug)]
#[command(name = "pagewatch", version, about = "Watches web pages and alerts on change")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "pagewatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch subscriptions until interrupted
    Run,

    /// Run a single cycle and exit
    Once,

    /// Validate configuration and the subscription file
    Validate,

    /// List subscriptions and their failure counters
    List,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    match &config.notifier.webhook_url {
        Some(url) => {
            let client = http::create_async_client(&config.http)?;
            let mut notifier = WebhookNotifier::new(client, url.clone());
            if let Some(operator_url) = &config.notifier.operator_webhook_url {
                notifier = notifier.with_operator_url(operator_url.clone());
            }
            Ok(Arc::new(notifier))
        }
        None => {
            log::info!("No webhook configured; alerts will be logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn build_engine(config: &Config, repository: Arc<JsonFileRepository>) -> Result<WatchCycleEngine> {
    let fetcher = Arc::new(HttpFetcher::from_config(&config.http)?);
    let notifier = build_notifier(config)?;
    Ok(WatchCycleEngine::new(repository, fetcher, notifier)
        .with_extractor(ContentExtractor::new(&config.extract))
        .with_settings(CycleSettings::from_config(config)))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    let repository = Arc::new(JsonFileRepository::new(&config.store.subscriptions_path));

    match cli.command {
        Command::Run => {
            config.validate()?;
            let engine = build_engine(&config, repository)?;
            let shutdown = CancellationToken::new();

            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        log::info!("Received Ctrl-C, finishing current cycle");
                        signal_token.cancel();
                    }
                    Err(e) => log::error!("Ctrl-C handler failed: {}", e),
                }
            });

            let completed = Scheduler::new(engine, config.watcher.interval())
                .run(shutdown)
                .await?;
            log::info!("Watcher stopped after {} cycles", completed);
        }

        Command::Once => {
            config.validate()?;
            let mut engine = build_engine(&config, repository)?;
            let result = engine.run_cycle().await?;
            log::info!(
                "{} subscriptions observed for the first time, {} failing, {} evicted",
                result.baselined.len(),
                result.errored.len(),
                result.evicted.len()
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let subscriptions = repository.load().await?;
            let inactive = subscriptions.iter().filter(|s| !s.is_actionable()).count();
            if inactive > 0 {
                log::warn!("{} subscriptions have no email or phone number", inactive);
            }
            if subscriptions.iter().any(|s| s.url.trim().is_empty()) {
                return Err(AppError::validation("subscription with empty url"));
            }
            log::info!(
                "✓ {} subscriptions in {}",
                subscriptions.len(),
                repository.path().display()
            );
        }

        Command::List => {
            let subscriptions = repository.load().await?;
            for s in &subscriptions {
                let selector = if s.selector.is_empty() {
                    "<document>"
                } else {
                    s.selector.as_str()
                };
                println!(
                    "{}  {}  {}  errors={}  → {}",
                    s.id,
                    s.url,
                    selector,
                    s.consecutive_errors,
                    s.destination()
                );
            }
            log::info!("{} subscriptions", subscriptions.len());
        }
    }

    Ok(())
}
