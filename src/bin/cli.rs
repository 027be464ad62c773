//! Listing watcher CLI
//!
//! Runs the polling service, one-off checks, and configuration checks.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listing_watcher::{
    error::{AppError, Result},
    models::{Config, Destination},
    pipeline::{ChangeDetector, CheckOutcome, CommandHandler, Scheduler},
    services::{ConsoleNotifier, HttpSource, ListingExtractor, Notifier, TelegramNotifier},
    storage::SeenStore,
};

/// Classifieds listing watcher
#[derive(Parser, Debug)]
#[command(
    name = "listing-watcher",
    version,
    about = "Delivers new classifieds listings to Telegram"
)]
struct Cli {
    /// Path to storage directory containing config.toml and the seen-set
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Arm the hourly schedule for each chat and run until Ctrl-C
    Run {
        /// Chat to subscribe (repeatable; adds to telegram.chat_ids)
        #[arg(long = "chat")]
        chats: Vec<String>,
    },

    /// Run one on-demand check
    Check {
        /// Chat to deliver to (defaults to the first of telegram.chat_ids)
        #[arg(long)]
        chat: Option<String>,

        /// Print to stdout and leave the seen-set untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration and selectors
    Validate,

    /// Show configuration and seen-set info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Chats from the command line followed by configured ones, without duplicates.
fn destinations(cli_chats: Vec<String>, config: &Config) -> Vec<Destination> {
    let mut out: Vec<Destination> = Vec::new();
    for chat in cli_chats.into_iter().chain(config.telegram.chat_ids.iter().cloned()) {
        let dest = Destination::new(chat.trim());
        if !dest.as_str().is_empty() && !out.contains(&dest) {
            out.push(dest);
        }
    }
    out
}

/// Chat for a one-off check: `--chat`, then the first configured chat.
/// A dry run with neither prints under a "console" label.
fn check_destination(chat: Option<String>, dry_run: bool, config: &Config) -> Result<Destination> {
    let chat = chat
        .or_else(|| config.telegram.chat_ids.first().cloned())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    match chat {
        Some(chat) => Ok(Destination::new(chat)),
        None if dry_run => Ok(Destination::new("console")),
        None => Err(AppError::config(
            "no destination: pass --chat or set telegram.chat_ids",
        )),
    }
}

fn telegram(config: &Config) -> Result<Arc<dyn Notifier>> {
    let token = config.bot_token()?;
    let notifier =
        TelegramNotifier::new(&config.telegram, &token, config.messages.listing.clone())?;
    Ok(Arc::new(notifier))
}

fn command_handler(
    config: &Config,
    store: Arc<SeenStore>,
    notifier: Arc<dyn Notifier>,
) -> Result<CommandHandler> {
    let source = Arc::new(HttpSource::new(&config.source)?);
    let detector = Arc::new(ChangeDetector::new(config, source, store)?);
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&detector),
        Arc::clone(&notifier),
        &config.schedule,
    ));
    Ok(CommandHandler::new(
        detector,
        scheduler,
        notifier,
        config.messages.clone(),
        config.schedule.check_limit,
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    let seen_path = config.storage.seen_path_in(&cli.storage_dir);

    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    match cli.command {
        Command::Run { chats } => {
            config.validate()?;
            let notifier = telegram(&config)?;
            let destinations = destinations(chats, &config);
            if destinations.is_empty() {
                return Err(AppError::config(
                    "no destination: pass --chat or set telegram.chat_ids",
                ));
            }

            let store = Arc::new(SeenStore::load_or_empty(&seen_path).await);
            let handler = command_handler(&config, Arc::clone(&store), notifier)?;

            for destination in &destinations {
                if let Err(e) = handler.start(destination).await {
                    log::warn!("Could not acknowledge start for {}: {}", destination, e);
                }
            }
            log::info!(
                "Watching for new listings for {} chat(s); press Ctrl-C to stop",
                destinations.len()
            );

            tokio::signal::ctrl_c().await?;
            log::info!("Shutting down...");
            handler.scheduler().shutdown();
            store.flush().await?;
        }

        Command::Check { chat, dry_run } => {
            config.validate()?;
            let destination = check_destination(chat, dry_run, &config)?;
            let (store, notifier): (Arc<SeenStore>, Arc<dyn Notifier>) = if dry_run {
                (
                    Arc::new(SeenStore::load_detached(&seen_path).await),
                    Arc::new(ConsoleNotifier::new(config.messages.listing.clone())),
                )
            } else {
                (
                    Arc::new(SeenStore::load_or_empty(&seen_path).await),
                    telegram(&config)?,
                )
            };

            let handler = command_handler(&config, store, notifier)?;
            let outcome = handler.check(&destination).await?;
            match outcome {
                CheckOutcome::Delivered(n) => log::info!("Delivered {} listings", n),
                CheckOutcome::NoNewListings => log::info!("No new listings"),
                CheckOutcome::SourceUnavailable => log::warn!("Source unavailable"),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            ListingExtractor::new(&config.selectors, config.source.origin_url()?)?;
            log::info!("✓ Config OK (includes selectors and search URL)");

            match config.bot_token() {
                Ok(_) => log::info!("✓ Bot token present"),
                Err(e) => log::warn!("{}", e),
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!(
                "Search URL: {}",
                config.source.search_url(config.filter.threshold())?
            );
            match config.filter.threshold() {
                Some(min) => log::info!("Minimum price: {} {}", min, config.filter.currency),
                None => log::info!("Price filter disabled"),
            }
            log::info!(
                "Schedule: every {}s, first after {}s, check limit {}",
                config.schedule.interval_secs,
                config.schedule.first_delay_secs,
                config.schedule.check_limit
            );

            let store = SeenStore::load_detached(&seen_path).await;
            log::info!("Seen links: {} ({})", store.len().await, seen_path.display());
        }
    }

    log::info!("Done!");

    Ok(())
}
