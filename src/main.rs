//! obs-deck
//!
//! Control surface for OBS: a live terminal view of scenes, sources, filters
//! and outputs, plus one-shot commands for filters and recording.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use obs_deck::cli::{Cli, Command, ConnectionAction, FilterAction, RecordAction};
use obs_deck::commands;
use obs_deck::config::Config;
use obs_deck::logging;
use obs_deck::obs::{ConnectionManager, Endpoint, ObwsConnector, Transport};
use obs_deck::store::{ConnectionState, Snapshot, StateStore};
use obs_deck::ui;

/// How often the live view checks for changes
const REDRAW_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Watch);

    // The live view owns the terminal, so it logs to a file
    let _log_guard = match command {
        Command::Watch => Some(logging::init_logging()?),
        _ => {
            logging::init_stderr_logging();
            None
        }
    };

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path.clone())?,
        None => Config::load()?,
    };
    info!("Configuration loaded from {:?}", config.config_path());

    let endpoint = match &cli.endpoint {
        Some(raw) => Endpoint::parse(raw).context("Invalid --endpoint")?,
        None => config.endpoint()?,
    };
    let password = cli.password.clone().or_else(|| config.obs.password.clone());

    match command {
        Command::Watch => watch(&config, &endpoint, password.as_deref()).await,
        Command::Filters { action } => {
            let store = build_store(&config);
            let transport = open(&store, &endpoint, password.as_deref()).await?;
            run_filter_action(&store, &*transport, action).await
        }
        Command::Record { action } => {
            let store = build_store(&config);
            let transport = open(&store, &endpoint, password.as_deref()).await?;
            match action {
                RecordAction::Start => commands::start_record(&*transport).await?,
                RecordAction::Stop => commands::stop_record(&*transport).await?,
                RecordAction::Prepare => {
                    if let Err(e) = store.fetch_scenes().await {
                        warn!("Scene list incomplete: {}", e);
                    }
                    let prepared = commands::prepare_and_start_record(
                        &*transport,
                        &store.scene_filters(),
                        &config.recording,
                    )
                    .await?;
                    println!("Recording {} scenes", prepared);
                }
            }
            Ok(())
        }
        Command::Connection { action } => match action {
            ConnectionAction::Remember => {
                config.remember_connection(&endpoint, password.as_deref())?;
                println!("Stored {}", endpoint);
                Ok(())
            }
            ConnectionAction::Forget => {
                config.forget_connection()?;
                println!("Connection details cleared");
                Ok(())
            }
            ConnectionAction::Show => {
                let stored = config.endpoint()?;
                let auth = if config.obs.password.is_some() {
                    "with password"
                } else {
                    "without password"
                };
                println!("{} ({})", stored, auth);
                Ok(())
            }
        },
    }
}

fn build_store(config: &Config) -> Arc<StateStore> {
    let connection = Arc::new(ConnectionManager::new(Arc::new(ObwsConnector)));
    StateStore::new(
        connection,
        config.preview.clone(),
        config.polling.clone(),
    )
}

async fn open(
    store: &Arc<StateStore>,
    endpoint: &Endpoint,
    password: Option<&str>,
) -> Result<Arc<dyn Transport>> {
    store
        .connect(endpoint, password)
        .await
        .with_context(|| format!("Could not reach OBS at {}", endpoint))?;
    Ok(store.connection().handle()?)
}

async fn run_filter_action(
    store: &Arc<StateStore>,
    transport: &dyn Transport,
    action: FilterAction,
) -> Result<()> {
    match action {
        FilterAction::Toggle { source, filter } => {
            store.fetch_scene_filters(&[source.clone()]).await?;
            let current = store
                .scene_filters()
                .get(&source)
                .and_then(|filters| filters.iter().find(|f| f.name == filter).cloned());
            let Some(current) = current else {
                bail!("{} has no filter named {:?}", source, filter);
            };
            let enabled = commands::toggle_filter(transport, &source, &current).await?;
            println!(
                "{} on {} is now {}",
                filter,
                source,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        FilterAction::Rename {
            source,
            filter,
            new_name,
        } => {
            commands::rename_filter(transport, &source, &filter, &new_name).await?;
        }
        FilterAction::SetSettings {
            source,
            filter,
            settings,
        } => {
            let settings: serde_json::Value =
                serde_json::from_str(&settings).context("Settings must be valid JSON")?;
            if !settings.is_object() {
                bail!("Settings must be a JSON object");
            }
            commands::set_filter_settings(transport, &source, &filter, settings).await?;
        }
    }
    Ok(())
}

async fn watch(config: &Config, endpoint: &Endpoint, password: Option<&str>) -> Result<()> {
    let store = build_store(config);
    let mut updates = store.subscribe();

    if let Err(e) = store.connect(endpoint, password).await {
        draw(&store.snapshot(), &config.recording.filter_kind);
        bail!(
            "{}. Run `obs-deck connection forget` or pass --endpoint/--password to try other details.",
            e
        );
    }
    if let Err(e) = store.fetch_scenes().await {
        warn!("Initial scene fetch incomplete: {}", e);
    }
    if let Err(e) = store.fetch_outputs().await {
        warn!("Initial output fetch failed: {}", e);
    }
    store.start_polling();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    let lost = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Interrupted, shutting down");
                break false;
            }
            _ = redraw.tick() => {
                if !updates.has_changed().unwrap_or(false) {
                    continue;
                }
                let snapshot = updates.borrow_and_update().clone();
                draw(&snapshot, &config.recording.filter_kind);
                if snapshot.connection_state == ConnectionState::Disconnected {
                    break true;
                }
            }
        }
    };

    store.stop_polling();
    store.connection().disconnect();

    if lost {
        bail!("Lost connection to OBS");
    }
    Ok(())
}

fn draw(snapshot: &Snapshot, record_filter_kind: &str) {
    // Clear screen, cursor home
    print!("\x1b[2J\x1b[H");
    println!(
        "obs-deck  {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    print!("{}", ui::render(snapshot, record_filter_kind));
}
