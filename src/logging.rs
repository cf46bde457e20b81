//! Tracing setup: rolling log file for the long-running view, stderr for
//! one-shot commands

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_BASENAME: &str = "obs-deck.log";
const LOG_DIR_ENV: &str = "OBS_DECK_LOG_PATH";
const LOG_RETENTION_DAYS: u64 = 7;

/// Get the log directory path
pub fn get_log_dir() -> Result<PathBuf> {
    resolve_log_dir()
}

/// Log to a daily-rolling file. The terminal belongs to the status view.
pub fn init_logging() -> Result<WorkerGuard> {
    let log_dir = resolve_log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

    let pruned = prune_old_logs(
        &log_dir,
        Duration::from_secs(60 * 60 * 24 * LOG_RETENTION_DAYS),
    );

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .init();

    if pruned > 0 {
        tracing::debug!("Pruned {} old log files from {:?}", pruned, log_dir);
    }
    Ok(guard)
}

/// Log to stderr
pub fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn resolve_log_dir() -> Result<PathBuf> {
    log_dir_from(std::env::var_os(LOG_DIR_ENV).map(PathBuf::from))
}

/// `$OBS_DECK_LOG_PATH` wins; otherwise the per-user state dir (data dir
/// where the platform has none)
fn log_dir_from(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    let dirs = ProjectDirs::from("dev", "obs-deck", "obs-deck")
        .context("Failed to determine project directories for log path")?;
    let base = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(base.join("logs"))
}

/// Remove rolled log files untouched for longer than `max_age`
/// (`LOG_RETENTION_DAYS` in production). Returns how many went.
fn prune_old_logs(log_dir: &Path, max_age: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return 0;
    };

    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(LOG_FILE_BASENAME))
        })
        .filter(|entry| {
            entry
                .metadata()
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| modified < cutoff)
        })
        .filter(|entry| entry.path().is_file())
        .filter(|entry| std::fs::remove_file(entry.path()).is_ok())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_fresh_and_foreign_files() {
        let dir = std::env::temp_dir().join(format!("obs-deck-logs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let ours = dir.join(format!("{LOG_FILE_BASENAME}.2026-01-01"));
        let foreign = dir.join("other.log");
        std::fs::write(&ours, "x").unwrap();
        std::fs::write(&foreign, "x").unwrap();

        // Nothing is older than a day yet
        assert_eq!(prune_old_logs(&dir, Duration::from_secs(60 * 60 * 24)), 0);
        assert!(ours.exists());

        // Everything of ours is older than a millisecond
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(prune_old_logs(&dir, Duration::from_millis(1)), 1);
        assert!(!ours.exists());
        assert!(foreign.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_log_dir_override_wins() {
        let dir = PathBuf::from("/var/tmp/deck-logs");
        assert_eq!(log_dir_from(Some(dir.clone())).unwrap(), dir);
    }

    #[test]
    fn test_missing_log_dir_prunes_nothing() {
        let dir = std::env::temp_dir().join(format!("obs-deck-none-{}", uuid::Uuid::new_v4()));
        assert_eq!(prune_old_logs(&dir, Duration::from_millis(1)), 0);
    }
}
