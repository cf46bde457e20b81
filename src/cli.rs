//! Command line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "obs-deck", version)]
#[command(about = "Control surface for OBS scenes, filters and source recording")]
pub struct Cli {
    /// obs-websocket endpoint (ws://host:port); overrides the stored one
    #[arg(long, env = "OBS_DECK_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// obs-websocket password; overrides the stored one
    #[arg(long, env = "OBS_DECK_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Live view of scenes, sources, filters and outputs (default)
    Watch,
    /// Change a filter on a scene or source
    Filters {
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Control the recording output
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },
    /// Manage the stored connection details
    Connection {
        #[command(subcommand)]
        action: ConnectionAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum FilterAction {
    /// Flip a filter between enabled and disabled
    Toggle { source: String, filter: String },
    /// Rename a filter
    Rename {
        source: String,
        filter: String,
        new_name: String,
    },
    /// Overlay JSON settings onto a filter
    SetSettings {
        source: String,
        filter: String,
        /// JSON object, e.g. '{"path": "/tmp"}'
        settings: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum RecordAction {
    Start,
    Stop,
    /// Point every source-record filter at its own file, then start recording
    Prepare,
}

#[derive(Debug, Subcommand)]
pub enum ConnectionAction {
    /// Store --endpoint and --password for later runs
    Remember,
    /// Reset to the default endpoint and drop the password
    Forget,
    /// Print the stored endpoint
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_filter_rename() {
        let cli = Cli::try_parse_from([
            "obs-deck",
            "--endpoint",
            "ws://studio:4455",
            "filters",
            "rename",
            "Main",
            "Source Record",
            "Source Record - Main",
        ])
        .unwrap();

        assert_eq!(cli.endpoint.as_deref(), Some("ws://studio:4455"));
        match cli.command {
            Some(Command::Filters {
                action: FilterAction::Rename { new_name, .. },
            }) => assert_eq!(new_name, "Source Record - Main"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["obs-deck"]).unwrap();
        assert!(cli.command.is_none());
    }
}
