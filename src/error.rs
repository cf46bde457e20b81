//! Error types shared by the connection, store and command layers

use thiserror::Error;

/// Errors surfaced by the sync core.
///
/// `Clone` so a single dial failure can be handed to every caller waiting on
/// the same in-flight connect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeckError {
    /// Dial or authentication failure
    #[error("failed to connect to OBS: {0}")]
    Connection(String),

    /// A handle was requested while no connection is up
    #[error("not connected to OBS")]
    NotConnected,

    /// A named per-entity-class fetch failed
    #[error(
        "failed to fetch {what}{}: {message}",
        .target.as_deref().map(|t| format!(" for {t}")).unwrap_or_default()
    )]
    Fetch {
        what: &'static str,
        target: Option<String>,
        message: String,
    },

    /// A single request failed on the wire or was rejected by OBS
    #[error("{request} failed: {message}")]
    Transport {
        request: &'static str,
        message: String,
    },

    /// OBS answered with a payload of the wrong shape
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    /// The configured endpoint could not be parsed
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl DeckError {
    pub(crate) fn fetch(what: &'static str, target: Option<String>, cause: &DeckError) -> Self {
        DeckError::Fetch {
            what,
            target,
            message: cause.to_string(),
        }
    }
}
