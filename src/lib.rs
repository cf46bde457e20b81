//! obs-deck
//!
//! Mirrors the state of a running OBS instance (scenes, sources, filters,
//! previews, outputs, recording) over obs-websocket and exposes it as one
//! observable snapshot.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod obs;
pub mod store;
pub mod sync;
pub mod ui;

pub use error::DeckError;
