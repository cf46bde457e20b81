//! Observable state of the connected OBS instance

mod snapshot;
mod state;

pub use snapshot::{ConnectionState, Snapshot};
pub use state::StateStore;
