//! Terminal presentation of the store

pub mod preview;
mod render;

pub use render::{render, source_icon};
