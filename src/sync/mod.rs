//! Keeps the state store in step with OBS: pushed events and the poll loops

mod reconciler;
mod scheduler;

pub use reconciler::Reconciler;
pub use scheduler::PollScheduler;
