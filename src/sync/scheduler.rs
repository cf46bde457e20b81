//! Poll scheduler: the preview and record-status refresh loops
//!
//! Each loop sleeps *after* its fetch settles, so a slow OBS never sees two
//! overlapping polls of the same kind. Stopping cancels the sleep; a fetch
//! already on the wire is left to finish and merge.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollKind {
    Preview,
    Status,
}

impl PollKind {
    fn name(self) -> &'static str {
        match self {
            PollKind::Preview => "preview",
            PollKind::Status => "status",
        }
    }
}

struct ActivePoll {
    token: CancellationToken,
    _tasks: Vec<JoinHandle<()>>,
}

/// Owns at most one preview loop and one status loop
pub struct PollScheduler {
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActivePoll>>,
    preview_interval: Duration,
    status_interval: Duration,
}

impl PollScheduler {
    pub fn new(polling: PollingConfig) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
            preview_interval: polling.preview_interval(),
            status_interval: polling.status_interval(),
        }
    }

    /// Cancel any running loops and start a fresh pair
    pub fn start(&self, store: Arc<StateStore>) {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            debug!("Restarting poll loops");
            previous.token.cancel();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let tasks = [
            (PollKind::Preview, self.preview_interval),
            (PollKind::Status, self.status_interval),
        ]
        .into_iter()
        .map(|(kind, interval)| {
            let poll = PollLoop {
                kind,
                interval,
                generation,
                current: self.generation.clone(),
                token: token.clone(),
                store: store.clone(),
            };
            tokio::spawn(poll.run())
        })
        .collect();

        info!(
            "Polling started (preview every {:?}, status every {:?})",
            self.preview_interval, self.status_interval
        );
        *active = Some(ActivePoll {
            token,
            _tasks: tasks,
        });
    }

    /// Stop scheduling new iterations
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.active.lock().take() {
            previous.token.cancel();
            info!("Polling stopped");
        }
    }
}

struct PollLoop {
    kind: PollKind,
    interval: Duration,
    generation: u64,
    current: Arc<AtomicU64>,
    token: CancellationToken,
    store: Arc<StateStore>,
}

impl PollLoop {
    fn is_stale(&self) -> bool {
        self.token.is_cancelled() || self.current.load(Ordering::SeqCst) != self.generation
    }

    async fn run(self) {
        let mut last_error: Option<String> = None;

        loop {
            if self.is_stale() {
                break;
            }
            if !self.store.is_live() {
                debug!("{} poll: not connected, stopping", self.kind.name());
                break;
            }

            let result = match self.kind {
                PollKind::Preview => self.store.refresh_previews().await,
                PollKind::Status => self.store.fetch_record_status().await,
            };

            match result {
                Ok(()) => last_error = None,
                Err(e) => {
                    let message = e.to_string();
                    if last_error.as_deref() != Some(message.as_str()) {
                        warn!("{} poll failed: {}", self.kind.name(), message);
                    } else {
                        debug!("{} poll failed again: {}", self.kind.name(), message);
                    }
                    last_error = Some(message);
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!("{} poll loop exited", self.kind.name());
    }
}
