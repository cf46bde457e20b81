//! Connection manager: owns the one transport handle to OBS

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::transport::{Connector, Transport};
use crate::error::DeckError;

/// Default obs-websocket port
pub const DEFAULT_PORT: u16 = 4455;

/// Where the obs-websocket server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse a `ws://host[:port]` connection string
    pub fn parse(raw: &str) -> Result<Self, DeckError> {
        let invalid = |reason: &str| DeckError::InvalidEndpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "ws" {
            return Err(invalid("only ws:// endpoints are supported"));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?;

        Ok(Self {
            host: host.trim_matches(|c| c == '[' || c == ']').to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws://{}:{}", self.host, self.port)
    }
}

type Dial = Shared<BoxFuture<'static, Result<Arc<dyn Transport>, DeckError>>>;

#[derive(Default)]
struct Slot {
    handle: Option<Arc<dyn Transport>>,
    pending: Option<(u64, Dial)>,
    attempts: u64,
}

/// Owns the single transport handle.
///
/// `connect` is idempotent and single-flight: while a dial is in progress
/// every caller awaits that same dial.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    slot: Mutex<Slot>,
    connected: AtomicBool,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(Slot::default()),
            connected: AtomicBool::new(false),
        }
    }

    /// Connect to OBS, or return the existing handle if already connected
    pub async fn connect(
        &self,
        endpoint: &Endpoint,
        password: Option<&str>,
    ) -> Result<Arc<dyn Transport>, DeckError> {
        let (attempt, dial) = {
            let mut slot = self.slot.lock();
            if let Some(handle) = slot.handle.as_ref().filter(|_| self.is_connected()) {
                debug!("Already connected to OBS");
                return Ok(handle.clone());
            }
            match &slot.pending {
                Some((attempt, dial)) => {
                    debug!("Joining in-flight connect to {}", endpoint);
                    (*attempt, dial.clone())
                }
                None => {
                    slot.attempts += 1;
                    let attempt = slot.attempts;
                    let connector = self.connector.clone();
                    let target = endpoint.clone();
                    let password = password.map(str::to_owned);
                    info!("Connecting to OBS at {}", target);
                    let dial = async move { connector.dial(&target, password.as_deref()).await }
                        .boxed()
                        .shared();
                    slot.pending = Some((attempt, dial.clone()));
                    (attempt, dial)
                }
            }
        };

        let result = dial.await;

        let mut slot = self.slot.lock();
        let current = slot.pending.as_ref().is_some_and(|(a, _)| *a == attempt);
        if current {
            slot.pending = None;
            match &result {
                Ok(handle) => {
                    slot.handle = Some(handle.clone());
                    self.connected.store(true, Ordering::SeqCst);
                    info!("Connected to OBS at {}", endpoint);
                }
                Err(e) => {
                    slot.handle = None;
                    self.connected.store(false, Ordering::SeqCst);
                    warn!("Failed to connect to OBS at {}: {}", endpoint, e);
                }
            }
        }
        result
    }

    /// The live transport handle
    pub fn handle(&self) -> Result<Arc<dyn Transport>, DeckError> {
        if !self.is_connected() {
            return Err(DeckError::NotConnected);
        }
        self.slot.lock().handle.clone().ok_or(DeckError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Forget the handle after the socket went away
    pub fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("OBS connection closed");
        }
        self.slot.lock().handle = None;
    }

    /// Drop the handle; the socket closes once the last clone is gone
    pub fn disconnect(&self) {
        self.mark_disconnected();
    }
}
