//! Scripted transport used by the unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::connection::Endpoint;
use super::transport::{
    BatchRequest, BatchResponse, Connector, EngineEvent, Request, Response, Transport,
};
use super::types::{
    Filter, Output, OutputFlags, RecordStatus, Scene, Source, StreamStatus, VirtualCamStatus,
};
use crate::error::DeckError;

/// Canned engine state plus a log of everything the core asked for
#[derive(Default)]
pub struct MockState {
    pub scenes: Vec<Scene>,
    pub scene_items: HashMap<String, Vec<Source>>,
    pub filters: HashMap<String, Vec<Filter>>,
    pub outputs: Vec<Output>,
    pub record: RecordStatus,
    pub stream: StreamStatus,
    pub virtual_cam: VirtualCamStatus,
    /// Request kinds that fail, alone or anywhere in a batch
    pub failing_kinds: HashSet<&'static str>,
    /// Batch request ids whose sub-request fails
    pub failing_ids: HashSet<String>,
    /// Answer batches back to front
    pub reverse_batches: bool,
    pub calls: Vec<Request>,
    pub batches: Vec<Vec<BatchRequest>>,
    frame: u64,
}

/// Holds screenshot batches until released
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

pub struct MockTransport {
    pub state: Mutex<MockState>,
    gate: Mutex<Option<Arc<Gate>>>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl MockTransport {
    pub fn new(state: MockState) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: Mutex::new(state),
            gate: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Two scenes sharing one source, each with a filter
    pub fn two_scenes() -> Arc<Self> {
        let mut state = MockState {
            scenes: vec![scene("Main", 0), scene("Backup", 1)],
            ..Default::default()
        };
        state
            .scene_items
            .insert("Main".into(), vec![source("Camera", 1), source("Mic", 2)]);
        state
            .scene_items
            .insert("Backup".into(), vec![source("Mic", 2), source("Slides", 3)]);
        state.filters.insert(
            "Main".into(),
            vec![filter("Source Record", "source_record_filter", true)],
        );
        state
            .filters
            .insert("Camera".into(), vec![filter("Color", "color_filter", true)]);
        state.outputs = vec![output("Source Record", false)];
        Self::new(state)
    }

    pub fn push_event(&self, event: EngineEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn install_gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub fn calls_of(&self, kind: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|r| r.kind() == kind)
            .count()
    }

    /// Batches whose sub-requests are all of `kind`
    pub fn batches_of(&self, kind: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .batches
            .iter()
            .filter(|b| b.iter().all(|r| r.request.kind() == kind))
            .map(|b| b.iter().map(|r| r.request_id.clone()).collect())
            .collect()
    }

    fn respond(state: &mut MockState, request: &Request) -> Result<Response, String> {
        let response = match request {
            Request::SceneList => Response::Scenes(state.scenes.clone()),
            Request::SceneItemList { scene } => Response::SceneItems(
                state
                    .scene_items
                    .get(scene)
                    .cloned()
                    .ok_or_else(|| format!("no scene named {scene}"))?,
            ),
            Request::SourceFilterList { source } => {
                Response::Filters(state.filters.get(source).cloned().unwrap_or_default())
            }
            Request::SourceScreenshot { source, .. } => {
                Response::Screenshot(format!("frame-{}:{source}", state.frame))
            }
            Request::OutputList => Response::Outputs(state.outputs.clone()),
            Request::StreamStatus => Response::StreamStatus(state.stream),
            Request::RecordStatus => Response::RecordStatus(state.record.clone()),
            Request::VirtualCamStatus => Response::VirtualCamStatus(state.virtual_cam),
            Request::SetSourceFilterEnabled { source, filter, enabled } => {
                let filters = state.filters.entry(source.clone()).or_default();
                if let Some(f) = filters.iter_mut().find(|f| &f.name == filter) {
                    f.enabled = *enabled;
                }
                Response::Ack
            }
            Request::SetSourceFilterName { source, filter, new_name } => {
                let filters = state.filters.entry(source.clone()).or_default();
                if let Some(f) = filters.iter_mut().find(|f| &f.name == filter) {
                    f.name = new_name.clone();
                }
                Response::Ack
            }
            Request::SetSourceFilterSettings { .. } | Request::StartRecord | Request::StopRecord => {
                Response::Ack
            }
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, request: Request) -> Result<Response, DeckError> {
        let mut state = self.state.lock();
        state.calls.push(request.clone());
        if state.failing_kinds.contains(request.kind()) {
            return Err(DeckError::Transport {
                request: request.kind(),
                message: "scripted failure".into(),
            });
        }
        Self::respond(&mut state, &request).map_err(|message| DeckError::Transport {
            request: request.kind(),
            message,
        })
    }

    async fn call_batch(
        &self,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<BatchResponse>, DeckError> {
        let gated = requests
            .iter()
            .any(|r| matches!(r.request, Request::SourceScreenshot { .. }));
        let gate = if gated { self.gate.lock().clone() } else { None };
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut state = self.state.lock();
        state.batches.push(requests.clone());
        state.frame += 1;
        if let Some(failing) = requests
            .iter()
            .map(|r| r.request.kind())
            .find(|kind| state.failing_kinds.contains(kind))
        {
            return Err(DeckError::Transport {
                request: failing,
                message: "scripted batch failure".into(),
            });
        }
        let mut responses: Vec<BatchResponse> = requests
            .iter()
            .map(|r| {
                let result = if state.failing_ids.contains(&r.request_id) {
                    Err("scripted failure".to_string())
                } else {
                    Self::respond(&mut state, &r.request)
                };
                BatchResponse {
                    request_id: r.request_id.clone(),
                    result,
                }
            })
            .collect();
        if state.reverse_batches {
            responses.reverse();
        }
        Ok(responses)
    }

    fn events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DeckError> {
        self.events_rx
            .lock()
            .take()
            .ok_or_else(|| DeckError::Connection("events already taken".into()))
    }
}

/// Connector handing out one prepared transport
pub struct MockConnector {
    pub transport: Arc<MockTransport>,
    pub dials: AtomicUsize,
    /// Number of upcoming dials that fail
    pub failures: AtomicUsize,
    pub gate: Option<Arc<Notify>>,
}

impl MockConnector {
    pub fn new(transport: Arc<MockTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            dials: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            gate: None,
        })
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(
        &self,
        _endpoint: &Endpoint,
        _password: Option<&str>,
    ) -> Result<Arc<dyn Transport>, DeckError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeckError::Connection("connection refused".into()));
        }
        Ok(self.transport.clone())
    }
}

pub fn scene(name: &str, index: usize) -> Scene {
    Scene {
        name: name.to_string(),
        index,
    }
}

pub fn source(name: &str, id: u128) -> Source {
    Source {
        name: name.to_string(),
        uuid: Uuid::from_u128(id),
        input_kind: Some("ffmpeg_source".to_string()),
        item_id: id as i64,
        index: 0,
        dimensions: None,
    }
}

pub fn filter(name: &str, kind: &str, enabled: bool) -> Filter {
    Filter {
        name: name.to_string(),
        kind: kind.to_string(),
        enabled,
        index: 0,
        settings: serde_json::json!({ "path": "/tmp" }),
    }
}

pub fn output(name: &str, active: bool) -> Output {
    Output {
        name: name.to_string(),
        kind: "ffmpeg_muxer".to_string(),
        width: 1920,
        height: 1080,
        flags: OutputFlags {
            video: true,
            audio: true,
            ..Default::default()
        },
        active,
    }
}
