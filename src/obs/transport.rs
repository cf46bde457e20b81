//! Transport seam between the sync core and the OBS WebSocket client
//!
//! The core only ever talks to OBS through [`Transport`]: single calls, batch
//! calls and the pushed event stream. [`super::ObwsTransport`] is the real
//! implementation; tests swap in a scripted one.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::connection::Endpoint;
use super::types::{Filter, Output, RecordStatus, Scene, Source, StreamStatus, VirtualCamStatus};
use crate::error::DeckError;

/// A request understood by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    SceneList,
    SceneItemList {
        scene: String,
    },
    SourceFilterList {
        source: String,
    },
    SourceScreenshot {
        source: String,
        format: String,
        width: u32,
        height: u32,
    },
    OutputList,
    StreamStatus,
    RecordStatus,
    VirtualCamStatus,
    SetSourceFilterEnabled {
        source: String,
        filter: String,
        enabled: bool,
    },
    SetSourceFilterName {
        source: String,
        filter: String,
        new_name: String,
    },
    SetSourceFilterSettings {
        source: String,
        filter: String,
        settings: serde_json::Value,
        overlay: bool,
    },
    StartRecord,
    StopRecord,
}

impl Request {
    /// obs-websocket request type name
    pub fn kind(&self) -> &'static str {
        match self {
            Request::SceneList => "GetSceneList",
            Request::SceneItemList { .. } => "GetSceneItemList",
            Request::SourceFilterList { .. } => "GetSourceFilterList",
            Request::SourceScreenshot { .. } => "GetSourceScreenshot",
            Request::OutputList => "GetOutputList",
            Request::StreamStatus => "GetStreamStatus",
            Request::RecordStatus => "GetRecordStatus",
            Request::VirtualCamStatus => "GetVirtualCamStatus",
            Request::SetSourceFilterEnabled { .. } => "SetSourceFilterEnabled",
            Request::SetSourceFilterName { .. } => "SetSourceFilterName",
            Request::SetSourceFilterSettings { .. } => "SetSourceFilterSettings",
            Request::StartRecord => "StartRecord",
            Request::StopRecord => "StopRecord",
        }
    }
}

/// A response payload, shaped per request kind
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Scenes(Vec<Scene>),
    SceneItems(Vec<Source>),
    Filters(Vec<Filter>),
    /// Encoded image, usually a `data:image/png;base64,...` URI
    Screenshot(String),
    Outputs(Vec<Output>),
    StreamStatus(StreamStatus),
    RecordStatus(RecordStatus),
    VirtualCamStatus(VirtualCamStatus),
    /// Requests that return nothing of interest
    Ack,
}

impl Response {
    pub fn into_scenes(self) -> Option<Vec<Scene>> {
        match self {
            Response::Scenes(scenes) => Some(scenes),
            _ => None,
        }
    }

    pub fn into_scene_items(self) -> Option<Vec<Source>> {
        match self {
            Response::SceneItems(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_filters(self) -> Option<Vec<Filter>> {
        match self {
            Response::Filters(filters) => Some(filters),
            _ => None,
        }
    }

    pub fn into_screenshot(self) -> Option<String> {
        match self {
            Response::Screenshot(image) => Some(image),
            _ => None,
        }
    }

    pub fn into_outputs(self) -> Option<Vec<Output>> {
        match self {
            Response::Outputs(outputs) => Some(outputs),
            _ => None,
        }
    }

    pub fn into_stream_status(self) -> Option<StreamStatus> {
        match self {
            Response::StreamStatus(status) => Some(status),
            _ => None,
        }
    }

    pub fn into_record_status(self) -> Option<RecordStatus> {
        match self {
            Response::RecordStatus(status) => Some(status),
            _ => None,
        }
    }

    pub fn into_virtual_cam_status(self) -> Option<VirtualCamStatus> {
        match self {
            Response::VirtualCamStatus(status) => Some(status),
            _ => None,
        }
    }
    pub fn into_ack(self) -> Option<()> {
        match self {
            Response::Ack => Some(()),
            _ => None,
        }
    }
}

/// One tagged sub-request of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// Correlation tag chosen by the caller, echoed back verbatim
    pub request_id: String,
    pub request: Request,
}

/// One tagged sub-result of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    pub request_id: String,
    /// `Err` carries the failure message of this sub-request only
    pub result: Result<Response, String>,
}

/// Change notifications pushed by OBS, narrowed to what the store reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SceneListChanged { scenes: Vec<Scene> },
    FilterListReindexed { source: String },
    FilterCreated { source: String },
    FilterRemoved { source: String },
    FilterRenamed { source: String },
    FilterSettingsChanged { source: String },
    FilterEnableChanged { source: String, enabled: bool },
    SceneItemAdded { scene: String },
    SceneItemRemoved { scene: String },
    StreamStateChanged { active: bool },
    RecordStateChanged { active: bool, paused: bool },
    VirtualCamStateChanged { active: bool },
    /// The event stream ended; the socket is gone
    ConnectionClosed,
}

impl EngineEvent {
    /// Entity whose filter list a filter event invalidates
    pub fn filter_source(&self) -> Option<&str> {
        match self {
            EngineEvent::FilterListReindexed { source }
            | EngineEvent::FilterCreated { source }
            | EngineEvent::FilterRemoved { source }
            | EngineEvent::FilterRenamed { source }
            | EngineEvent::FilterSettingsChanged { source }
            | EngineEvent::FilterEnableChanged { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A live connection to OBS
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single request
    async fn call(&self, request: Request) -> Result<Response, DeckError>;

    /// Issue several tagged requests as one batch.
    ///
    /// Results may come back in any order; callers correlate by `request_id`.
    async fn call_batch(&self, requests: Vec<BatchRequest>)
        -> Result<Vec<BatchResponse>, DeckError>;

    /// Subscribe to pushed change notifications
    fn events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DeckError>;
}

/// Dials a [`Transport`]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(
        &self,
        endpoint: &Endpoint,
        password: Option<&str>,
    ) -> Result<Arc<dyn Transport>, DeckError>;
}

/// Issue `request` and narrow the response with `extract`
pub async fn call_expecting<T>(
    transport: &dyn Transport,
    request: Request,
    extract: fn(Response) -> Option<T>,
) -> Result<T, DeckError> {
    let kind = request.kind();
    let response = transport.call(request).await?;
    extract(response).ok_or(DeckError::UnexpectedResponse(kind))
}
