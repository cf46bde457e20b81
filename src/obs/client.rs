//! obs-websocket transport backed by `obws`

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use obws::events::{Event, OutputState};
use obws::responses::inputs::Input;
use obws::responses::scene_items::SceneItem;
use obws::responses::scenes::Scene as ObsScene;
use obws::Client;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::connection::Endpoint;
use super::transport::{
    BatchRequest, BatchResponse, Connector, EngineEvent, Request, Response, Transport,
};
use super::types::{
    format_timecode, Filter, Output, OutputFlags, RecordStatus, Scene, Source, StreamStatus,
    VirtualCamStatus,
};
use crate::error::DeckError;

/// Dials OBS with `obws`
#[derive(Debug, Default, Clone, Copy)]
pub struct ObwsConnector;

#[async_trait]
impl Connector for ObwsConnector {
    async fn dial(
        &self,
        endpoint: &Endpoint,
        password: Option<&str>,
    ) -> Result<Arc<dyn Transport>, DeckError> {
        let client = Client::connect(&endpoint.host, endpoint.port, password)
            .await
            .map_err(|e| DeckError::Connection(e.to_string()))?;
        info!("obs-websocket session established with {}", endpoint);
        Ok(Arc::new(ObwsTransport {
            client,
            source_ids: Mutex::new(HashMap::new()),
        }))
    }
}

/// A connected obs-websocket session
pub struct ObwsTransport {
    client: Client,
    /// Source name → uuid, for inputs and scenes. Scene items only carry names.
    source_ids: Mutex<HashMap<String, Uuid>>,
}

impl ObwsTransport {
    /// Reload the name → uuid table when `items` mention a source it lacks
    async fn refresh_source_ids(&self, items: &[SceneItem]) -> Result<(), obws::error::Error> {
        let missing = {
            let ids = self.source_ids.lock();
            items.iter().any(|item| !ids.contains_key(&item.source_name))
        };
        if !missing {
            return Ok(());
        }

        let inputs_api = self.client.inputs();
        let scenes_api = self.client.scenes();
        let (inputs, scenes) =
            tokio::try_join!(inputs_api.list(None), scenes_api.list())?;
        let table = source_id_table(inputs, scenes.scenes);
        debug!("Loaded {} source ids", table.len());
        *self.source_ids.lock() = table;
        Ok(())
    }

    async fn execute(&self, request: Request) -> Result<Response, obws::error::Error> {
        trace!("OBS request {}", request.kind());
        let response = match request {
            Request::SceneList => {
                let list = self.client.scenes().list().await?;
                Response::Scenes(
                    list.scenes
                        .into_iter()
                        .map(|s| Scene {
                            name: s.id.name,
                            index: s.index,
                        })
                        .collect(),
                )
            }
            Request::SceneItemList { scene } => {
                let items = self.client.scene_items().list(scene.as_str().into()).await?;
                self.refresh_source_ids(&items).await?;
                let ids = self.source_ids.lock();
                Response::SceneItems(map_scene_items(items, &ids))
            }
            Request::SourceFilterList { source } => {
                let filters = self.client.filters().list(source.as_str().into()).await?;
                Response::Filters(
                    filters
                        .into_iter()
                        .map(|f| Filter {
                            name: f.name,
                            kind: f.kind,
                            enabled: f.enabled,
                            index: f.index,
                            settings: f.settings,
                        })
                        .collect(),
                )
            }
            Request::SourceScreenshot {
                source,
                format,
                width,
                height,
            } => {
                let image = self
                    .client
                    .sources()
                    .take_screenshot(obws::requests::sources::TakeScreenshot {
                        source: source.as_str().into(),
                        width: Some(width),
                        height: Some(height),
                        format: &format,
                        compression_quality: None,
                    })
                    .await?;
                Response::Screenshot(image)
            }
            Request::OutputList => {
                let outputs = self.client.outputs().list().await?;
                Response::Outputs(
                    outputs
                        .into_iter()
                        .map(|o| Output {
                            name: o.name,
                            kind: o.kind,
                            width: o.width,
                            height: o.height,
                            flags: OutputFlags {
                                video: o.flags.video,
                                audio: o.flags.audio,
                                encoded: o.flags.encoded,
                                multi_track: o.flags.multi_track,
                                service: o.flags.service,
                            },
                            active: o.active,
                        })
                        .collect(),
                )
            }
            Request::StreamStatus => {
                let status = self.client.streaming().status().await?;
                Response::StreamStatus(StreamStatus {
                    active: status.active,
                })
            }
            Request::RecordStatus => {
                let status = self.client.recording().status().await?;
                let elapsed_ms = u64::try_from(status.timecode.whole_milliseconds()).unwrap_or(0);
                Response::RecordStatus(RecordStatus {
                    active: status.active,
                    paused: status.paused,
                    timecode: format_timecode(elapsed_ms),
                    bytes: status.bytes,
                })
            }
            Request::VirtualCamStatus => {
                let active = self.client.virtual_cam().status().await?;
                Response::VirtualCamStatus(VirtualCamStatus { active })
            }
            Request::SetSourceFilterEnabled {
                source,
                filter,
                enabled,
            } => {
                self.client
                    .filters()
                    .set_enabled(obws::requests::filters::SetEnabled {
                        source: source.as_str().into(),
                        filter: &filter,
                        enabled,
                    })
                    .await?;
                Response::Ack
            }
            Request::SetSourceFilterName {
                source,
                filter,
                new_name,
            } => {
                self.client
                    .filters()
                    .set_name(obws::requests::filters::SetName {
                        source: source.as_str().into(),
                        filter: &filter,
                        new_name: &new_name,
                    })
                    .await?;
                Response::Ack
            }
            Request::SetSourceFilterSettings {
                source,
                filter,
                settings,
                overlay,
            } => {
                self.client
                    .filters()
                    .set_settings(obws::requests::filters::SetSettings {
                        source: source.as_str().into(),
                        filter: &filter,
                        settings: &settings,
                        overlay: Some(overlay),
                    })
                    .await?;
                Response::Ack
            }
            Request::StartRecord => {
                self.client.recording().start().await?;
                info!("Started OBS recording");
                Response::Ack
            }
            Request::StopRecord => {
                self.client.recording().stop().await?;
                info!("Stopped OBS recording");
                Response::Ack
            }
        };
        Ok(response)
    }
}

#[async_trait]
impl Transport for ObwsTransport {
    async fn call(&self, request: Request) -> Result<Response, DeckError> {
        let kind = request.kind();
        self.execute(request)
            .await
            .map_err(|e| DeckError::Transport {
                request: kind,
                message: e.to_string(),
            })
    }

    /// Sub-requests are pipelined over the one socket and joined; each keeps
    /// its own tag and its own failure.
    async fn call_batch(
        &self,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<BatchResponse>, DeckError> {
        let calls = requests.into_iter().map(|BatchRequest { request_id, request }| async move {
            let result = self.execute(request).await.map_err(|e| e.to_string());
            BatchResponse { request_id, result }
        });
        Ok(join_all(calls).await)
    }

    /// Forward the OBS events the store cares about to a channel
    fn events(&self) -> Result<mpsc::UnboundedReceiver<EngineEvent>, DeckError> {
        let raw_events = self
            .client
            .events()
            .map_err(|e| DeckError::Connection(format!("failed to subscribe to OBS events: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tokio::pin!(raw_events);

            while let Some(event) = raw_events.next().await {
                let Some(event) = map_event(event) else {
                    continue;
                };
                if tx.send(event).is_err() {
                    // Receiver dropped, exit task
                    return;
                }
            }

            debug!("OBS event stream ended");
            let _ = tx.send(EngineEvent::ConnectionClosed);
        });

        Ok(rx)
    }
}

fn source_id_table(inputs: Vec<Input>, scenes: Vec<ObsScene>) -> HashMap<String, Uuid> {
    inputs
        .into_iter()
        .map(|input| (input.id.name, input.id.uuid))
        .chain(scenes.into_iter().map(|scene| (scene.id.name, scene.id.uuid)))
        .collect()
}

/// Id for a source OBS did not list, e.g. a group. Stable per name.
fn fallback_source_id(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

fn map_scene_items(items: Vec<SceneItem>, ids: &HashMap<String, Uuid>) -> Vec<Source> {
    items
        .into_iter()
        .map(|item| {
            let uuid = ids
                .get(&item.source_name)
                .copied()
                .unwrap_or_else(|| fallback_source_id(&item.source_name));
            Source {
                uuid,
                name: item.source_name,
                input_kind: item.input_kind,
                item_id: item.id,
                index: item.index,
                dimensions: None,
            }
        })
        .collect()
}

fn map_event(event: Event) -> Option<EngineEvent> {
    let mapped = match event {
        Event::SceneListChanged { scenes } => EngineEvent::SceneListChanged {
            scenes: scenes
                .into_iter()
                .map(|s| Scene {
                    name: s.name,
                    index: s.index,
                })
                .collect(),
        },
        Event::SourceFilterListReindexed { source, .. } => {
            EngineEvent::FilterListReindexed { source }
        }
        Event::SourceFilterCreated { source, .. } => EngineEvent::FilterCreated { source },
        Event::SourceFilterRemoved { source, .. } => EngineEvent::FilterRemoved { source },
        Event::SourceFilterNameChanged { source, .. } => EngineEvent::FilterRenamed { source },
        Event::SourceFilterSettingsChanged { source, .. } => {
            EngineEvent::FilterSettingsChanged { source }
        }
        Event::SourceFilterEnableStateChanged {
            source, enabled, ..
        } => EngineEvent::FilterEnableChanged { source, enabled },
        Event::SceneItemCreated { scene, .. } => EngineEvent::SceneItemAdded { scene: scene.name },
        Event::SceneItemRemoved { scene, .. } => EngineEvent::SceneItemRemoved { scene: scene.name },
        Event::StreamStateChanged { active, .. } => EngineEvent::StreamStateChanged { active },
        Event::RecordStateChanged { active, state, .. } => EngineEvent::RecordStateChanged {
            active,
            paused: matches!(state, OutputState::Paused),
        },
        Event::VirtualcamStateChanged { active, .. } => {
            EngineEvent::VirtualCamStateChanged { active }
        }
        _ => return None,
    };
    Some(mapped)
}
