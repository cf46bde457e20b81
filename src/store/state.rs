//! The state store: fetch-and-merge operations and point mutations over one
//! observable [`Snapshot`]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::snapshot::{ConnectionState, Snapshot};
use crate::config::{PollingConfig, PreviewConfig};
use crate::error::DeckError;
use crate::obs::batch::fetch_batch;
use crate::obs::transport::call_expecting;
use crate::obs::{
    ConnectionManager, Endpoint, Filter, Output, RecordStatus, Request, Response, Scene, Source,
    StreamStatus, Transport, VirtualCamStatus,
};
use crate::sync::{PollScheduler, Reconciler};

/// Process-wide mirror of OBS state.
///
/// Presentation reads it through the selectors and [`StateStore::subscribe`];
/// only the operations below mutate it. Writes from the poll loops and the
/// event reconciler are not ordered against each other: whichever lands last
/// wins.
pub struct StateStore {
    connection: Arc<ConnectionManager>,
    preview: PreviewConfig,
    state: watch::Sender<Snapshot>,
    poller: PollScheduler,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

fn sources_mut(s: &mut Snapshot) -> &mut HashMap<String, Vec<Source>> {
    &mut s.scene_sources
}

fn filters_mut(s: &mut Snapshot) -> &mut HashMap<String, Vec<Filter>> {
    &mut s.scene_filters
}

fn previews_mut(s: &mut Snapshot) -> &mut HashMap<String, String> {
    &mut s.scene_previews
}

/// Names shown in a batch error; the rest are counted
const ERROR_TARGET_NAMES: usize = 3;

fn batch_target(names: &[String]) -> String {
    if names.len() <= ERROR_TARGET_NAMES {
        return names.join(", ");
    }
    format!(
        "{} and {} more",
        names[..ERROR_TARGET_NAMES].join(", "),
        names.len() - ERROR_TARGET_NAMES
    )
}

impl StateStore {
    pub fn new(
        connection: Arc<ConnectionManager>,
        preview: PreviewConfig,
        polling: PollingConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(Snapshot::default());
        Arc::new(Self {
            connection,
            preview,
            state,
            poller: PollScheduler::new(polling),
            reconciler: Mutex::new(None),
        })
    }

    /// The connection manager every fetch goes through
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    // ---- selectors -------------------------------------------------------

    /// Receiver that wakes on every mutation
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn select<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        f(&self.state.borrow())
    }

    pub fn scenes(&self) -> Vec<Scene> {
        self.select(|s| s.scenes.clone())
    }

    pub fn scene_sources(&self) -> HashMap<String, Vec<Source>> {
        self.select(|s| s.scene_sources.clone())
    }

    pub fn scene_filters(&self) -> HashMap<String, Vec<Filter>> {
        self.select(|s| s.scene_filters.clone())
    }

    pub fn scene_previews(&self) -> HashMap<String, String> {
        self.select(|s| s.scene_previews.clone())
    }

    pub fn outputs(&self) -> Vec<Output> {
        self.select(|s| s.outputs.clone())
    }

    pub fn record_status(&self) -> RecordStatus {
        self.select(|s| s.record_status.clone())
    }

    pub fn stream_status(&self) -> StreamStatus {
        self.select(|s| s.stream_status)
    }

    pub fn virtual_cam_status(&self) -> VirtualCamStatus {
        self.select(|s| s.virtual_cam_status)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.select(|s| s.connection_state)
    }

    pub fn error(&self) -> Option<String> {
        self.select(|s| s.error.clone())
    }

    pub fn is_polling(&self) -> bool {
        self.select(|s| s.is_polling)
    }

    pub fn unique_scene_sources(&self) -> Vec<Source> {
        self.select(Snapshot::unique_scene_sources)
    }

    // ---- mutation plumbing -----------------------------------------------

    fn update(&self, action: &str, f: impl FnOnce(&mut Snapshot)) {
        self.state.send_modify(|snapshot| {
            f(snapshot);
            snapshot.version += 1;
        });
        trace!(action, "store updated");
    }

    /// Record a failed fetch in the shared error field and hand it back
    fn fail(&self, what: &'static str, target: Option<String>, cause: DeckError) -> DeckError {
        let error = DeckError::fetch(what, target, &cause);
        debug!("{}", error);
        let message = error.to_string();
        self.update("fetch_error", |s| s.error = Some(message));
        error
    }

    fn transport(&self) -> Result<Arc<dyn Transport>, DeckError> {
        self.connection.handle()
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update("set_error", |s| s.error = error);
    }

    // ---- connection --------------------------------------------------------

    /// Connect, attach the event reconciler and load stream/record/virtual-cam
    /// status. The store only reports `Connected` once all three arrived.
    pub async fn connect(
        self: &Arc<Self>,
        endpoint: &Endpoint,
        password: Option<&str>,
    ) -> Result<(), DeckError> {
        self.update("connecting", |s| {
            s.connection_state = ConnectionState::Connecting;
        });

        match self.establish(endpoint, password).await {
            Ok((stream, record, virtual_cam)) => {
                info!(
                    "Connected: streaming={}, recording={}, virtual_cam={}",
                    stream.active, record.active, virtual_cam.active
                );
                self.update("connected", |s| {
                    s.connection_state = ConnectionState::Connected;
                    s.error = None;
                    s.stream_status = stream;
                    s.record_status = record;
                    s.virtual_cam_status = virtual_cam;
                });
                Ok(())
            }
            Err(e) => {
                warn!("Connection failed: {}", e);
                let message = e.to_string();
                self.update("connection_error", |s| {
                    s.connection_state = ConnectionState::Disconnected;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    async fn establish(
        self: &Arc<Self>,
        endpoint: &Endpoint,
        password: Option<&str>,
    ) -> Result<(StreamStatus, RecordStatus, VirtualCamStatus), DeckError> {
        let transport = self.connection.connect(endpoint, password).await?;
        self.attach_reconciler(transport.as_ref())?;

        tokio::try_join!(
            call_expecting(&*transport, Request::StreamStatus, Response::into_stream_status),
            call_expecting(&*transport, Request::RecordStatus, Response::into_record_status),
            call_expecting(
                &*transport,
                Request::VirtualCamStatus,
                Response::into_virtual_cam_status
            ),
        )
    }

    fn attach_reconciler(self: &Arc<Self>, transport: &dyn Transport) -> Result<(), DeckError> {
        let mut slot = self.reconciler.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(());
        }
        let events = transport.events()?;
        *slot = Some(Reconciler::spawn(self.clone(), events));
        Ok(())
    }

    /// The socket went away. State is left as-is, only flagged stale.
    pub fn mark_disconnected(&self) {
        self.connection.mark_disconnected();
        self.update("disconnected", |s| {
            s.connection_state = ConnectionState::Disconnected;
            s.error = Some("connection to OBS closed".to_string());
        });
    }

    // ---- fetch-and-merge ---------------------------------------------------

    /// Fetch the scene list, then cascade into sources and filters.
    ///
    /// Fails without cascading when the scene list itself cannot be fetched.
    /// Cascade failures are reported after the cascade finished; whatever was
    /// merged stays merged.
    pub async fn fetch_scenes(&self) -> Result<(), DeckError> {
        let transport = self.transport().map_err(|e| self.fail("scenes", None, e))?;
        let scenes = call_expecting(&*transport, Request::SceneList, Response::into_scenes)
            .await
            .map_err(|e| self.fail("scenes", None, e))?;

        info!("Fetched {} scenes", scenes.len());
        self.update("fetched_scenes", |s| {
            s.replace_scene_list(scenes);
            s.error = None;
        });

        let scene_names = self.select(Snapshot::scene_names);
        let mut cascade_error = self.fetch_scene_sources(&scene_names).await.err();

        let entities = self.select(Snapshot::entity_names);
        if let Err(e) = self.fetch_scene_filters(&entities).await {
            cascade_error.get_or_insert(e);
        }

        match cascade_error {
            Some(e) => {
                // A later successful step cleared the field; the cascade still failed
                self.set_error(Some(e.to_string()));
                Err(e)
            }
            None => Ok(()),
        }
    }

    /// Re-fetch the sources of the named scenes
    pub async fn fetch_scene_sources(&self, scenes: &[String]) -> Result<(), DeckError> {
        self.fetch_merge(
            "sources",
            scenes,
            |scene| Request::SceneItemList {
                scene: scene.to_owned(),
            },
            Response::into_scene_items,
            sources_mut,
        )
        .await
    }

    /// Re-fetch the filters of the named scenes or sources
    pub async fn fetch_scene_filters(&self, entities: &[String]) -> Result<(), DeckError> {
        self.fetch_merge(
            "filters",
            entities,
            |entity| Request::SourceFilterList {
                source: entity.to_owned(),
            },
            Response::into_filters,
            filters_mut,
        )
        .await
    }

    /// Render a fresh preview frame of the named scenes or sources
    pub async fn fetch_scene_preview(&self, entities: &[String]) -> Result<(), DeckError> {
        let preview = &self.preview;
        self.fetch_merge(
            "previews",
            entities,
            |entity| Request::SourceScreenshot {
                source: entity.to_owned(),
                format: preview.format.clone(),
                width: preview.width,
                height: preview.height,
            },
            Response::into_screenshot,
            previews_mut,
        )
        .await
    }

    /// Replace the output list
    pub async fn fetch_outputs(&self) -> Result<(), DeckError> {
        let transport = self.transport().map_err(|e| self.fail("outputs", None, e))?;
        let outputs = call_expecting(&*transport, Request::OutputList, Response::into_outputs)
            .await
            .map_err(|e| self.fail("outputs", None, e))?;
        self.update("fetched_outputs", |s| {
            s.outputs = outputs;
            s.error = None;
        });
        Ok(())
    }

    /// Replace the record status
    pub async fn fetch_record_status(&self) -> Result<(), DeckError> {
        let transport = self
            .transport()
            .map_err(|e| self.fail("record status", None, e))?;
        let status = call_expecting(&*transport, Request::RecordStatus, Response::into_record_status)
            .await
            .map_err(|e| self.fail("record status", None, e))?;
        self.update("polled_record_status", |s| s.record_status = status);
        Ok(())
    }

    /// One preview-loop iteration: previews for every scene and unique
    /// source, plus the output list
    pub async fn refresh_previews(&self) -> Result<(), DeckError> {
        let entities = self.select(Snapshot::entity_names);
        let (previews, outputs) = tokio::join!(
            self.fetch_scene_preview(&entities),
            self.fetch_outputs()
        );
        previews.and(outputs)
    }

    async fn fetch_merge<T, B, E>(
        &self,
        what: &'static str,
        names: &[String],
        make_request: B,
        extract: E,
        field: fn(&mut Snapshot) -> &mut HashMap<String, T>,
    ) -> Result<(), DeckError>
    where
        T: Default,
        B: Fn(&str) -> Request,
        E: Fn(Response) -> Option<T>,
    {
        if names.is_empty() {
            return Ok(());
        }

        let target = || Some(batch_target(names));
        let transport = self.transport().map_err(|e| self.fail(what, target(), e))?;
        let fetched = fetch_batch(&*transport, names, make_request, extract)
            .await
            .map_err(|e| self.fail(what, target(), e))?;

        trace!("Fetched {} for {} entities", what, fetched.len());
        self.update(what, |s| {
            field(s).extend(fetched);
            s.error = None;
        });
        Ok(())
    }

    // ---- point mutations from pushed events ------------------------------

    pub(crate) fn apply_scene_list(&self, scenes: Vec<Scene>) {
        self.update("scene_list_changed", |s| s.replace_scene_list(scenes));
    }

    pub(crate) fn apply_stream_state(&self, active: bool) {
        self.update("stream_state_changed", |s| s.stream_status.active = active);
    }

    pub(crate) fn apply_record_state(&self, active: bool, paused: bool) {
        self.update("record_state_changed", |s| {
            s.record_status.active = active;
            s.record_status.paused = paused;
        });
    }

    pub(crate) fn apply_virtual_cam_state(&self, active: bool) {
        self.update("virtual_cam_state_changed", |s| {
            s.virtual_cam_status.active = active;
        });
    }

    // ---- polling -----------------------------------------------------------

    /// Start (or restart) both poll loops
    pub fn start_polling(self: &Arc<Self>) {
        self.update("started_polling", |s| s.is_polling = true);
        self.poller.start(self.clone());
    }

    /// Stop scheduling further poll iterations. In-flight fetches still land.
    pub fn stop_polling(&self) {
        self.poller.stop();
        self.update("stopped_polling", |s| s.is_polling = false);
    }

    pub(crate) fn is_live(&self) -> bool {
        self.connection.is_connected() && self.connection_state() == ConnectionState::Connected
    }
}
