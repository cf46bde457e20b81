//! Applies pushed OBS events to the state store
//!
//! One task drains the event queue in order. Events that carry their new
//! state are written straight into the store; filter and scene-item events
//! re-fetch just the entity they name.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::obs::EngineEvent;
use crate::store::StateStore;

pub struct Reconciler {
    store: Arc<StateStore>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Reconciler {
    /// Start consuming `events` on a background task
    pub fn spawn(
        store: Arc<StateStore>,
        events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(Self { store, events }.run())
    }

    async fn run(mut self) {
        debug!("Event reconciler started");
        while let Some(event) = self.events.recv().await {
            if !self.apply(event).await {
                break;
            }
        }
        debug!("Event reconciler stopped");
    }

    /// Returns false once the connection is gone
    async fn apply(&self, event: EngineEvent) -> bool {
        debug!(?event, "OBS event");

        if let Some(source) = event.filter_source() {
            let target = [source.to_string()];
            if let Err(e) = self.store.fetch_scene_filters(&target).await {
                debug!("Filter refresh after event failed: {}", e);
            }
            return true;
        }

        match event {
            EngineEvent::SceneListChanged { scenes } => self.store.apply_scene_list(scenes),
            EngineEvent::SceneItemAdded { scene } | EngineEvent::SceneItemRemoved { scene } => {
                if let Err(e) = self.store.fetch_scene_sources(&[scene]).await {
                    debug!("Source refresh after event failed: {}", e);
                }
            }
            EngineEvent::StreamStateChanged { active } => self.store.apply_stream_state(active),
            EngineEvent::RecordStateChanged { active, paused } => {
                info!("Recording active={} paused={}", active, paused);
                self.store.apply_record_state(active, paused);
            }
            EngineEvent::VirtualCamStateChanged { active } => {
                self.store.apply_virtual_cam_state(active)
            }
            EngineEvent::ConnectionClosed => {
                self.store.mark_disconnected();
                return false;
            }
            // Filter events were handled above
            _ => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::obs::mock::{filter, scene, source, MockTransport};
    use crate::obs::EngineEvent;
    use crate::store::test_support::connected_store;
    use crate::store::{ConnectionState, Snapshot};
    use std::time::Duration;
    use tokio::sync::watch;

    async fn wait_until(rx: &mut watch::Receiver<Snapshot>, f: impl FnMut(&Snapshot) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
            .await
            .expect("store never reached the expected state")
            .expect("store dropped");
    }

    #[tokio::test]
    async fn test_scene_item_removed_refetches_that_scene_only() {
        let transport = MockTransport::two_scenes();
        let store = connected_store(transport.clone()).await;
        store.fetch_scenes().await.unwrap();
        let backup_before = store.scene_sources()["Backup"].clone();
        let mut rx = store.subscribe();

        transport
            .state
            .lock()
            .scene_items
            .insert("Main".into(), vec![source("Camera", 1)]);
        transport.push_event(EngineEvent::SceneItemRemoved {
            scene: "Main".into(),
        });

        wait_until(&mut rx, |s| s.scene_sources["Main"].len() == 1).await;
        assert_eq!(
            transport.batches_of("GetSceneItemList").last().unwrap(),
            &vec!["Main".to_string()]
        );
        assert_eq!(store.scene_sources()["Backup"], backup_before);
    }

    #[tokio::test]
    async fn test_filter_event_refetches_its_source() {
        let transport = MockTransport::two_scenes();
        let store = connected_store(transport.clone()).await;
        let mut rx = store.subscribe();

        transport
            .state
            .lock()
            .filters
            .insert("Camera".into(), vec![filter("Color", "color_filter", false)]);
        transport.push_event(EngineEvent::FilterEnableChanged {
            source: "Camera".into(),
            enabled: false,
        });

        wait_until(&mut rx, |s| {
            s.scene_filters
                .get("Camera")
                .is_some_and(|f| !f[0].enabled)
        })
        .await;
        assert_eq!(
            transport.batches_of("GetSourceFilterList"),
            vec![vec!["Camera".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_state_events_apply_payloads_in_order() {
        let transport = MockTransport::two_scenes();
        let store = connected_store(transport.clone()).await;
        let mut rx = store.subscribe();

        transport.push_event(EngineEvent::StreamStateChanged { active: true });
        transport.push_event(EngineEvent::RecordStateChanged {
            active: true,
            paused: false,
        });
        transport.push_event(EngineEvent::VirtualCamStateChanged { active: true });
        transport.push_event(EngineEvent::SceneListChanged {
            scenes: vec![scene("Only", 0)],
        });

        wait_until(&mut rx, |s| s.scenes.len() == 1).await;
        let snapshot = store.snapshot();
        assert!(snapshot.stream_status.active);
        assert!(snapshot.record_status.active);
        assert!(snapshot.virtual_cam_status.active);
        assert_eq!(snapshot.scenes[0].name, "Only");
        // Payload events never hit the transport
        assert!(transport.state.lock().batches.is_empty());
    }

    #[tokio::test]
    async fn test_connection_closed_marks_store_disconnected() {
        let transport = MockTransport::two_scenes();
        let store = connected_store(transport.clone()).await;
        let mut rx = store.subscribe();

        transport.push_event(EngineEvent::ConnectionClosed);

        wait_until(&mut rx, |s| s.connection_state == ConnectionState::Disconnected).await;
        assert!(store.error().is_some());
    }
}
