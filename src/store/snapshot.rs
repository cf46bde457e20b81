//! The observable snapshot of OBS state

use std::collections::{HashMap, HashSet};

use crate::obs::{Filter, Output, RecordStatus, Scene, Source, StreamStatus, VirtualCamStatus};

/// Connection lifecycle as seen by the presentation layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Everything the store knows about OBS at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Bumped on every mutation
    pub version: u64,
    pub scenes: Vec<Scene>,
    /// Scene name → sources positioned in that scene
    pub scene_sources: HashMap<String, Vec<Source>>,
    /// Entity (scene or source) name → its filters
    pub scene_filters: HashMap<String, Vec<Filter>>,
    /// Entity name → last rendered frame
    pub scene_previews: HashMap<String, String>,
    pub outputs: Vec<Output>,
    pub record_status: RecordStatus,
    pub stream_status: StreamStatus,
    pub virtual_cam_status: VirtualCamStatus,
    pub connection_state: ConnectionState,
    /// Last failure, shared by every operation (last write wins)
    pub error: Option<String>,
    pub is_polling: bool,
}

impl Snapshot {
    pub fn scene_names(&self) -> Vec<String> {
        self.scenes.iter().map(|s| s.name.clone()).collect()
    }

    /// Flatten all scene sources and keep the first occurrence of each uuid.
    ///
    /// Scenes are visited in scene-list order, then any sources of scenes no
    /// longer in the list, sorted by scene name.
    pub fn unique_scene_sources(&self) -> Vec<Source> {
        let mut order: Vec<&str> = self.scenes.iter().map(|s| s.name.as_str()).collect();
        let mut rest: Vec<&str> = self
            .scene_sources
            .keys()
            .map(String::as_str)
            .filter(|name| !order.contains(name))
            .collect();
        rest.sort_unstable();
        order.extend(rest);

        let mut seen = HashSet::new();
        order
            .into_iter()
            .filter_map(|scene| self.scene_sources.get(scene))
            .flatten()
            .filter(|source| seen.insert(source.uuid))
            .cloned()
            .collect()
    }

    /// Scene names followed by unique source names, without repeats
    pub fn entity_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.scene_names()
            .into_iter()
            .chain(self.unique_scene_sources().into_iter().map(|s| s.name))
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Filters of every entity with the given kind, enabled ones only
    pub fn enabled_filters_of_kind(&self, kind: &str) -> usize {
        self.scene_filters
            .values()
            .flatten()
            .filter(|f| f.kind == kind && f.enabled)
            .count()
    }

    /// Outputs named after one of `entity`'s filters
    pub fn outputs_for(&self, entity: &str) -> Vec<&Output> {
        let Some(filters) = self.scene_filters.get(entity) else {
            return Vec::new();
        };
        self.outputs
            .iter()
            .filter(|o| filters.iter().any(|f| f.name == o.name))
            .collect()
    }

    /// Replace the scene list and drop state keyed by entities that vanished
    pub(crate) fn replace_scene_list(&mut self, scenes: Vec<Scene>) {
        self.scenes = scenes;
        let scene_names: HashSet<String> = self.scene_names().into_iter().collect();
        self.scene_sources.retain(|name, _| scene_names.contains(name));

        let known: HashSet<String> = self.entity_names().into_iter().collect();
        self.scene_filters.retain(|name, _| known.contains(name));
        self.scene_previews.retain(|name, _| known.contains(name));
    }
}
