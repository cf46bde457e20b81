//! Entity types mirrored from OBS

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scene in the scene collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    /// Position in the scene list as reported by OBS
    pub index: usize,
}

/// Pixel dimensions of a source, when OBS reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A source as positioned inside a scene (a scene item)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    /// Stable id shared by every scene item that points at the same source
    pub uuid: Uuid,
    /// Input kind (`browser_source`, `ffmpeg_source`, ...); `None` for nested scenes
    pub input_kind: Option<String>,
    /// Scene item id, unique only within the owning scene
    pub item_id: i64,
    pub index: u32,
    pub dimensions: Option<Dimensions>,
}

/// A filter attached to a scene or a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub index: u32,
    /// Filter-kind specific settings, kept as-is
    pub settings: serde_json::Value,
}

/// Capability flags of an output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFlags {
    pub video: bool,
    pub audio: bool,
    pub encoded: bool,
    pub multi_track: bool,
    pub service: bool,
}

impl OutputFlags {
    /// Names of the flags that are set, in a fixed order
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.video, "VIDEO"),
            (self.audio, "AUDIO"),
            (self.encoded, "ENCODED"),
            (self.multi_track, "MULTI_TRACK"),
            (self.service, "SERVICE"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect()
    }
}

/// An OBS output (recording, streaming, source-record filters, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub flags: OutputFlags,
    pub active: bool,
}

/// Recording output status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    pub active: bool,
    pub paused: bool,
    /// Elapsed time formatted as `HH:MM:SS.mmm`
    pub timecode: String,
    pub bytes: u64,
}

/// Streaming output status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub active: bool,
}

/// Virtual camera status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCamStatus {
    pub active: bool,
}

/// Format an elapsed duration in milliseconds the way OBS prints timecodes
pub fn format_timecode(elapsed_ms: u64) -> String {
    let hours = elapsed_ms / 3_600_000;
    let minutes = (elapsed_ms / 60_000) % 60;
    let seconds = (elapsed_ms / 1000) % 60;
    let millis = elapsed_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timecode() {
        assert_eq!(format_timecode(0), "00:00:00.000");
        assert_eq!(format_timecode(3_723_045), "01:02:03.045");
    }

    #[test]
    fn test_output_flag_labels() {
        let flags = OutputFlags {
            video: true,
            audio: true,
            encoded: false,
            multi_track: false,
            service: true,
        };
        assert_eq!(flags.labels(), vec!["VIDEO", "AUDIO", "SERVICE"]);
        assert!(OutputFlags::default().labels().is_empty());
    }
}
