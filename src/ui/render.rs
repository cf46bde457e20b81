//! Text rendering of a store snapshot

use std::fmt::Write;

use super::preview;
use crate::obs::{Filter, Output, Source};
use crate::store::{ConnectionState, Snapshot};

/// Glyph for a source's input kind; scenes nested as sources have none
pub fn source_icon(input_kind: Option<&str>) -> &'static str {
    match input_kind {
        Some("image_source") => "🖼",
        Some("color_source_v3") => "🖌",
        Some("slideshow_v2") => "🎞",
        Some("av_capture_input_v2" | "macos-avcapture" | "macos-avcapture-fast") => "📷",
        Some("screen_capture" | "display_capture" | "window_capture" | "syphon-input") => "🪟",
        Some("sck_audio_capture" | "coreaudio_input_capture") => "🎤",
        Some("coreaudio_output_capture") => "🔊",
        Some("browser_source") => "🌐",
        Some("ffmpeg_source") => "🎬",
        Some("text_ft2_source_v2") => "🔤",
        Some(_) => "•",
        None => "▣",
    }
}

fn lamp(active: bool) -> &'static str {
    if active {
        "●"
    } else {
        "○"
    }
}

fn status_bar(out: &mut String, snapshot: &Snapshot) {
    let connected = snapshot.connection_state == ConnectionState::Connected;
    let record = &snapshot.record_status;
    let mut record_label = lamp(record.active).to_string();
    if record.active {
        let _ = write!(record_label, " {}", record.timecode);
        if record.paused {
            record_label.push_str(" (paused)");
        }
    }
    let _ = writeln!(
        out,
        "OBS {} | Stream {} | Record {} | Virtual Cam {}",
        lamp(connected),
        lamp(snapshot.stream_status.active),
        record_label,
        lamp(snapshot.virtual_cam_status.active),
    );
}

fn preview_line(snapshot: &Snapshot, entity: &str) -> String {
    match snapshot.scene_previews.get(entity) {
        None => "no preview".to_string(),
        Some(frame) if frame.is_empty() => "no preview".to_string(),
        Some(frame) => match preview::inspect(frame) {
            Ok(info) if info.blank => format!("preview {}x{} (blank)", info.width, info.height),
            Ok(info) => format!("preview {}x{}", info.width, info.height),
            Err(_) => "preview unreadable".to_string(),
        },
    }
}

fn sources_section(out: &mut String, sources: &[Source]) {
    let _ = writeln!(out, "  sources:");
    if sources.is_empty() {
        let _ = writeln!(out, "    (none)");
    }
    for source in sources {
        let _ = write!(out, "    {} {}", source_icon(source.input_kind.as_deref()), source.name);
        if let Some(dim) = &source.dimensions {
            let _ = write!(out, " {}x{}", dim.width, dim.height);
        }
        out.push('\n');
    }
}

fn filters_section(out: &mut String, filters: &[Filter]) {
    if filters.is_empty() {
        return;
    }
    let _ = writeln!(out, "  filters:");
    for filter in filters {
        let state = if filter.enabled { "on " } else { "off" };
        let _ = writeln!(out, "    [{}] {} ({})", state, filter.name, filter.kind);
    }
}

fn outputs_section(out: &mut String, outputs: &[&Output]) {
    if outputs.is_empty() {
        return;
    }
    let _ = writeln!(out, "  outputs:");
    for output in outputs {
        let _ = writeln!(
            out,
            "    {} {} ({}) {}x{} [{}]",
            lamp(output.active),
            output.name,
            output.kind,
            output.width,
            output.height,
            output.flags.labels().join(", ")
        );
    }
}

/// Render the whole view.
///
/// When not connected, or when the last operation failed, the error takes
/// the place of the scene list.
pub fn render(snapshot: &Snapshot, record_filter_kind: &str) -> String {
    let mut out = String::new();
    status_bar(&mut out, snapshot);

    let connected = snapshot.connection_state == ConnectionState::Connected;
    if !connected || snapshot.error.is_some() {
        let message = snapshot.error.as_deref().unwrap_or(match snapshot.connection_state {
            ConnectionState::Connecting => "Connecting to OBS...",
            _ => "Not connected to OBS",
        });
        let _ = writeln!(out, "\n{}", message);
        return out;
    }

    let _ = writeln!(
        out,
        "Record {} scenes",
        snapshot.enabled_filters_of_kind(record_filter_kind)
    );

    for scene in &snapshot.scenes {
        let _ = writeln!(out, "\n{}", scene.name);
        let _ = writeln!(out, "  {}", preview_line(snapshot, &scene.name));
        let sources = snapshot
            .scene_sources
            .get(&scene.name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        sources_section(&mut out, sources);
        if let Some(filters) = snapshot.scene_filters.get(&scene.name) {
            filters_section(&mut out, filters);
        }
        outputs_section(&mut out, &snapshot.outputs_for(&scene.name));
    }

    let unique = snapshot.unique_scene_sources();
    if !unique.is_empty() {
        let _ = writeln!(out, "\nSources");
        for source in &unique {
            let _ = writeln!(
                out,
                "  {} {} - {}",
                source_icon(source.input_kind.as_deref()),
                source.name,
                preview_line(snapshot, &source.name)
            );
            if let Some(filters) = snapshot.scene_filters.get(&source.name) {
                for filter in filters {
                    let state = if filter.enabled { "on " } else { "off" };
                    let _ = writeln!(out, "      [{}] {}", state, filter.name);
                }
            }
        }
    }

    out
}
