//! Decoding of preview frames returned by OBS

use anyhow::{Context, Result};
use base64::Engine;
use tracing::trace;

/// Average brightness below which a frame counts as blank
const BLANK_THRESHOLD: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    /// Mostly black, e.g. a capture source with nothing to show
    pub blank: bool,
}

/// Decode a screenshot (`data:image/...;base64,` URI or bare base64)
pub fn inspect(encoded: &str) -> Result<FrameInfo> {
    let payload = match encoded.strip_prefix("data:") {
        Some(uri) => uri
            .split_once(',')
            .map(|(_, data)| data)
            .context("Malformed data URI")?,
        None => encoded,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("Failed to decode screenshot")?;

    let img = image::load_from_memory(&bytes).context("Failed to load screenshot image")?;

    let gray = img.to_luma8();
    let pixel_count = (gray.width() as u64 * gray.height() as u64).max(1);
    let total_brightness: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let average_brightness = total_brightness / pixel_count;

    trace!("Preview frame avg_brightness={}", average_brightness);

    Ok(FrameInfo {
        width: img.width(),
        height: img.height(),
        blank: average_brightness < BLANK_THRESHOLD,
    })
}
