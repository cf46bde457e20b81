//! Commands sent straight to OBS
//!
//! These bypass the state store; OBS answers with change events and the
//! reconciler picks the new state up from there.

use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::config::RecordingConfig;
use crate::error::DeckError;
use crate::obs::transport::call_expecting;
use crate::obs::{Filter, Request, Response, Transport};

async fn send(transport: &dyn Transport, request: Request) -> Result<(), DeckError> {
    debug!("Sending {}", request.kind());
    call_expecting(transport, request, Response::into_ack).await
}

pub async fn set_filter_enabled(
    transport: &dyn Transport,
    source: &str,
    filter: &str,
    enabled: bool,
) -> Result<(), DeckError> {
    send(
        transport,
        Request::SetSourceFilterEnabled {
            source: source.to_string(),
            filter: filter.to_string(),
            enabled,
        },
    )
    .await
}

/// Flip a filter's enabled flag; returns the new state
pub async fn toggle_filter(
    transport: &dyn Transport,
    source: &str,
    filter: &Filter,
) -> Result<bool, DeckError> {
    let enabled = !filter.enabled;
    set_filter_enabled(transport, source, &filter.name, enabled).await?;
    Ok(enabled)
}

pub async fn rename_filter(
    transport: &dyn Transport,
    source: &str,
    filter: &str,
    new_name: &str,
) -> Result<(), DeckError> {
    send(
        transport,
        Request::SetSourceFilterName {
            source: source.to_string(),
            filter: filter.to_string(),
            new_name: new_name.to_string(),
        },
    )
    .await
}

/// Overlay `settings` onto the filter's current settings
pub async fn set_filter_settings(
    transport: &dyn Transport,
    source: &str,
    filter: &str,
    settings: serde_json::Value,
) -> Result<(), DeckError> {
    send(
        transport,
        Request::SetSourceFilterSettings {
            source: source.to_string(),
            filter: filter.to_string(),
            settings,
            overlay: true,
        },
    )
    .await
}

pub async fn start_record(transport: &dyn Transport) -> Result<(), DeckError> {
    info!("Starting recording");
    send(transport, Request::StartRecord).await
}

pub async fn stop_record(transport: &dyn Transport) -> Result<(), DeckError> {
    info!("Stopping recording");
    send(transport, Request::StopRecord).await
}

/// Name of the record filter owned by `entity`
pub fn record_filter_name(entity: &str) -> String {
    format!("Source Record - {entity}")
}

/// Point every record filter at its own output file, then start recording.
///
/// Each filter of `recording.filter_kind` is renamed after the entity it sits
/// on and its filename formatting set to `<pattern>/<entity>`. Returns the
/// number of filters prepared.
pub async fn prepare_and_start_record(
    transport: &dyn Transport,
    filters: &HashMap<String, Vec<Filter>>,
    recording: &RecordingConfig,
) -> Result<usize, DeckError> {
    let ordered: BTreeMap<&String, &Vec<Filter>> = filters.iter().collect();
    let mut prepared = 0;

    for (entity, filters) in ordered {
        for filter in filters.iter().filter(|f| f.kind == recording.filter_kind) {
            let name = record_filter_name(entity);
            if filter.name != name {
                debug!("Renaming filter {:?} on {} to {:?}", filter.name, entity, name);
                rename_filter(transport, entity, &filter.name, &name).await?;
            }

            let filename = format!("{}/{}", recording.filename_pattern, entity);
            set_filter_settings(
                transport,
                entity,
                &name,
                json!({ "filename_formatting": filename }),
            )
            .await?;
            prepared += 1;
        }
    }

    info!("Prepared {} record filters", prepared);
    start_record(transport).await?;
    Ok(prepared)
}
