//! Batched per-entity requests
//!
//! Every sub-request is tagged with the entity name it concerns, so the
//! response can be mapped back onto names no matter what order OBS answers in.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::transport::{BatchRequest, BatchResponse, Request, Response, Transport};
use crate::error::DeckError;

/// One sub-request per distinct id, tagged with the id itself
pub fn build_batch<F>(ids: &[String], make_request: F) -> Vec<BatchRequest>
where
    F: Fn(&str) -> Request,
{
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .map(|id| BatchRequest {
            request_id: id.clone(),
            request: make_request(id.as_str()),
        })
        .collect()
}

/// Map batch results back onto the submitted ids.
///
/// Correlation is by `request_id` only. Ids whose sub-request failed, came
/// back with the wrong payload or is missing from the response get
/// `T::default()`.
pub fn demux<T, F>(requests: &[BatchRequest], responses: Vec<BatchResponse>, extract: F) -> HashMap<String, T>
where
    T: Default,
    F: Fn(Response) -> Option<T>,
{
    let mut results: HashMap<String, T> = HashMap::with_capacity(requests.len());

    for response in responses {
        if !requests.iter().any(|r| r.request_id == response.request_id) {
            debug!("Ignoring batch result for unknown id {:?}", response.request_id);
            continue;
        }
        let value = match response.result {
            Ok(payload) => extract(payload).unwrap_or_else(|| {
                debug!("Unexpected payload in batch for {:?}", response.request_id);
                T::default()
            }),
            Err(message) => {
                debug!("Batch sub-request for {:?} failed: {}", response.request_id, message);
                T::default()
            }
        };
        results.insert(response.request_id, value);
    }

    for request in requests {
        results.entry(request.request_id.clone()).or_insert_with(|| {
            debug!("No batch result for {:?}", request.request_id);
            T::default()
        });
    }

    results
}

/// Fetch one value per id in a single batch call.
///
/// An empty id list resolves immediately without touching the transport.
pub async fn fetch_batch<T, B, E>(
    transport: &dyn Transport,
    ids: &[String],
    make_request: B,
    extract: E,
) -> Result<HashMap<String, T>, DeckError>
where
    T: Default,
    B: Fn(&str) -> Request,
    E: Fn(Response) -> Option<T>,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let requests = build_batch(ids, make_request);
    let responses = transport.call_batch(requests.clone()).await?;
    Ok(demux(&requests, responses, extract))
}
