//! Byte-bounded response envelopes.
//!
//! Large catalogs are split across envelopes so a single response never
//! exceeds the caller's byte budget. Packing is greedy over the serialized
//! size of each item; the first item of a chunk is always placed so an
//! oversized single item still makes forward progress. Each envelope's
//! `chunk.bytes` records the exact UTF-8 length of its own serialized form.

use serde::Serialize;

use crate::error::Result;

/// Response schema version.
pub const SCHEMA_VERSION: &str = "0.1";

/// Requested budgets below this are raised to it.
pub const MIN_CHUNK_BYTES: usize = 8_192;

/// Capture metadata: which site, observed when.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capture {
    #[serde(rename = "siteId")]
    pub site_id: u64,
    pub ts: i64,
}

/// Chunk position and size accounting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChunkInfo {
    pub index: usize,
    pub of: usize,
    pub bytes: usize,
}

/// One size-bounded response unit.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(rename = "schemaVersion")]
    pub schema_version: String,
    pub capture: Capture,
    pub chunk: ChunkInfo,
    pub devices: Vec<T>,
}

impl<T> Envelope<T> {
    /// Envelope skeleton with an empty payload and a zeroed byte count.
    pub fn skeleton(capture: Capture, index: usize, of: usize) -> Self {
        Self {
            ok: true,
            schema_version: SCHEMA_VERSION.to_string(),
            capture,
            chunk: ChunkInfo {
                index,
                of,
                bytes: 0,
            },
            devices: Vec::new(),
        }
    }
}

/// Split `items` into byte-bounded envelopes.
///
/// The effective budget is `max(MIN_CHUNK_BYTES, max_bytes)` and bounds the
/// summed serialized size of a chunk's items. An empty input still emits one
/// envelope with an empty payload. `chunk.bytes` is measured over the
/// envelope serialized with the placeholder byte count, then written in
/// place.
pub fn chunk_envelopes<T, F>(items: Vec<T>, make_envelope: F, max_bytes: usize) -> Result<Vec<Envelope<T>>>
where
    T: Serialize,
    F: Fn(usize, usize) -> Envelope<T>,
{
    let budget = max_bytes.max(MIN_CHUNK_BYTES);

    let mut chunks: Vec<Vec<T>> = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_bytes = 0usize;

    for item in items {
        let item_bytes = serde_json::to_string(&item)?.len();
        if !current.is_empty() && current_bytes + item_bytes > budget {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current.push(item);
        current_bytes += item_bytes;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    // Never zero envelopes: an empty catalog is still a well-formed response.
    if chunks.is_empty() {
        chunks.push(Vec::new());
    }

    let total = chunks.len();
    let mut envelopes = Vec::with_capacity(total);
    for (index, payload) in chunks.into_iter().enumerate() {
        let mut envelope = make_envelope(index, total);
        envelope.devices = payload;
        envelope.chunk.bytes = 0;
        let bytes = serde_json::to_string(&envelope)?.len();
        envelope.chunk.bytes = bytes;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}
