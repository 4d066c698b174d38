//! Memory payload decoding
//!
//! The bot writes its metrics into memory as
//! `marker(3 chars) + base64(gzip(json array))`, and the memory endpoint wraps
//! that string in a `{"ok": 1, "data": "..."}` envelope. Decoding is
//! all-or-nothing: any failing stage rejects the whole payload.

use std::collections::HashMap;
use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DecodeError, DecodeStage};

/// Length of the marker the client library puts in front of compressed data.
///
/// The marker is stripped without being checked. Should upstream ever change
/// its length, every payload will fail at the base64 or gzip stage.
pub const MARKER_LEN: usize = 3;

/// One metric entry as written by the bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name, used as is
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,

    /// Sample value; `null` (how `JSON.stringify` writes `NaN`) and a missing
    /// value both read as zero
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: f64,

    /// `"counter"` or anything else for a gauge
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,

    /// Game tick or epoch written by the bot; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

#[derive(Deserialize)]
struct MemoryEnvelope {
    #[serde(default)]
    data: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a memory endpoint response body into metric records
pub fn decode(payload: &str) -> Result<Vec<MetricRecord>, DecodeError> {
    let envelope: MemoryEnvelope = serde_json::from_str(payload)
        .map_err(|e| DecodeError::new(DecodeStage::Envelope, e))?;

    let data = envelope
        .data
        .ok_or_else(|| DecodeError::new(DecodeStage::Envelope, "response has no data"))?;

    decode_data(&data)
}

/// Decode the `data` string of a memory response
pub fn decode_data(data: &str) -> Result<Vec<MetricRecord>, DecodeError> {
    let compressed = decode_base64(strip_marker(data))?;
    let raw = gunzip(&compressed)?;

    serde_json::from_slice(&raw).map_err(|e| DecodeError::new(DecodeStage::Json, e))
}

/// Drop the leading marker; a shorter string leaves nothing behind
fn strip_marker(data: &str) -> &str {
    data.char_indices()
        .nth(MARKER_LEN)
        .map_or("", |(idx, _)| &data[idx..])
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    // Line breaks inside the encoded blob are tolerated.
    let cleaned: Vec<u8> = encoded
        .bytes()
        .filter(|b| !matches!(b, b'\r' | b'\n'))
        .collect();

    STANDARD
        .decode(cleaned)
        .map_err(|e| DecodeError::new(DecodeStage::Base64, e))
}

fn gunzip(compressed: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if compressed.is_empty() {
        return Err(DecodeError::new(DecodeStage::Gzip, "empty gzip stream"));
    }

    let mut raw = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::new(DecodeStage::Gzip, e))?;
    Ok(raw)
}
