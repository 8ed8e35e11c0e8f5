//! Scanner payload decoding: base64 text wrapping a JSON array of
//! `{"scanResults": ...}` objects.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::scan_result::{ScanResult, ScanResultsWrapper};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("error decoding base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("error unmarshaling JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a base64 payload into scan results, preserving array order.
///
/// Line breaks inserted by the contents API are ignored. Any malformed
/// element fails the whole payload.
pub fn decode_scan_results(blob: &str) -> Result<Vec<ScanResult>, DecodeError> {
    let compact: String = blob.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let json = STANDARD.decode(compact)?;

    let wrappers: Vec<ScanResultsWrapper> = serde_json::from_slice(&json)?;
    Ok(wrappers.into_iter().map(|w| w.scan_results).collect())
}
