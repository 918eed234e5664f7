//! The on-disk record.
//!
//! A store file holds exactly one JSON object:
//!
//! ```text
//! { "_meta": { "key": "<base64 wrapped master key>" },
//!   "payload": "<base64 encrypted document>" }
//! ```
//!
//! Both blobs use the `crypto` byte layout (nonce, ciphertext, tag) and
//! standard padded base64 as their text form.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Blob, StoreError};

/// Key-management metadata stored beside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// The wrapped master key.
    pub key: String,
}

/// The complete contents of a store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "_meta")]
    pub meta: Meta,
    /// The encrypted document.
    pub payload: String,
}

impl Envelope {
    pub fn new(wrapped_key: String, payload: String) -> Self {
        Self {
            meta: Meta { key: wrapped_key },
            payload,
        }
    }

    /// Serialize to the exact bytes written to disk.
    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a store file. Anything other than `{_meta: {key}, payload}` is a
    /// parse error; the blobs themselves are not checked here.
    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Parse(format!("envelope: {}", e)))
    }
}

/// Text-encode a sealed blob.
pub fn encode_blob(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a sealed blob. Text that is not valid base64 has been corrupted,
/// so it is reported as an integrity failure on `blob`.
pub fn decode_blob(text: &str, blob: Blob) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(text)
        .map_err(|_| StoreError::Integrity(blob))
}
