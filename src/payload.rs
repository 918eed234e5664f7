//! Whole-document encryption.
//!
//! The entire document is serialized, sealed under the master key and
//! text-encoded on every save. There is no partial or sectioned encryption:
//! document size bounds save cost.

use serde_json::Value;
use zeroize::Zeroizing;

use crate::crypto::{self, PAYLOAD_AAD};
use crate::envelope;
use crate::error::{Blob, StoreError};
use crate::keys::MasterKey;
use crate::Document;

/// Serialize and encrypt `doc`, returning the text-encoded payload blob.
pub fn encrypt(doc: &Document, master: &MasterKey) -> Result<String, StoreError> {
    let plaintext = serde_json::to_vec(doc)?;
    encrypt_bytes(&plaintext, master)
}

/// Encrypt already-serialized plaintext.
pub fn encrypt_bytes(plaintext: &[u8], master: &MasterKey) -> Result<String, StoreError> {
    let sealed = crypto::seal(master.as_bytes(), PAYLOAD_AAD, plaintext)?;
    Ok(envelope::encode_blob(&sealed))
}

/// Decrypt a payload blob back into its plaintext bytes.
///
/// The tag is checked before anything is returned.
pub fn decrypt_bytes(blob: &str, master: &MasterKey) -> Result<Zeroizing<Vec<u8>>, StoreError> {
    let sealed = envelope::decode_blob(blob, Blob::Payload)?;
    crypto::open(master.as_bytes(), PAYLOAD_AAD, &sealed, Blob::Payload)
}

/// Decrypt a payload blob into a document.
///
/// Authentication failures are `Integrity`; plaintext that authenticates but
/// is not a JSON object is `Parse`.
pub fn decrypt(blob: &str, master: &MasterKey) -> Result<Document, StoreError> {
    let plaintext = decrypt_bytes(blob, master)?;
    match serde_json::from_slice::<Value>(&plaintext)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Parse(format!(
            "document root must be an object, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
