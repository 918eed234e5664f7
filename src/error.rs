//! Error types for docvault.
//!
//! Every error variant is a distinct failure mode of the store. Error
//! messages are intentionally minimal: they signal *what* failed without
//! revealing key material or plaintext.

use std::fmt;
use std::io;
use std::sync::Arc;

/// Which sealed blob of the envelope failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blob {
    /// The wrapped master key in `_meta.key`.
    WrappedKey,
    /// The encrypted document in `payload`.
    Payload,
}

impl fmt::Display for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrappedKey => write!(f, "wrapped key"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

/// The single error type for all docvault operations.
///
/// `Clone` so that a store in the `Fault` phase can hand the same error to
/// every later caller.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// A cryptographic key was invalid (wrong length, malformed, etc.).
    InvalidKey,

    /// The system's random number generator failed to produce bytes.
    RandomnessFailure,

    /// Encryption failed. The underlying `ring` operation returned an error.
    EncryptionFailure,

    /// Authentication failed while unwrapping the master key or decrypting
    /// the payload: tampering, corruption, or the wrong wrapping key.
    Integrity(Blob),

    /// The store file could not be read or written.
    Io(Arc<io::Error>),

    /// The envelope or the decrypted payload is not a valid document.
    Parse(String),

    /// An arithmetic update produced a number JSON cannot represent.
    NonFiniteNumber,

    /// A path indexes more than one element past the end of a sequence.
    IndexOutOfRange { index: usize, len: usize },
}

impl StoreError {
    /// True for authentication failures on either blob.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid key"),
            Self::RandomnessFailure => write!(f, "randomness source failed"),
            Self::EncryptionFailure => write!(f, "encryption failed"),
            Self::Integrity(blob) => write!(f, "integrity check failed: {}", blob),
            Self::Io(err) => write!(f, "store file i/o failed: {}", err),
            Self::Parse(reason) => write!(f, "malformed store: {}", reason),
            Self::NonFiniteNumber => write!(f, "result is not a finite number"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {} out of range for sequence of length {}", index, len)
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
