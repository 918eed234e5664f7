//! # docvault
//!
//! Single-file, envelope-encrypted, path-addressable JSON document store.
//!
//! The whole application state lives in one JSON document. On disk it is
//! encrypted under a per-file master key, and that master key is itself
//! wrapped under a wrapping key supplied by configuration. Values are read
//! and written by dotted path (`config.port`, `analytics.requests.all`), and
//! every mutation re-encrypts and atomically replaces the file.
//!
//! ## Public API
//!
//! The public surface of this crate is intentionally narrow. Only the types
//! and functions listed here are intended for use by callers. Everything else
//! is `pub(crate)` at most.
//!
//! ## Deployment
//!
//! One writer process per file. Two processes opening the same file will
//! overwrite each other's saves; nothing here prevents it.

// Module declarations.
pub(crate) mod crypto;
pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod path;
pub mod payload;
pub mod store;

pub use config::StoreConfig;
pub use error::{Blob, StoreError};
pub use keys::{MasterKey, WrappingKey};
pub use store::{Phase, Store};

/// The root of a store: a mapping from string keys to JSON values.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Generate a cryptographically secure master key.
///
/// A store calls this itself when it creates a fresh file; it is exposed for
/// callers that drive [`payload`] and [`keys`] directly.
pub fn generate_master_key() -> Result<MasterKey, StoreError> {
    keys::generate()
}
