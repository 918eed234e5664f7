//! Store configuration.
//!
//! The file location and the wrapping key are the only inputs a store
//! takes. Nothing is read from the environment; the embedding application
//! decides where the wrapping secret comes from (a keystore, an injected
//! secret file, an operator prompt) and hands it over here.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::keys::WrappingKey;

/// Where the store lives and what its master key is wrapped under.
pub struct StoreConfig {
    path: PathBuf,
    wrapping_key: WrappingKey,
}

impl StoreConfig {
    /// File name used by [`StoreConfig::with_default_path`].
    pub const DEFAULT_FILE: &'static str = "secure.db";

    pub fn new(path: impl Into<PathBuf>, wrapping_key: WrappingKey) -> Self {
        Self {
            path: path.into(),
            wrapping_key,
        }
    }

    /// A store at `./secure.db`.
    pub fn with_default_path(wrapping_key: WrappingKey) -> Self {
        Self::new(Self::DEFAULT_FILE, wrapping_key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn wrapping_key(&self) -> &WrappingKey {
        &self.wrapping_key
    }

    /// Path of the scratch file written before the atomic rename.
    pub(crate) fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| Self::DEFAULT_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("wrapping_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_sits_beside_store() {
        let config = StoreConfig::new("/var/lib/site/state.db", WrappingKey::from_bytes([0u8; 32]));
        assert_eq!(config.staging_path(), PathBuf::from("/var/lib/site/state.db.tmp"));

        let config = StoreConfig::with_default_path(WrappingKey::from_bytes([0u8; 32]));
        assert_eq!(config.path(), Path::new("secure.db"));
        assert_eq!(config.staging_path(), PathBuf::from("secure.db.tmp"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = StoreConfig::new("x.db", WrappingKey::from_bytes([0xAB; 32]));
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("171"));
    }
}
