//! Master key generation and wrapping.
//!
//! This module owns two responsibilities:
//! 1. Holding key material in types that are opaque, non-cloneable, and
//!    zeroised on drop.
//! 2. Wrapping the per-file master key under a separate wrapping key, so the
//!    raw master key never reaches disk in the clear.
//!
//! This is one of exactly two modules permitted to import `ring` directly
//! (the other is `crypto`). HKDF lives here because it operates on key
//! material itself, not on ciphertexts.
//!
//! ## Wrapping key derivation
//!
//! ```text
//! HKDF-SHA256(
//!     ikm  = operator secret,
//!     salt = None,
//!     info = "docvault:wrapping-key:v1"
//! )
//! ```
//!
//! The operator secret must already be high-entropy (a keystore entry, a
//! generated token). HKDF is not a password hash.

use ring::hkdf;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, KEY_LEN, KEY_WRAP_AAD};
use crate::envelope;
use crate::error::{Blob, StoreError};

const WRAPPING_INFO: &[u8] = b"docvault:wrapping-key:v1";

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// The symmetric key that encrypts one store file's document.
///
/// - Not `Clone`. A store instance holds exactly one for its lifetime.
/// - Zeroised on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Construct a `MasterKey` from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Borrow the raw key bytes for payload encryption.
    ///
    /// `pub(crate)`: raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Wrapping key
// ---------------------------------------------------------------------------

/// The secret a master key is wrapped under.
///
/// Supplied by configuration, never derived from the document or stored in
/// the envelope.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct WrappingKey {
    bytes: [u8; KEY_LEN],
}

impl WrappingKey {
    /// Use 32 raw bytes as the wrapping key.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Derive a wrapping key from an operator-provided secret of any length.
    pub fn derive(secret: &[u8]) -> Result<Self, StoreError> {
        if secret.is_empty() {
            return Err(StoreError::InvalidKey);
        }

        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]);
        let prk = salt.extract(secret);

        let info = [WRAPPING_INFO];
        let okm = prk
            .expand(&info, hkdf::HKDF_SHA256)
            .map_err(|_| StoreError::InvalidKey)?;

        let mut bytes = [0u8; KEY_LEN];
        okm.fill(&mut bytes).map_err(|_| StoreError::InvalidKey)?;
        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WrappingKey(..)")
    }
}

// ---------------------------------------------------------------------------
// Generate / wrap / unwrap
// ---------------------------------------------------------------------------

/// Generate a fresh random 256-bit master key.
pub fn generate() -> Result<MasterKey, StoreError> {
    let bytes = crypto::generate_random_key()?;
    Ok(MasterKey::from_bytes(bytes))
}

/// Seal the master key under the wrapping key and text-encode the result.
///
/// Every call draws a fresh nonce, so wrapping the same key twice yields two
/// different blobs.
pub fn wrap(master: &MasterKey, wrapping: &WrappingKey) -> Result<String, StoreError> {
    let sealed = crypto::seal(wrapping.as_bytes(), KEY_WRAP_AAD, master.as_bytes())?;
    Ok(envelope::encode_blob(&sealed))
}

/// Recover a master key from a blob produced by [`wrap`].
///
/// Fails with `Integrity(WrappedKey)` for a wrong wrapping key or a
/// corrupted blob.
pub fn unwrap(blob: &str, wrapping: &WrappingKey) -> Result<MasterKey, StoreError> {
    let sealed = envelope::decode_blob(blob, Blob::WrappedKey)?;
    let plain = crypto::open(wrapping.as_bytes(), KEY_WRAP_AAD, &sealed, Blob::WrappedKey)?;

    let bytes: [u8; KEY_LEN] = plain
        .as_slice()
        .try_into()
        .map_err(|_| StoreError::Integrity(Blob::WrappedKey))?;
    Ok(MasterKey::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let wrapping = WrappingKey::from_bytes([3u8; KEY_LEN]);
        let master = MasterKey::from_bytes([9u8; KEY_LEN]);
        let blob = wrap(&master, &wrapping).unwrap();
        let recovered = unwrap(&blob, &wrapping).unwrap();
        assert_eq!(recovered.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_wrap_is_randomised() {
        let wrapping = WrappingKey::from_bytes([3u8; KEY_LEN]);
        let master = MasterKey::from_bytes([9u8; KEY_LEN]);
        assert_ne!(wrap(&master, &wrapping).unwrap(), wrap(&master, &wrapping).unwrap());
    }

    #[test]
    fn test_unwrap_with_wrong_wrapping_key_fails() {
        let master = generate().unwrap();
        let blob = wrap(&master, &WrappingKey::from_bytes([1u8; KEY_LEN])).unwrap();
        let result = unwrap(&blob, &WrappingKey::from_bytes([2u8; KEY_LEN]));
        assert!(matches!(result, Err(StoreError::Integrity(Blob::WrappedKey))));
    }

    #[test]
    fn test_derive_is_deterministic_and_secret_dependent() {
        let a = WrappingKey::derive(b"operator secret one").unwrap();
        let b = WrappingKey::derive(b"operator secret one").unwrap();
        let c = WrappingKey::derive(b"operator secret two").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
        assert!(WrappingKey::derive(b"").is_err());
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(generate().unwrap().as_bytes(), generate().unwrap().as_bytes());
    }
}
