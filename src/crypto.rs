//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that import `ring`
//! directly (the other is `keys`). Key wrapping and payload encryption both
//! go through the functions exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM (authenticated encryption)
//! - **Nonce**: 96-bit (12 bytes), generated fresh per operation via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::error::{Blob, StoreError};

/// The AEAD algorithm used for every sealed blob.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of the nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Size of a master or wrapping key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Associated data bound into a wrapped master key.
pub(crate) const KEY_WRAP_AAD: &[u8] = b"docvault:key-wrap:v1";

/// Associated data bound into an encrypted document payload.
pub(crate) const PAYLOAD_AAD: &[u8] = b"docvault:payload:v1";

/// A nonce generated for a single encryption operation.
/// Consumed on use, so it cannot be handed to a second `seal` call.
struct OwnedNonce(Nonce);

fn generate_nonce() -> Result<OwnedNonce, StoreError> {
    let rng = SystemRandom::new();
    let mut buf = [0u8; NONCE_LEN];
    rng.fill(&mut buf).map_err(|_| StoreError::RandomnessFailure)?;
    Ok(OwnedNonce(Nonce::assume_unique_for_key(buf)))
}

fn bind(key_bytes: &[u8; KEY_LEN]) -> Result<LessSafeKey, StoreError> {
    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| StoreError::InvalidKey)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `key_bytes`, authenticating `aad` alongside it.
///
/// A fresh random nonce is drawn on every call, even when the plaintext is
/// byte-identical to a previous call.
///
/// # Layout of returned bytes
/// ```text
/// [ nonce (12 bytes) ][ ciphertext ][ GCM tag (16 bytes) ]
/// ```
pub fn seal(
    key_bytes: &[u8; KEY_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, StoreError> {
    let key = bind(key_bytes)?;
    let nonce = generate_nonce()?;

    let mut output = Vec::with_capacity(NONCE_LEN + plaintext.len() + ALGORITHM.tag_len());
    output.extend_from_slice(nonce.0.as_ref());
    output.extend_from_slice(plaintext);

    // Encrypts `output[NONCE_LEN..]` in place; the tag goes on the end.
    let tag = key
        .seal_in_place_separate_tag(nonce.0, Aad::from(aad), &mut output[NONCE_LEN..])
        .map_err(|_| StoreError::EncryptionFailure)?;
    output.extend_from_slice(tag.as_ref());

    Ok(output)
}

/// Decrypt bytes produced by [`seal`].
///
/// The tag is verified before any plaintext is returned. A wrong key, wrong
/// associated data, truncation, or any flipped byte all surface as
/// `StoreError::Integrity(blob)`.
///
/// The plaintext is decrypted in place inside a buffer that is zeroed when
/// dropped, on success and on failure alike.
pub fn open(
    key_bytes: &[u8; KEY_LEN],
    aad: &[u8],
    sealed: &[u8],
    blob: Blob,
) -> Result<Zeroizing<Vec<u8>>, StoreError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(StoreError::Integrity(blob));
    }

    let (nonce_bytes, body) = sealed.split_at(NONCE_LEN);
    let nonce_bytes: [u8; NONCE_LEN] = nonce_bytes
        .try_into()
        .map_err(|_| StoreError::Integrity(blob))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let key = bind(key_bytes)?;
    let mut body = Zeroizing::new(body.to_vec());
    let len = key
        .open_in_place(nonce, Aad::from(aad), &mut body)
        .map_err(|_| StoreError::Integrity(blob))?
        .len();

    // Drop the tag; the plaintext stays in the zeroizing buffer.
    body.truncate(len);
    Ok(body)
}

/// Generate a cryptographically secure random key.
pub fn generate_random_key() -> Result<[u8; KEY_LEN], StoreError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_LEN];
    rng.fill(&mut key).map_err(|_| StoreError::RandomnessFailure)?;
    Ok(key)
}
