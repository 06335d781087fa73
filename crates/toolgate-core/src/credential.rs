// crates/toolgate-core/src/credential.rs
// ============================================================================
// Module: Credential Codec
// Description: AES-256-GCM sealing of upstream credentials stored as base64.
// Purpose: Keep upstream secrets encrypted at rest and out of logs.
// Dependencies: aes-gcm, base64, rand, thiserror
// ============================================================================

//! ## Overview
//! Upstream credentials are stored as `base64(nonce || ciphertext || tag)`
//! using AES-256-GCM with a 96-bit random nonce. The 32-byte key is supplied
//! by the operator; this module never generates or rotates it.
//!
//! Decoding and decryption failures are distinct [`CredentialError`] variants
//! so callers can report which stage failed. Neither variant carries secret
//! material, and [`SecretString`] redacts itself in `Debug` output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use aes_gcm::KeyInit;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Required key length in bytes.
pub const CREDENTIAL_KEY_BYTES: usize = 32;
/// AES-GCM nonce length in bytes.
const NONCE_BYTES: usize = 12;
/// AES-GCM tag length in bytes.
const TAG_BYTES: usize = 16;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Credential codec failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Key material is not exactly 32 bytes (or not valid base64).
    #[error("credential key must be {CREDENTIAL_KEY_BYTES} bytes")]
    InvalidKey,
    /// Stored ciphertext is not valid base64.
    #[error("credential is not valid base64")]
    Decode,
    /// Ciphertext is truncated, corrupt, or sealed under another key.
    #[error("credential decryption failed")]
    Decrypt,
    /// Encryption failed.
    #[error("credential encryption failed")]
    Encrypt,
    /// Decrypted bytes are not UTF-8.
    #[error("credential plaintext is not utf-8")]
    Utf8,
}

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// Plaintext secret with redacted formatting.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a plaintext secret.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// Returns the plaintext. Callers must not log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([redacted])")
    }
}

/// Operator-supplied 32-byte key.
#[derive(Clone)]
pub struct CredentialKey([u8; CREDENTIAL_KEY_BYTES]);

impl CredentialKey {
    /// Builds a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidKey`] unless `bytes` is 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CredentialError> {
        let key: [u8; CREDENTIAL_KEY_BYTES] =
            bytes.try_into().map_err(|_| CredentialError::InvalidKey)?;
        Ok(Self(key))
    }

    /// Builds a key from standard base64 text.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidKey`] for bad base64 or length.
    pub fn from_base64(text: &str) -> Result<Self, CredentialError> {
        let bytes = STANDARD.decode(text.trim()).map_err(|_| CredentialError::InvalidKey)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey([redacted])")
    }
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Encrypts `plaintext` under `key`, returning `nonce || ciphertext || tag`.
///
/// # Errors
///
/// Returns [`CredentialError::Encrypt`] if the cipher rejects the input.
pub fn encrypt(plaintext: &[u8], key: &CredentialKey) -> Result<Vec<u8>, CredentialError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CredentialError::Encrypt)?;
    let mut out = Vec::with_capacity(NONCE_BYTES + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypts bytes produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`CredentialError::Decrypt`] for truncated, tampered, or
/// wrong-key input.
pub fn decrypt(ciphertext: &[u8], key: &CredentialKey) -> Result<Vec<u8>, CredentialError> {
    if ciphertext.len() < NONCE_BYTES + TAG_BYTES {
        return Err(CredentialError::Decrypt);
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_BYTES);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));
    cipher.decrypt(Nonce::from_slice(nonce), sealed).map_err(|_| CredentialError::Decrypt)
}

/// Encrypts a secret and encodes it as base64 for storage.
///
/// # Errors
///
/// Returns [`CredentialError::Encrypt`] if encryption fails.
pub fn seal_to_base64(plaintext: &str, key: &CredentialKey) -> Result<String, CredentialError> {
    encrypt(plaintext.as_bytes(), key).map(|bytes| STANDARD.encode(bytes))
}

/// Decodes stored base64 ciphertext.
///
/// # Errors
///
/// Returns [`CredentialError::Decode`] for invalid base64.
pub fn decode_stored(stored: &str) -> Result<Vec<u8>, CredentialError> {
    STANDARD.decode(stored.trim()).map_err(|_| CredentialError::Decode)
}

/// Decodes and decrypts a stored credential into a [`SecretString`].
///
/// # Errors
///
/// Returns [`CredentialError::Decode`], [`CredentialError::Decrypt`], or
/// [`CredentialError::Utf8`] depending on which stage failed.
pub fn open_stored(stored: &str, key: &CredentialKey) -> Result<SecretString, CredentialError> {
    let ciphertext = decode_stored(stored)?;
    let plaintext = decrypt(&ciphertext, key)?;
    String::from_utf8(plaintext).map(SecretString::new).map_err(|_| CredentialError::Utf8)
}
