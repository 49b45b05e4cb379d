//! Key material for the envelope codec.
//!
//! The codec itself only ever consumes a resolved 32-byte key. This module
//! provides the owned key type and the pluggable ways of resolving one:
//!
//! - [`KeySource`] implementations load a key from configuration
//!   ([`KeyFile`], [`Base64Key`]).
//! - [`KeyDerivation`] implementations stretch a password into a key
//!   ([`Pbkdf2Sha256`]).
//!
//! # Security invariants
//!
//! - Key bytes are **never** logged; [`CipherKey`]'s `Debug` output is redacted.
//! - Key bytes are overwritten with zeroes when a [`CipherKey`] is dropped.

pub mod file;
pub mod kdf;

pub use file::{Base64Key, KeyFile};
pub use kdf::{KeyDerivation, Pbkdf2Sha256};

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::cipher::KEY_LEN;

/// Errors produced while resolving key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The key file does not exist.
    #[error("encryption key file does not exist: {0}")]
    Missing(PathBuf),

    /// The key file exists but has no content.
    #[error("encryption key file is empty: {0}")]
    Empty(PathBuf),

    /// The key file is not valid JSON or has no `EncryptionKey` field.
    #[error("encryption key file is corrupted or has no EncryptionKey field: {0}")]
    Corrupt(PathBuf),

    /// The key file could not be read.
    #[error("failed to read encryption key file {path}: {source}")]
    Io {
        /// Path of the key file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The key is not valid standard base64.
    #[error("encryption key is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded key is not [`KEY_LEN`] bytes.
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),

    /// Key derivation parameters were rejected.
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// Owned by the caller and borrowed by the codec for the duration of a call.
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which plaintext key material lives in RAM.
#[derive(Clone)]
pub struct CipherKey(Box<[u8; KEY_LEN]>);

impl CipherKey {
    /// Wrap a key array. The caller's copy is wiped.
    pub fn from_array(mut bytes: [u8; KEY_LEN]) -> Self {
        let key = Self(Box::new(bytes));
        bytes.zeroize();
        key
    }

    /// An all-zero key to be filled in place.
    pub(crate) fn zeroed() -> Self {
        Self(Box::new([0u8; KEY_LEN]))
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0[..]
    }

    /// Copy `bytes` into a new key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if `bytes` is not [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut key = Self::zeroed();
        key.as_mut_bytes().copy_from_slice(bytes);
        Ok(key)
    }

    /// Decode a standard-alphabet base64 key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidBase64`] if `encoded` is not valid base64 and
    /// [`KeyError::InvalidLength`] if it does not decode to [`KEY_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(STANDARD.decode(encoded.trim())?);
        Self::from_slice(&decoded)
    }

    /// Generate a fresh random key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut key = Self::zeroed();
        OsRng.fill_bytes(key.as_mut_bytes());
        key
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl AsRef<[u8]> for CipherKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Zeroize for CipherKey {
    fn zeroize(&mut self) {
        (*self.0).zeroize();
    }
}

impl Drop for CipherKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for CipherKey {}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("CipherKey([REDACTED])")
    }
}

/// A provider of resolved key material.
///
/// Implementations decide where the key lives; the codec never persists it.
pub trait KeySource {
    /// Resolve the key.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] describing why the key could not be resolved.
    fn load(&self) -> Result<CipherKey, KeyError>;
}
