//! Key sources backed by configuration: a JSON key file or an inline base64 value.
//!
//! # Key file format
//!
//! ```json
//! { "EncryptionKey": "<base64 of 32 bytes>" }
//! ```

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CipherKey, KeyError, KeySource};

#[derive(Serialize, Deserialize)]
struct KeyDocument {
    #[serde(rename = "EncryptionKey")]
    encryption_key: Option<String>,
}

/// Loads the key from a JSON file with an `EncryptionKey` field.
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    /// Create a source reading `path` on each [`load`](KeySource::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The configured key file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `key` to a new key file at the configured path.
    ///
    /// The file is created with owner-only permissions on Unix and an existing
    /// file is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Io`] if the file exists or cannot be written.
    pub fn create(&self, key: &CipherKey) -> Result<(), KeyError> {
        let io_err = |source: io::Error| KeyError::Io {
            path: self.path.clone(),
            source,
        };

        let doc = KeyDocument {
            encryption_key: Some(STANDARD.encode(key.as_bytes())),
        };
        let json = serde_json::to_vec_pretty(&doc).map_err(|e| io_err(io::Error::other(e)))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        debug!(path = %self.path.display(), "encryption key file created");
        Ok(())
    }
}

impl KeySource for KeyFile {
    /// # Errors
    ///
    /// - [`KeyError::Missing`] if the file does not exist.
    /// - [`KeyError::Empty`] if it has no content.
    /// - [`KeyError::Corrupt`] if it is not JSON or lacks a non-empty `EncryptionKey`.
    /// - [`KeyError::InvalidBase64`] / [`KeyError::InvalidLength`] for a malformed key.
    fn load(&self) -> Result<CipherKey, KeyError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(KeyError::Missing(self.path.clone()))
            }
            Err(source) => {
                return Err(KeyError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Err(KeyError::Empty(self.path.clone()));
        }

        let doc: KeyDocument =
            serde_json::from_str(&content).map_err(|_| KeyError::Corrupt(self.path.clone()))?;
        let encoded = doc
            .encryption_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| KeyError::Corrupt(self.path.clone()))?;

        let key = CipherKey::from_base64(&encoded)?;
        debug!(path = %self.path.display(), "encryption key loaded from file");
        Ok(key)
    }
}

/// A base64 key supplied directly through configuration.
#[derive(Clone)]
pub struct Base64Key(String);

impl Base64Key {
    /// Wrap an encoded key value.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }
}

impl std::fmt::Debug for Base64Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Base64Key([REDACTED])")
    }
}

impl KeySource for Base64Key {
    fn load(&self) -> Result<CipherKey, KeyError> {
        CipherKey::from_base64(&self.0)
    }
}
