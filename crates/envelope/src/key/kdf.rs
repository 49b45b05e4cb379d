//! Password-based key derivation.
//!
//! Derivation is kept apart from the codec: the codec only consumes the
//! resolved [`CipherKey`], whichever way it was produced.

use sha2::Sha256;

use super::{CipherKey, KeyError};
use crate::cipher::KEY_LEN;

/// Stretches a password into a [`CipherKey`].
pub trait KeyDerivation {
    /// Derive a key from `password` and `salt` using `iterations` rounds.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Derivation`] if the parameters are rejected.
    fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<CipherKey, KeyError>;
}

/// PBKDF2 with HMAC-SHA-256 (RFC 8018).
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbkdf2Sha256;

impl KeyDerivation for Pbkdf2Sha256 {
    fn derive_key(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
    ) -> Result<CipherKey, KeyError> {
        if iterations == 0 {
            return Err(KeyError::Derivation("iteration count must be > 0".into()));
        }
        if salt.is_empty() {
            return Err(KeyError::Derivation("salt must not be empty".into()));
        }

        // Derive straight into the key's heap buffer; no stack copy survives.
        let mut key = CipherKey::zeroed();
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, key.as_mut_bytes());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_published_vectors() {
        let kdf = Pbkdf2Sha256;

        let key = kdf.derive_key(b"password", b"salt", 1).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );

        let key = kdf.derive_key(b"password", b"salt", 2).unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
    }

    #[test]
    fn derives_full_length_key_in_place() {
        let key = Pbkdf2Sha256.derive_key(b"pw", b"salt", 1).unwrap();
        assert_eq!(key.as_bytes().len(), KEY_LEN);
        assert_ne!(key.as_bytes(), &[0u8; KEY_LEN]);
    }

    #[test]
    fn salt_changes_key() {
        let kdf = Pbkdf2Sha256;
        let a = kdf.derive_key(b"hunter2", b"salt-a", 1000).unwrap();
        let b = kdf.derive_key(b"hunter2", b"salt-b", 1000).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn rejects_zero_iterations_and_empty_salt() {
        let kdf = Pbkdf2Sha256;
        assert!(matches!(
            kdf.derive_key(b"pw", b"salt", 0),
            Err(KeyError::Derivation(_))
        ));
        assert!(matches!(
            kdf.derive_key(b"pw", b"", 10),
            Err(KeyError::Derivation(_))
        ));
    }
}
