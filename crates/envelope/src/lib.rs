//! Streaming symmetric-encryption envelopes.
//!
//! An envelope is a 16-byte random IV followed by AES-256-CBC/PKCS#7
//! ciphertext:
//!
//! ```text
//! +----------------+------------------------------------+
//! | IV (16 bytes)  | ciphertext (n * 16 bytes, n >= 1)  |
//! +----------------+------------------------------------+
//! ```
//!
//! There is no version byte, length field or authentication tag. A decoder
//! must share the algorithm and key with the encoder.
//!
//! Both directions work on `futures::Stream`s of [`bytes::Bytes`] chunks whose
//! boundaries carry no meaning: the IV may arrive split over several chunks or
//! merged with ciphertext, and nothing beyond the IV prefix is ever buffered.
//!
//! This crate is free of HTTP and runtime dependencies; callers drive the
//! returned streams on whatever executor they use.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod key;
pub mod stream;

pub use cipher::{BLOCK_LEN, IV_LEN, KEY_LEN};
pub use codec::{decode, decode_bytes, encode, encode_bytes, EnvelopeStream};
pub use error::CodecError;
pub use key::{CipherKey, KeyDerivation, KeyError, KeyFile, KeySource, Pbkdf2Sha256};
