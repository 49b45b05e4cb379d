//! Errors produced while encoding or decoding an envelope stream.

use std::io;

use thiserror::Error;

use crate::cipher::KEY_LEN;

/// Errors produced by the envelope codec.
///
/// Any error terminates the stream it was yielded from. Nothing is retried:
/// a CBC context cannot be resumed mid-stream.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The supplied key is not [`KEY_LEN`] bytes long.
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// The input ended inside the IV prefix, or right after it with no
    /// ciphertext at all.
    #[error("truncated envelope: input ended after {received} bytes, before any ciphertext")]
    TruncatedEnvelope {
        /// Number of bytes received before the input ended.
        received: usize,
    },

    /// Decryption or padding removal failed.
    #[error("corrupt ciphertext")]
    CorruptCiphertext,

    /// The source stream failed. The underlying error is passed through unchanged.
    #[error("upstream stream error: {0}")]
    Upstream(#[from] io::Error),
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Upstream(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
