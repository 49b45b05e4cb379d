//! Envelope encoding and decoding over chunked byte streams.
//!
//! # Encode
//!
//! ```text
//! plaintext ──► CbcEncryptor ──┐
//!                              ├──► concat ──► IV || ciphertext
//! OsRng IV ────────────────────┘
//! ```
//!
//! # Decode
//!
//! ```text
//! envelope ──► RewindableStream::prime(16) ──► take_prefix(16) = IV
//!                                        └──► replay ++ live ──► CbcDecryptor ──► plaintext
//! ```
//!
//! The IV is assembled from as many chunks as it takes; the first chunk is
//! never assumed to hold all 16 bytes.

use std::{
    io,
    pin::Pin,
    task::{ready, Context, Poll},
};

use bytes::Bytes;
use futures::{
    future,
    stream::{self, BoxStream, Stream, StreamExt, TryStreamExt},
};
use rand::{rngs::OsRng, RngCore};
use tracing::debug;

use crate::{
    cipher::{check_key_len, padded_len, BlockTransform, CbcDecryptor, CbcEncryptor, IV_LEN},
    error::CodecError,
    key::CipherKey,
    stream::{concat, RewindableStream},
};

/// A boxed stream of envelope or plaintext chunks.
pub type EnvelopeStream = BoxStream<'static, Result<Bytes, CodecError>>;

/// Runs every chunk of `source` through a [`BlockTransform`] and emits the
/// final block when `source` ends.
///
/// The first error, from the source or from finalisation, ends the stream.
/// Dropping the stream drops both the source and the cipher context.
#[must_use = "streams do nothing unless polled"]
pub struct CipherStream<S, T> {
    source: S,
    transform: Option<T>,
}

impl<S, T> CipherStream<S, T> {
    /// Wrap `source` with `transform`.
    pub fn new(source: S, transform: T) -> Self {
        Self {
            source,
            transform: Some(transform),
        }
    }
}

impl<S, T> Stream for CipherStream<S, T>
where
    S: Stream<Item = Result<Bytes, CodecError>> + Unpin,
    T: BlockTransform + Unpin,
{
    type Item = Result<Bytes, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(transform) = this.transform.as_mut() else {
                return Poll::Ready(None);
            };
            match ready!(this.source.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    let out = transform.update(&chunk);
                    if !out.is_empty() {
                        return Poll::Ready(Some(Ok(out)));
                    }
                }
                Some(Err(e)) => {
                    this.transform = None;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    let last = this.transform.take().map(BlockTransform::finalize);
                    return match last {
                        Some(Ok(out)) if out.is_empty() => Poll::Ready(None),
                        other => Poll::Ready(other),
                    };
                }
            }
        }
    }
}

/// Fails with [`CodecError::TruncatedEnvelope`] if `source` ends without a
/// single ciphertext byte, so that an IV-only envelope never reaches
/// finalisation.
struct RequireCiphertext<S> {
    source: S,
    seen: bool,
}

impl<S> RequireCiphertext<S> {
    fn new(source: S) -> Self {
        Self {
            source,
            seen: false,
        }
    }
}

impl<S> Stream for RequireCiphertext<S>
where
    S: Stream<Item = Result<Bytes, CodecError>> + Unpin,
{
    type Item = Result<Bytes, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(this.source.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                this.seen |= !chunk.is_empty();
                Poll::Ready(Some(Ok(chunk)))
            }
            None if !this.seen => {
                this.seen = true;
                Poll::Ready(Some(Err(CodecError::TruncatedEnvelope { received: IV_LEN })))
            }
            other => Poll::Ready(other),
        }
    }
}

fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext` into an envelope stream: a fresh random IV followed by
/// the AES-256-CBC/PKCS#7 ciphertext.
///
/// The returned stream is single-pass and cannot be restarted.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKeyLength`] if `key` is not 32 bytes. Source
/// failures are yielded by the stream as [`CodecError::Upstream`].
pub fn encode<S>(plaintext: S, key: &[u8]) -> Result<EnvelopeStream, CodecError>
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    check_key_len(key)?;
    let iv = generate_iv();
    let encryptor = CbcEncryptor::new(key, &iv)?;
    debug!("envelope encode started with fresh IV");

    let iv_stream: EnvelopeStream =
        stream::once(future::ready(Ok(Bytes::copy_from_slice(&iv)))).boxed();
    let cipher_stream: EnvelopeStream =
        CipherStream::new(plaintext.map_err(CodecError::from).boxed(), encryptor).boxed();

    Ok(concat([iv_stream, cipher_stream]).boxed())
}

/// Decrypt an envelope stream back into plaintext.
///
/// The key is checked before any input is read. On first poll the input is
/// primed until the 16-byte IV is assembled; the bytes after it, whether from
/// the primed chunks or from the live input, then flow through the decryptor.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKeyLength`] if `key` is not 32 bytes. The
/// stream yields [`CodecError::TruncatedEnvelope`] if the input ends inside
/// the IV or right after it, [`CodecError::CorruptCiphertext`] if decryption
/// fails, and
/// [`CodecError::Upstream`] if the input fails.
pub fn decode<S>(envelope: S, key: &[u8]) -> Result<EnvelopeStream, CodecError>
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    check_key_len(key)?;
    let key = CipherKey::from_slice(key).map_err(|_| CodecError::InvalidKeyLength(key.len()))?;

    let start = async move {
        let mut input = RewindableStream::new(envelope.boxed());
        let received = input.prime(IV_LEN).await?;
        if received < IV_LEN {
            return Err(CodecError::TruncatedEnvelope { received });
        }

        let prefix = input
            .buffer_mut()
            .take_prefix(IV_LEN)
            .map_err(|_| CodecError::TruncatedEnvelope { received })?;
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&prefix);

        let decryptor = CbcDecryptor::new(key.as_bytes(), &iv)?;
        let (replay, live) = input.rewind();
        debug!(
            primed = received,
            replayed = replay.remaining(),
            "envelope IV extracted"
        );

        let ciphertext = RequireCiphertext::new(
            replay
                .into_stream()
                .map(Ok)
                .chain(live.map_err(CodecError::from)),
        )
        .boxed();
        Ok::<_, CodecError>(CipherStream::new(ciphertext, decryptor))
    };

    Ok(stream::once(start).try_flatten().boxed())
}

/// Encrypt an in-memory buffer into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKeyLength`] if `key` is not 32 bytes.
pub fn encode_bytes(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CodecError> {
    check_key_len(key)?;
    let iv = generate_iv();
    let mut encryptor = CbcEncryptor::new(key, &iv)?;

    let mut out = Vec::with_capacity(IV_LEN + padded_len(plaintext.len()));
    out.extend_from_slice(&iv);
    out.extend_from_slice(&encryptor.update(plaintext));
    out.extend_from_slice(&encryptor.finalize()?);
    Ok(out)
}

/// Decrypt an in-memory envelope.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKeyLength`], [`CodecError::TruncatedEnvelope`]
/// or [`CodecError::CorruptCiphertext`] as [`decode`] does.
pub fn decode_bytes(envelope: &[u8], key: &[u8]) -> Result<Vec<u8>, CodecError> {
    check_key_len(key)?;
    if envelope.len() < IV_LEN {
        return Err(CodecError::TruncatedEnvelope {
            received: envelope.len(),
        });
    }
    let (prefix, ciphertext) = envelope.split_at(IV_LEN);
    if ciphertext.is_empty() {
        return Err(CodecError::TruncatedEnvelope { received: IV_LEN });
    }
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(prefix);

    let mut decryptor = CbcDecryptor::new(key, &iv)?;
    let mut out = decryptor.update(ciphertext).to_vec();
    out.extend_from_slice(&decryptor.finalize()?);
    Ok(out)
}
