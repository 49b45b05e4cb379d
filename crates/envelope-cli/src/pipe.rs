//! File-to-file streaming through the envelope codec.

use std::path::Path;

use anyhow::{Context, Result};
use envelope::{CipherKey, EnvelopeStream};
use tokio::{
    fs::File,
    io::{self, AsyncWriteExt},
};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

/// Read size for input files.
const CHUNK_SIZE: usize = 64 * 1024;

/// Which way a file flows through the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Stream `input` through the codec into a newly created `output`.
///
/// Returns the number of bytes written. On failure the partial output file is
/// removed so that a truncated envelope or plaintext is never left behind.
///
/// # Errors
///
/// Returns an error if either file cannot be opened, the codec rejects the
/// input, or writing fails.
pub async fn run(direction: Direction, key: &CipherKey, input: &Path, output: &Path) -> Result<u64> {
    let source = File::open(input)
        .await
        .with_context(|| format!("failed to open {}", input.display()))?;
    let chunks = ReaderStream::with_capacity(source, CHUNK_SIZE);

    let transformed: EnvelopeStream = match direction {
        Direction::Encrypt => envelope::encode(chunks, key.as_bytes())?,
        Direction::Decrypt => envelope::decode(chunks, key.as_bytes())?,
    };
    let mut reader = StreamReader::new(transformed);

    let mut sink = File::create(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;
    debug!(?direction, input = %input.display(), output = %output.display(), "pipe started");

    let copied = async {
        let written = io::copy(&mut reader, &mut sink).await?;
        sink.flush().await?;
        sink.sync_all().await?;
        Ok::<_, io::Error>(written)
    }
    .await;
    drop(sink);

    match copied {
        Ok(written) => {
            info!(?direction, bytes = written, "pipe finished");
            Ok(written)
        }
        Err(e) => {
            warn!(?direction, error = %e, "pipe failed, removing partial output");
            if let Err(rm) = tokio::fs::remove_file(output).await {
                warn!(error = %rm, output = %output.display(), "failed to remove partial output");
            }
            Err(e).with_context(|| format!("failed to {} {}", direction.verb(), input.display()))
        }
    }
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypt",
            Direction::Decrypt => "decrypt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envelope::CodecError;
    use std::fs;

    fn key() -> CipherKey {
        CipherKey::from_array([0x2Au8; 32])
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_restores_file() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed.bin");
        let opened = dir.path().join("opened.txt");

        // Larger than one read so the codec sees several chunks.
        let payload: Vec<u8> = (0..(CHUNK_SIZE * 2 + 123)).map(|i| (i % 253) as u8).collect();
        fs::write(&plain, &payload).unwrap();

        let written = run(Direction::Encrypt, &key(), &plain, &sealed).await.unwrap();
        let expected = 16 + (payload.len() / 16 + 1) * 16;
        assert_eq!(written as usize, expected);
        assert_eq!(fs::metadata(&sealed).unwrap().len() as usize, expected);

        run(Direction::Decrypt, &key(), &sealed, &opened).await.unwrap();
        assert_eq!(fs::read(&opened).unwrap(), payload);
    }

    #[tokio::test]
    async fn encrypted_file_matches_buffer_codec() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        let sealed = dir.path().join("sealed.bin");
        fs::write(&plain, b"Hello world !").unwrap();

        run(Direction::Encrypt, &key(), &plain, &sealed).await.unwrap();
        let envelope = fs::read(&sealed).unwrap();
        assert_eq!(envelope.len(), 32);
        assert_eq!(
            envelope::decode_bytes(&envelope, key().as_bytes()).unwrap(),
            b"Hello world !"
        );
    }

    #[tokio::test]
    async fn failed_decrypt_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let sealed = dir.path().join("short.bin");
        let opened = dir.path().join("opened.txt");
        fs::write(&sealed, [0u8; 10]).unwrap();

        let err = run(Direction::Decrypt, &key(), &sealed, &opened).await.unwrap_err();
        let codec = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<io::Error>())
            .and_then(|io| io.get_ref())
            .and_then(|inner| inner.downcast_ref::<CodecError>());
        assert!(matches!(codec, Some(CodecError::TruncatedEnvelope { received: 10 })));
        assert!(!opened.exists());
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            Direction::Encrypt,
            &key(),
            &dir.path().join("absent"),
            &dir.path().join("out"),
        )
        .await;
        assert!(result.is_err());
        assert!(!dir.path().join("out").exists());
    }
}
