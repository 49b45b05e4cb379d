//! Record-then-replay buffering of a stream prefix.
//!
//! [`RewindableBuffer`] has two phases:
//!
//! 1. **Recording**: chunks are appended and can be read or replaced by index.
//! 2. **Replaying**: the recorded chunks have been handed out once through a
//!    [`Replay`]; the record is gone and further chunks are not retained.
//!
//! [`RewindableStream`] pairs a buffer with a live source and pulls only as
//! many chunks as a caller asks for, so the unbounded remainder of the source
//! is never buffered.

use std::{collections::VecDeque, mem};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;
use tracing::trace;

/// Errors produced by [`RewindableBuffer`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// No chunk was recorded at the given index.
    #[error("no recorded chunk at index {0}")]
    NotFound(usize),

    /// The buffer has already been rewound; its record is no longer available.
    #[error("buffer has already been rewound")]
    Rewound,

    /// Fewer bytes are buffered than were requested.
    #[error("requested {requested} bytes but only {available} are buffered")]
    Short {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes currently buffered.
        available: usize,
    },
}

#[derive(Debug)]
enum Phase {
    Recording(Vec<Bytes>),
    Replaying,
}

/// Index-addressable record of stream chunks that can be replayed once.
#[derive(Debug)]
pub struct RewindableBuffer {
    phase: Phase,
    buffered: usize,
}

impl RewindableBuffer {
    /// Create an empty buffer in the recording phase.
    pub fn new() -> Self {
        Self {
            phase: Phase::Recording(Vec::new()),
            buffered: 0,
        }
    }

    /// Append `chunk` to the record.
    ///
    /// Returns `false` without retaining the chunk once the buffer has been
    /// rewound; a replay never mirrors later writes.
    pub fn record(&mut self, chunk: Bytes) -> bool {
        match &mut self.phase {
            Phase::Recording(chunks) => {
                self.buffered += chunk.len();
                chunks.push(chunk);
                true
            }
            Phase::Replaying => false,
        }
    }

    /// Total number of bytes currently recorded.
    pub fn len(&self) -> usize {
        self.buffered
    }

    /// Returns `true` if no bytes are recorded.
    pub fn is_empty(&self) -> bool {
        self.buffered == 0
    }

    /// Number of recorded chunks.
    pub fn chunk_count(&self) -> usize {
        match &self.phase {
            Phase::Recording(chunks) => chunks.len(),
            Phase::Replaying => 0,
        }
    }

    /// Returns `true` once [`rewind`](Self::rewind) has been called.
    pub fn is_rewound(&self) -> bool {
        matches!(self.phase, Phase::Replaying)
    }

    /// The `index`-th recorded chunk, or `None` if there is none.
    pub fn get_chunk(&self, index: usize) -> Option<&Bytes> {
        match &self.phase {
            Phase::Recording(chunks) => chunks.get(index),
            Phase::Replaying => None,
        }
    }

    /// Replace the chunk recorded at `index` in place.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Rewound`] after replay has started and
    /// [`BufferError::NotFound`] if `index` is out of range.
    pub fn set_chunk(&mut self, index: usize, chunk: Bytes) -> Result<(), BufferError> {
        let Phase::Recording(chunks) = &mut self.phase else {
            return Err(BufferError::Rewound);
        };
        let slot = chunks.get_mut(index).ok_or(BufferError::NotFound(index))?;
        self.buffered = self.buffered - slot.len() + chunk.len();
        *slot = chunk;
        Ok(())
    }

    /// Remove the first `n` logical bytes from the record and return them.
    ///
    /// The bytes may span any number of chunks. Each chunk they touch is
    /// replaced via [`set_chunk`](Self::set_chunk) with its untouched
    /// remainder, so everything after byte `n` replays unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Short`] if fewer than `n` bytes are recorded and
    /// [`BufferError::Rewound`] after replay has started.
    pub fn take_prefix(&mut self, n: usize) -> Result<Bytes, BufferError> {
        if self.is_rewound() {
            return Err(BufferError::Rewound);
        }
        if self.buffered < n {
            return Err(BufferError::Short {
                requested: n,
                available: self.buffered,
            });
        }

        let mut prefix = BytesMut::with_capacity(n);
        let mut index = 0;
        while prefix.len() < n {
            let chunk = self
                .get_chunk(index)
                .cloned()
                .ok_or(BufferError::NotFound(index))?;
            let split = (n - prefix.len()).min(chunk.len());
            prefix.extend_from_slice(&chunk[..split]);
            self.set_chunk(index, chunk.slice(split..))?;
            index += 1;
        }
        trace!(bytes = n, chunks = index, "took buffered prefix");
        Ok(prefix.freeze())
    }

    /// Hand out the recorded chunks, in order, as a one-shot [`Replay`].
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Rewound`] if the buffer was already rewound.
    pub fn rewind(&mut self) -> Result<Replay, BufferError> {
        match mem::replace(&mut self.phase, Phase::Replaying) {
            Phase::Recording(chunks) => {
                self.buffered = 0;
                Ok(Replay::new(chunks))
            }
            Phase::Replaying => Err(BufferError::Rewound),
        }
    }

    /// Consume the buffer and return its replay.
    ///
    /// An already rewound buffer yields an empty replay.
    pub fn into_replay(mut self) -> Replay {
        self.rewind().unwrap_or_default()
    }
}

impl Default for RewindableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<Bytes> for RewindableBuffer {
    fn extend<I: IntoIterator<Item = Bytes>>(&mut self, iter: I) {
        for chunk in iter {
            self.record(chunk);
        }
    }
}

/// One-shot replay of the chunks recorded by a [`RewindableBuffer`].
///
/// Chunks emptied by [`RewindableBuffer::take_prefix`] are skipped.
#[derive(Debug, Default)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Replay {
    chunks: VecDeque<Bytes>,
}

impl Replay {
    fn new(chunks: Vec<Bytes>) -> Self {
        Self {
            chunks: chunks.into_iter().filter(|c| !c.is_empty()).collect(),
        }
    }

    /// Number of bytes not yet replayed.
    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Adapt the replay into a [`Stream`] of chunks.
    pub fn into_stream(self) -> stream::Iter<Self> {
        stream::iter(self)
    }
}

impl Iterator for Replay {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.chunks.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chunks.len(), Some(self.chunks.len()))
    }
}

/// A live source whose first chunks are recorded in a [`RewindableBuffer`].
pub struct RewindableStream<S> {
    source: S,
    buffer: RewindableBuffer,
    exhausted: bool,
}

impl<S, E> RewindableStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    /// Wrap `source` with an empty recording buffer.
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: RewindableBuffer::new(),
            exhausted: false,
        }
    }

    /// Pull chunks from the source into the buffer until at least `min_bytes`
    /// are recorded or the source ends, and return the number of bytes buffered.
    ///
    /// Stops as soon as the threshold is reached; no further chunk is read.
    ///
    /// # Errors
    ///
    /// Returns the source's error unchanged.
    pub async fn prime(&mut self, min_bytes: usize) -> Result<usize, E> {
        while self.buffer.len() < min_bytes && !self.exhausted {
            match self.source.next().await {
                Some(chunk) => {
                    self.buffer.record(chunk?);
                }
                None => self.exhausted = true,
            }
        }
        trace!(
            buffered = self.buffer.len(),
            chunks = self.buffer.chunk_count(),
            exhausted = self.exhausted,
            "primed"
        );
        Ok(self.buffer.len())
    }

    /// Returns `true` once the source has signalled its end during priming.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// The recording buffer.
    pub fn buffer(&self) -> &RewindableBuffer {
        &self.buffer
    }

    /// Mutable access to the recording buffer, for inspection and patching.
    pub fn buffer_mut(&mut self) -> &mut RewindableBuffer {
        &mut self.buffer
    }

    /// Split into the replay of everything recorded and the live source,
    /// positioned right after the last recorded chunk.
    pub fn rewind(self) -> (Replay, S) {
        (self.buffer.into_replay(), self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn chunks(parts: &[&'static [u8]]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from_static(p)).collect()
    }

    #[test]
    fn get_and_set_chunk() {
        let mut buf = RewindableBuffer::new();
        buf.extend(chunks(&[b"abc", b"defg"]));
        assert_eq!(buf.len(), 7);
        assert_eq!(buf.get_chunk(1), Some(&Bytes::from_static(b"defg")));
        assert_eq!(buf.get_chunk(2), None);

        buf.set_chunk(0, Bytes::from_static(b"z")).unwrap();
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.get_chunk(0), Some(&Bytes::from_static(b"z")));
        assert_eq!(
            buf.set_chunk(5, Bytes::new()),
            Err(BufferError::NotFound(5))
        );
    }

    #[test]
    fn take_prefix_spans_chunks() {
        let mut buf = RewindableBuffer::new();
        buf.extend(chunks(&[b"a", b"bcd", b"efgh", b"ij"]));

        let prefix = buf.take_prefix(6).unwrap();
        assert_eq!(&prefix[..], b"abcdef");
        assert_eq!(buf.len(), 4);

        let rest: Vec<u8> = buf.rewind().unwrap().flatten().collect();
        assert_eq!(rest, b"ghij");
    }

    #[test]
    fn take_prefix_rejects_short_buffer() {
        let mut buf = RewindableBuffer::new();
        buf.record(Bytes::from_static(b"abc"));
        assert_eq!(
            buf.take_prefix(4),
            Err(BufferError::Short {
                requested: 4,
                available: 3
            })
        );
        // The record is untouched on failure.
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn rewind_is_one_shot() {
        let mut buf = RewindableBuffer::new();
        buf.record(Bytes::from_static(b"one"));
        buf.record(Bytes::from_static(b"two"));

        let replay: Vec<Bytes> = buf.rewind().unwrap().collect();
        assert_eq!(replay, chunks(&[b"one", b"two"]));

        assert!(buf.is_rewound());
        assert_eq!(buf.rewind().unwrap_err(), BufferError::Rewound);
        assert!(!buf.record(Bytes::from_static(b"late")));
        assert_eq!(buf.get_chunk(0), None);
        assert_eq!(
            buf.set_chunk(0, Bytes::new()),
            Err(BufferError::Rewound)
        );
    }

    #[test]
    fn replay_is_not_a_live_mirror() {
        let mut buf = RewindableBuffer::new();
        buf.record(Bytes::from_static(b"before"));
        let replay = buf.rewind().unwrap();
        buf.record(Bytes::from_static(b"after"));
        assert_eq!(replay.remaining(), 6);
        assert_eq!(replay.collect::<Vec<_>>(), chunks(&[b"before"]));
    }

    #[test]
    fn prime_stops_at_threshold() {
        let source = stream::iter(
            chunks(&[b"12345678", b"abcdefgh", b"ABCDEFGH", b"!!!!!!!!"])
                .into_iter()
                .map(Ok::<_, ()>),
        );
        let mut rewindable = RewindableStream::new(source);

        let buffered = block_on(rewindable.prime(10)).unwrap();
        assert_eq!(buffered, 16);
        assert_eq!(rewindable.buffer().chunk_count(), 2);
        assert!(!rewindable.is_exhausted());

        let (replay, live) = rewindable.rewind();
        assert_eq!(replay.remaining(), 16);
        let rest: Vec<Bytes> = block_on(live.map(Result::unwrap).collect());
        assert_eq!(rest, chunks(&[b"ABCDEFGH", b"!!!!!!!!"]));
    }

    #[test]
    fn prime_reports_short_source() {
        let source = stream::iter(chunks(&[b"ab", b"c"]).into_iter().map(Ok::<_, ()>));
        let mut rewindable = RewindableStream::new(source);
        assert_eq!(block_on(rewindable.prime(16)).unwrap(), 3);
        assert!(rewindable.is_exhausted());
        // Priming again after the end does not poll the finished source.
        assert_eq!(block_on(rewindable.prime(16)).unwrap(), 3);
    }

    #[test]
    fn prime_propagates_source_error() {
        let source = stream::iter(vec![Ok(Bytes::from_static(b"ab")), Err("broken")]);
        let mut rewindable = RewindableStream::new(source);
        assert_eq!(block_on(rewindable.prime(16)), Err("broken"));
    }
}
