//! Chunk-level stream plumbing used by the codec.
//!
//! - [`concat`] drains several streams one after another into a single stream.
//! - [`RewindableBuffer`] / [`RewindableStream`] record a stream prefix so it
//!   can be inspected, patched and replayed once.

pub mod concat;
pub mod rewind;

pub use concat::{concat, Concat};
pub use rewind::{BufferError, Replay, RewindableBuffer, RewindableStream};
