//! Sequential concatenation of fallible streams.

use std::{
    collections::VecDeque,
    pin::Pin,
    task::{ready, Context, Poll},
};

use futures::stream::{FusedStream, Stream, StreamExt};
use tracing::trace;

/// Stream returned by [`concat`].
///
/// Stream *i* is polled until it finishes before stream *i + 1* is polled at
/// all, so output ranges follow input order with no interleaving. Sources are
/// only polled when the consumer polls, which carries backpressure through.
#[must_use = "streams do nothing unless polled"]
pub struct Concat<S> {
    streams: VecDeque<S>,
    terminated: bool,
}

/// Concatenate `streams` in order into one stream.
///
/// The first error from any source is yielded and ends the concatenation;
/// items already yielded are not retracted.
pub fn concat<I>(streams: I) -> Concat<I::Item>
where
    I: IntoIterator,
    I::Item: Stream + Unpin,
{
    Concat {
        streams: streams.into_iter().collect(),
        terminated: false,
    }
}

impl<S, T, E> Stream for Concat<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        while let Some(current) = this.streams.front_mut() {
            match ready!(current.poll_next_unpin(cx)) {
                Some(Ok(item)) => return Poll::Ready(Some(Ok(item))),
                Some(Err(e)) => {
                    // Dropping the remaining sources closes them.
                    this.streams.clear();
                    this.terminated = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.streams.pop_front();
                    trace!(remaining = this.streams.len(), "concat source finished");
                }
            }
        }

        this.terminated = true;
        Poll::Ready(None)
    }
}

impl<S, T, E> FusedStream for Concat<S>
where
    S: Stream<Item = Result<T, E>> + Unpin,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}
