//! Bounded buffering between a provider stream and the HTTP body.
//!
//! The router pipes every completion stream through a bounded
//! `tokio::sync::mpsc` channel. When the client reads slowly the producer
//! task parks on `send`, which in turn stops polling the provider socket.

use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use super::traits::CompletionStream;

/// Default number of deltas buffered between provider and client.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Re-expose `inner` through a channel of capacity `buffer_size`.
///
/// The producer task ends when `inner` does, or as soon as the consumer
/// drops the returned stream.
///
/// # Panics
///
/// Requires a tokio runtime context, and `buffer_size` must be non-zero.
pub fn bounded_stream(inner: CompletionStream, buffer_size: usize) -> CompletionStream {
    let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

    tokio::spawn(async move {
        let mut inner = inner;
        while let Some(item) = inner.next().await {
            if tx.send(item).await.is_err() {
                break; // receiver dropped
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
