//! Server-sent events decoding for streaming completions.
//!
//! All three vendors stream as SSE with one JSON object per `data:` line.
//! Event framing is handled by `eventsource-stream`; this module only drops
//! the `[DONE]` marker and empty frames and hands each payload to a vendor
//! extractor.

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, future};
use reqwest::Response;

use crate::{MuninnError, Result};

/// End-of-stream marker sent by OpenAI-style APIs.
const DONE: &str = "[DONE]";

/// Stream the `data` payloads of an SSE response.
///
/// The stream ends at `[DONE]` or when the body does. A transport or
/// framing error is yielded once as [`MuninnError::Stream`] and ends it.
pub fn data_events(response: Response) -> impl Stream<Item = Result<String>> + Send {
    payloads(response.bytes_stream())
}

fn payloads<S, B, E>(body: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    body.eventsource()
        .map(|event| match event {
            Ok(event) => Ok(event.data),
            Err(e) => Err(MuninnError::Stream(e.to_string())),
        })
        .take_while(|item| future::ready(!matches!(item, Ok(data) if data.trim() == DONE)))
        .filter(|item| future::ready(!matches!(item, Ok(data) if data.is_empty())))
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
}

/// Map SSE payloads to text deltas with a vendor-specific extractor.
///
/// Payloads the extractor yields no text for (role markers, usage frames,
/// pings) are skipped.
pub fn text_deltas<F>(response: Response, extract: F) -> super::CompletionStream
where
    F: Fn(&str) -> Result<Option<String>> + Send + 'static,
{
    let deltas = data_events(response).filter_map(move |event| {
        let delta = match event {
            Ok(data) => extract(&data).transpose(),
            Err(e) => Some(Err(e)),
        };
        async move { delta.filter(|d| !matches!(d, Ok(text) if text.is_empty())) }
    });
    Box::pin(deltas)
}
