//! Async driver.
//!
//! Pulls event batches from a transport stream into a [`CallbackDispatcher`]
//! until it reaches a terminal state. The dispatcher is still driven by one
//! task only; the driver adds the idle timeout and guarantees termination.

use super::dispatcher::{CallbackDispatcher, DispatchState, StreamingResponseHandler};
use crate::error::StreamError;
use crate::types::StreamEvent;
use futures_util::{Stream, StreamExt};

/// Feed `stream` into `dispatcher` until a terminal callback has fired.
///
/// - each item is one batch (for example the events decoded from one wire chunk);
/// - an `Err` item is reported through `on_error` unchanged;
/// - no item within the configured idle timeout reports [`StreamError::Timeout`];
/// - end of stream without `MessageStop` reports [`StreamError::StreamEnded`].
pub async fn drive_stream<S, B, H>(
    stream: S,
    dispatcher: &mut CallbackDispatcher<'_, H>,
) -> DispatchState
where
    S: Stream<Item = Result<B, StreamError>>,
    B: IntoIterator<Item = StreamEvent>,
    H: StreamingResponseHandler + ?Sized,
{
    futures_util::pin_mut!(stream);
    let idle_timeout = dispatcher.config().idle_timeout();

    while !dispatcher.is_terminal() {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                Ok(item) => item,
                Err(_) => {
                    tracing::debug!(?limit, "no stream event within idle timeout");
                    dispatcher.on_error(StreamError::Timeout(limit));
                    break;
                }
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(batch)) => {
                dispatcher.on_batch(batch);
            }
            Some(Err(err)) => {
                dispatcher.on_error(err);
            }
            None => {
                dispatcher.on_error(StreamError::StreamEnded);
            }
        }
    }

    dispatcher.state()
}
