//! JSON-over-WebSocket framing.
//!
//! Each message travels as one JSON text frame. The helpers here turn the
//! raw halves of a WebSocket into typed halves, so the server and client
//! cores only ever see [`Sink`]s and [`Stream`]s of protocol messages.
//!
//! Inbound frames that fail to decode are logged and skipped; the connection
//! stays up. Close and control frames are not surfaced.

use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{trace, warn};

use crate::error::Error;

/// Encode one message as a text frame
pub fn encode<T: Serialize>(message: &T) -> Result<Message, Error> {
    let json = serde_json::to_string(message)?;
    Ok(Message::Text(json))
}

/// Decode one inbound frame.
///
/// Returns `None` for frames that carry no message: control frames, binary
/// frames, and text that does not parse as `T`.
pub fn decode<T: DeserializeOwned>(frame: Result<Message, tungstenite::Error>) -> Option<Result<T, Error>> {
    match frame {
        Ok(Message::Text(text)) => match serde_json::from_str(&text) {
            Ok(message) => Some(Ok(message)),
            Err(e) => {
                warn!(error = %e, frame = %text, "dropping undecodable frame");
                None
            }
        },
        Ok(Message::Close(frame)) => {
            trace!(?frame, "peer sent close");
            None
        }
        Ok(_) => None,
        Err(e) => Some(Err(e.into())),
    }
}

/// Wrap the write half of a WebSocket as a sink of `T`
pub fn json_sink<T, S>(sink: S) -> impl Sink<T, Error = Error> + Send + Unpin
where
    T: Serialize,
    S: Sink<Message, Error = tungstenite::Error> + Send + Unpin,
{
    sink.sink_map_err(Error::from)
        .with(|message: T| future::ready(encode(&message)))
}

/// Wrap the read half of a WebSocket as a stream of `T`
pub fn json_stream<T, S>(stream: S) -> impl Stream<Item = Result<T, Error>> + Send + Unpin
where
    T: DeserializeOwned + Send,
    S: Stream<Item = Result<Message, tungstenite::Error>> + Send + Unpin,
{
    stream.filter_map(|frame| future::ready(decode(frame)))
}
