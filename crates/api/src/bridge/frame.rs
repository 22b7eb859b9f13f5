//! Server-sent event framing.
//!
//! Each frame is an `event:` line, a single `data:` line holding one
//! JSON document, and a blank separator line. Frames pass one at a time
//! through a capacity-1 channel into axum's [`Sse`] body, so a stalled
//! client stalls the session instead of frames piling up in memory.

use std::convert::Infallible;

use axum::http::header::CONNECTION;
use axum::http::HeaderName;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Frames buffered between the session and the HTTP body.
const FRAME_CHANNEL_CAPACITY: usize = 1;

/// Event names carried on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Progress,
    Result,
    Error,
}

impl FrameKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameKind::Progress => "progress",
            FrameKind::Result => "result",
            FrameKind::Error => "error",
        }
    }
}

/// Payload of an `error` frame.
#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Failed to encode {kind} frame: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: axum::Error,
    },

    /// The receiving side (the HTTP body) is gone.
    #[error("Client disconnected")]
    Disconnected,
}

/// Encode one frame.
pub fn encode_frame<T: Serialize + ?Sized>(
    kind: FrameKind,
    payload: &T,
) -> Result<Event, FrameError> {
    Event::default()
        .event(kind.as_str())
        .json_data(payload)
        .map_err(|source| FrameError::Encode {
            kind: kind.as_str(),
            source,
        })
}

/// Sending half of a frame stream, owned by one session.
#[derive(Debug)]
pub struct FrameWriter {
    tx: mpsc::Sender<Event>,
}

/// Create a connected writer and the frame receiver that feeds the body.
pub fn channel() -> (FrameWriter, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    (FrameWriter { tx }, rx)
}

impl FrameWriter {
    /// Encode and queue one frame.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        kind: FrameKind,
        payload: &T,
    ) -> Result<(), FrameError> {
        let frame = encode_frame(kind, payload)?;
        self.tx
            .send(frame)
            .await
            .map_err(|_| FrameError::Disconnected)
    }

    /// Queue an `error` frame carrying `message`.
    pub async fn send_error(&self, message: impl Into<String>) -> Result<(), FrameError> {
        self.send(
            FrameKind::Error,
            &ErrorPayload {
                error: message.into(),
            },
        )
        .await
    }

    /// Resolve once the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Wrap a frame receiver in a `text/event-stream` response.
///
/// [`Sse`] sets the content type and `Cache-Control: no-cache`; proxy
/// buffering is turned off and the connection kept open for the life of
/// the stream.
pub fn event_stream_response(frames: mpsc::Receiver<Event>) -> Response {
    let stream = ReceiverStream::new(frames).map(Ok::<_, Infallible>);
    (
        [
            (HeaderName::from_static("x-accel-buffering"), "no"),
            (CONNECTION, "keep-alive"),
        ],
        Sse::new(stream),
    )
        .into_response()
}
