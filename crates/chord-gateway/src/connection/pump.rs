//! Socket pumps
//!
//! The read pump turns frames into payloads for the protocol loop; the write
//! pump serializes the protocol loop's payloads onto the socket. Each pump is
//! the only code touching its half of the socket.

use super::shutdown_requested;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{codec, Payload};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Read frames until cancellation, a transport error, a close frame, or a
/// payload that fails to decode
pub async fn read_pump<S>(
    mut stream: S,
    inbound: mpsc::Sender<Payload>,
    mut shutdown: watch::Receiver<bool>,
) -> GatewayResult<()>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => return Ok(()),
            next = stream.next() => next,
        };

        // Errors caused by our own shutdown closing the socket are not errors.
        let stopping = *shutdown.borrow();

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(_)) | None if stopping => return Ok(()),
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(GatewayError::Closed {
                    code: None,
                    reason: "stream ended".to_string(),
                })
            }
        };

        if let Message::Close(frame) = &message {
            if stopping {
                return Ok(());
            }
            let (code, reason) = frame.as_ref().map_or((None, String::new()), |frame| {
                (Some(u16::from(frame.code)), frame.reason.to_string())
            });
            tracing::info!(code = ?code, reason = %reason, "Gateway closed the connection");
            return Err(GatewayError::Closed { code, reason });
        }

        let Some(payload) = codec::decode(&message)? else {
            continue;
        };

        tracing::trace!(op = payload.op, t = ?payload.t, s = ?payload.s, "Received payload");

        tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => return Ok(()),
            sent = inbound.send(payload) => {
                // The protocol loop is gone; its own result explains why.
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

/// Write queued payloads until cancellation or the queue closes, then close
/// the socket
pub async fn write_pump<K>(
    mut sink: K,
    mut outbound: mpsc::Receiver<Payload>,
    mut shutdown: watch::Receiver<bool>,
) -> GatewayResult<()>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let result = loop {
        let payload = tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break Ok(()),
            payload = outbound.recv() => match payload {
                Some(payload) => payload,
                None => break Ok(()),
            },
        };

        let message = match codec::encode(&payload) {
            Ok(message) => message,
            Err(e) => break Err(e),
        };

        tracing::trace!(op = payload.op, "Sending payload");

        tokio::select! {
            biased;
            () = shutdown_requested(&mut shutdown) => break Ok(()),
            sent = sink.send(message) => {
                if let Err(e) = sent {
                    break Err(e.into());
                }
            }
        }
    };

    // Sends a close frame; the peer's answer ends the read side.
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Error while closing the socket");
    }

    result
}
