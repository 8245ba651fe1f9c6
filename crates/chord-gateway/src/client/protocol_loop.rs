//! Protocol state machine
//!
//! Consumes inbound payloads, keeps the heartbeat going, identifies after
//! Hello and routes dispatches to the handler registry. One instance runs per
//! connection attempt.

use crate::connection::{shutdown_requested, Heartbeat, Session};
use crate::error::{GatewayError, GatewayResult};
use crate::events::{HandlerRegistry, Ready};
use crate::protocol::{HelloPayload, IdentifyPayload, OpCode, Payload};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

pub(crate) struct ProtocolLoop {
    identify: IdentifyPayload,
    session: Arc<Session>,
    registry: Arc<HandlerRegistry>,
    outbound: mpsc::Sender<Payload>,
    inbound: mpsc::Receiver<Payload>,
    shutdown: watch::Receiver<bool>,
    heartbeat: Heartbeat,
    tolerate_dispatch_errors: bool,
}

impl ProtocolLoop {
    pub(crate) fn new(
        identify: IdentifyPayload,
        session: Arc<Session>,
        registry: Arc<HandlerRegistry>,
        outbound: mpsc::Sender<Payload>,
        inbound: mpsc::Receiver<Payload>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            identify,
            session,
            registry,
            outbound,
            inbound,
            shutdown,
            heartbeat: Heartbeat::new(),
            tolerate_dispatch_errors: false,
        }
    }

    pub(crate) fn tolerate_dispatch_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_dispatch_errors = tolerate;
        self
    }

    /// Run until cancellation, the inbound queue closing, or a fatal payload
    pub(crate) async fn run(mut self) -> GatewayResult<()> {
        let session = Arc::clone(&self.session);
        let _ready = self
            .registry
            .register::<Ready, _, _>(move |ready| {
                let session = Arc::clone(&session);
                async move {
                    tracing::info!(session_id = %ready.session_id, "Session established");
                    session.set_session_id(ready.session_id.clone());
                }
            })?
            .into_guard();

        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut self.shutdown) => {
                    self.drain_queued().await;
                    return Ok(());
                }
                payload = self.inbound.recv() => match payload {
                    Some(payload) => self.handle(payload).await?,
                    None => return Ok(()),
                },
                _ = self.heartbeat.tick() => self.on_tick().await?,
            }
        }
    }

    /// Process whatever the read pump queued before shutdown was signalled
    async fn drain_queued(&mut self) {
        while let Ok(payload) = self.inbound.try_recv() {
            if let Err(e) = self.handle(payload).await {
                tracing::debug!(error = %e, "Discarding queued payloads after shutdown");
                break;
            }
        }
    }

    async fn handle(&mut self, payload: Payload) -> GatewayResult<()> {
        match payload.opcode() {
            Some(OpCode::Dispatch) => self.on_dispatch(&payload),
            Some(OpCode::Hello) => self.on_hello(&payload).await,
            Some(OpCode::Heartbeat) => {
                tracing::debug!("Gateway requested a heartbeat");
                self.send_heartbeat().await
            }
            Some(OpCode::HeartbeatAck) => {
                self.session.ack_heartbeat();
                self.heartbeat.ack_received();
                tracing::trace!(latency = ?self.session.latency(), "Heartbeat acknowledged");
                Ok(())
            }
            Some(OpCode::InvalidSession) => {
                let resumable = payload
                    .data::<Option<bool>>()
                    .map_err(GatewayError::Decoding)?
                    .unwrap_or(false);
                tracing::warn!(resumable, "Gateway invalidated the session");
                Err(GatewayError::InvalidSession { resumable })
            }
            Some(OpCode::Reconnect) => {
                tracing::info!("Gateway asked for a reconnect, ignoring");
                Ok(())
            }
            Some(op) => Err(GatewayError::Protocol {
                op: payload.op,
                message: format!("{op} is not sent by the gateway"),
            }),
            None => Err(GatewayError::Protocol {
                op: payload.op,
                message: format!(
                    "unknown op code (t={:?}, s={:?}, d={})",
                    payload.t,
                    payload.s,
                    payload.raw_data().map_or("null", |d| d.get())
                ),
            }),
        }
    }

    async fn on_hello(&mut self, payload: &Payload) -> GatewayResult<()> {
        if self.heartbeat.is_armed() {
            tracing::warn!("Ignoring repeated Hello");
            return Ok(());
        }

        let hello: HelloPayload = payload.data().map_err(GatewayError::Decoding)?;
        if hello.heartbeat_interval == 0 {
            return Err(GatewayError::Protocol {
                op: OpCode::Hello.as_i64(),
                message: "heartbeat interval must be positive".to_string(),
            });
        }

        self.heartbeat.start(Duration::from_millis(hello.heartbeat_interval));
        tracing::info!(heartbeat_interval_ms = hello.heartbeat_interval, "Received Hello, identifying");

        let identify =
            Payload::with_data(OpCode::Identify, &self.identify).map_err(GatewayError::Encoding)?;
        self.send(identify).await
    }

    fn on_dispatch(&self, payload: &Payload) -> GatewayResult<()> {
        if let Some(seq) = payload.s {
            self.session.set_sequence(seq);
        }

        let Some(event_type) = payload.t.as_deref() else {
            tracing::warn!(sequence = ?payload.s, "Dispatch without an event type");
            return Ok(());
        };

        tracing::debug!(event_type, sequence = ?payload.s, "Dispatch");

        match self.registry.dispatch(event_type, payload.raw_data()) {
            Ok(_) => Ok(()),
            Err(e) if self.tolerate_dispatch_errors => {
                tracing::warn!(error = %e, "Skipping event that failed to decode");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn on_tick(&mut self) -> GatewayResult<()> {
        if !self.session.is_heartbeat_acked() {
            let missed = self.heartbeat.record_missed_ack();
            tracing::warn!(missed, "No HeartbeatAck since the last heartbeat, connection may be zombied");
        }
        self.send_heartbeat().await
    }

    async fn send_heartbeat(&mut self) -> GatewayResult<()> {
        let payload = match self.session.last_sequence() {
            Some(seq) => Payload::with_data(OpCode::Heartbeat, &seq).map_err(GatewayError::Encoding)?,
            None => Payload::new(OpCode::Heartbeat),
        };
        tracing::trace!(sequence = ?self.session.last_sequence(), "Sending heartbeat");
        self.session.heartbeat_sent();
        self.send(payload).await
    }

    async fn send(&mut self, payload: Payload) -> GatewayResult<()> {
        // The write pump only goes away during shutdown or after its own error.
        if self.outbound.send(payload).await.is_err() && !*self.shutdown.borrow() {
            return Err(GatewayError::NotConnected);
        }
        Ok(())
    }
}
