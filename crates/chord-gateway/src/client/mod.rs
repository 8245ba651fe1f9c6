//! Gateway client
//!
//! Owns one connection at a time: resolves the gateway URL, opens the socket,
//! runs the read pump, the write pump and the protocol loop side by side, and
//! reports the first error any of them hit.

mod config;
mod protocol_loop;

pub use config::{GatewayConfig, GATEWAY_VERSION};

use crate::connection::{read_pump, write_pump, Session};
use crate::error::{Activity, GatewayError, GatewayResult};
use crate::events::{GatewayEvent, HandlerRegistration, HandlerRegistry};
use crate::protocol::{OpCode, Payload, StatusUpdate};
use chord_rest::RestClient;
use futures_util::StreamExt;
use parking_lot::RwLock;
use protocol_loop::ProtocolLoop;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::connect_async;

/// Gateway client
///
/// Handlers registered through [`add_handler`](Self::add_handler) belong to the
/// client, not to a connection, so they keep firing across repeated
/// [`run`](Self::run) calls.
pub struct GatewayClient {
    rest: Arc<dyn RestClient>,
    config: GatewayConfig,
    registry: Arc<HandlerRegistry>,
    session: RwLock<Option<Arc<Session>>>,
    outbound: RwLock<Option<mpsc::Sender<Payload>>>,
    running: AtomicBool,
}

impl GatewayClient {
    #[must_use]
    pub fn new(rest: Arc<dyn RestClient>, config: GatewayConfig) -> Self {
        let registry = Arc::new(HandlerRegistry::with_concurrency(config.handler_concurrency));
        Self {
            rest,
            config,
            registry,
            session: RwLock::new(None),
            outbound: RwLock::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Connect and run until `cancel` completes or the connection fails
    ///
    /// Cancellation is not an error. Any other way the connection ends is
    /// returned as an error tagged with the activity that saw it first. Call
    /// `run` again to reconnect.
    pub async fn run<F>(&self, cancel: F) -> GatewayResult<()>
    where
        F: Future<Output = ()>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GatewayError::AlreadyRunning);
        }
        let _running = RunningGuard(self);

        tokio::pin!(cancel);

        let info = tokio::select! {
            biased;
            () = &mut cancel => return Ok(()),
            info = self.rest.gateway() => info?,
        };
        let url = info.connect_url(self.config.version)?;

        tracing::info!(url = %url, suggested_shards = ?info.shards, "Connecting to gateway");

        let connect = tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str()));
        let (socket, _) = tokio::select! {
            biased;
            () = &mut cancel => return Ok(()),
            connected = connect => connected.map_err(|_| GatewayError::ConnectTimeout)??,
        };

        tracing::info!(url = %url, "Connected to gateway");

        let (sink, stream) = socket.split();
        let capacity = self.config.channel_capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Arc::new(Session::new());
        *self.session.write() = Some(Arc::clone(&session));

        let protocol = ProtocolLoop::new(
            self.config.identify_payload(),
            session,
            Arc::clone(&self.registry),
            outbound_tx.clone(),
            inbound_rx,
            shutdown_rx.clone(),
        )
        .tolerate_dispatch_errors(self.config.tolerate_dispatch_errors);
        *self.outbound.write() = Some(outbound_tx);

        let mut activities = JoinSet::new();
        let mut tags = HashMap::new();
        let read_rx = shutdown_rx.clone();
        let handle = activities.spawn(async move {
            (Activity::Read, read_pump(stream, inbound_tx, read_rx).await)
        });
        tags.insert(handle.id(), Activity::Read);
        let handle = activities.spawn(async move {
            (Activity::Write, write_pump(sink, outbound_rx, shutdown_rx).await)
        });
        tags.insert(handle.id(), Activity::Write);
        let handle = activities.spawn(async move { (Activity::Protocol, protocol.run().await) });
        tags.insert(handle.id(), Activity::Protocol);

        let mut first_error = None;
        let mut cancelled = false;

        while !activities.is_empty() {
            tokio::select! {
                () = &mut cancel, if !cancelled => {
                    cancelled = true;
                    tracing::info!("Cancellation requested, closing gateway connection");
                    let _ = shutdown_tx.send(true);
                }
                Some(joined) = activities.join_next_with_id() => {
                    // The first activity to stop takes the others down with it.
                    let _ = shutdown_tx.send(true);

                    let (activity, result) = match joined {
                        Ok((_, finished)) => finished,
                        Err(e) => {
                            let activity = tags.get(&e.id()).copied().unwrap_or(Activity::Protocol);
                            let message = e.to_string();
                            (activity, Err(GatewayError::TaskFailed { activity, message }))
                        }
                    };

                    match result {
                        Ok(()) => tracing::debug!(activity = %activity, "Activity finished"),
                        Err(e) => {
                            tracing::debug!(activity = %activity, error = %e, "Activity failed");
                            if first_error.is_none() {
                                first_error = Some(match e {
                                    e @ GatewayError::TaskFailed { .. } => e,
                                    e => e.in_activity(activity),
                                });
                            }
                        }
                    }
                }
            }
        }

        *self.outbound.write() = None;

        let aborted = self.registry.drain(self.config.handler_drain_timeout).await;
        match &first_error {
            Some(e) => tracing::warn!(error = %e, aborted_handlers = aborted, "Gateway connection ended"),
            None => tracing::info!(aborted_handlers = aborted, "Gateway connection closed"),
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Queue a payload on the live connection
    ///
    /// Fails with [`GatewayError::NotConnected`] outside of [`run`](Self::run).
    pub async fn send<T>(&self, op: OpCode, data: &T) -> GatewayResult<()>
    where
        T: Serialize + ?Sized,
    {
        let sender = self.outbound.read().clone().ok_or(GatewayError::NotConnected)?;
        let payload = Payload::with_data(op, data).map_err(GatewayError::Encoding)?;
        sender.send(payload).await.map_err(|_| GatewayError::NotConnected)
    }

    /// Change the presence shown for this session
    pub async fn update_status(&self, status: &StatusUpdate) -> GatewayResult<()> {
        self.send(OpCode::StatusUpdate, status).await
    }

    /// Register an async handler for `E`
    pub fn add_handler<E, F, Fut>(&self, handler: F) -> GatewayResult<HandlerRegistration>
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.registry.register::<E, F, Fut>(handler)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Session of the current or most recent connection
    #[must_use]
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.read().clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("shard", &self.config.shard)
            .field("running", &self.is_running())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Clears the running flag and the outbound queue when `run` returns or is dropped
struct RunningGuard<'a>(&'a GatewayClient);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.outbound.write().take();
        self.0.running.store(false, Ordering::Release);
    }
}
