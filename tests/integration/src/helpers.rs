//! Test helpers for integration tests
//!
//! A mock gateway bound to an ephemeral port, REST stand-ins that point the
//! client at it, and a runner that drives `GatewayClient::run` in the
//! background until told to stop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chord_gateway::protocol::IdentifyPayload;
use chord_gateway::{GatewayClient, GatewayConfig, GatewayResult, OpCode, Payload};
use chord_rest::{GatewayInfo, RestClient, RestError, RestResult, User};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::fixtures::TEST_TOKEN;

/// Upper bound on any single wait in a test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A mock gateway server
pub struct MockGateway {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockGateway {
    /// Bind to an available port
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// WebSocket URL, as `GET /gateway` would report it
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// REST collaborator that points at this gateway
    pub fn rest(&self) -> Arc<dyn RestClient> {
        Arc::new(StaticRest::new(self.url()))
    }

    /// Accept a single connection and complete the WebSocket handshake
    pub async fn accept(&self) -> Result<GatewaySocket> {
        let (stream, _) = timeout(TEST_TIMEOUT, self.listener.accept()).await??;
        let ws = accept_async(stream).await?;
        Ok(GatewaySocket { ws })
    }

    /// Whether a client connects within `wait`
    pub async fn was_contacted(&self, wait: Duration) -> bool {
        timeout(wait, self.listener.accept()).await.is_ok()
    }
}

/// Server side of one client connection
pub struct GatewaySocket {
    ws: WebSocketStream<TcpStream>,
}

impl GatewaySocket {
    pub async fn send(&mut self, payload: &Payload) -> Result<()> {
        self.ws.send(Message::text(payload.to_json()?)).await?;
        Ok(())
    }

    /// Send a hand-written frame
    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.ws.send(Message::text(value.to_string())).await?;
        Ok(())
    }

    pub async fn dispatch(&mut self, event_type: &str, sequence: u64, data: &Value) -> Result<()> {
        self.send(&Payload::dispatch(event_type, sequence, data)?).await
    }

    /// Send Hello and return the Identify the client answers with
    pub async fn hello(&mut self, heartbeat_interval: u64) -> Result<IdentifyPayload> {
        self.send(&Payload::hello(heartbeat_interval)?).await?;
        let identify = self.expect().await?;
        if identify.opcode() != Some(OpCode::Identify) {
            bail!("expected Identify, got {identify}");
        }
        Ok(identify.data()?)
    }

    /// Next payload from the client; `None` once the client has closed
    pub async fn recv(&mut self) -> Result<Option<Payload>> {
        while let Some(message) = self.ws.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(Payload::from_json(&text)?)),
                Message::Binary(bytes) => return Ok(Some(Payload::from_slice(&bytes)?)),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    /// Next payload, failing if none arrives within [`TEST_TIMEOUT`]
    pub async fn expect(&mut self) -> Result<Payload> {
        timeout(TEST_TIMEOUT, self.recv())
            .await??
            .ok_or_else(|| anyhow!("client closed the connection"))
    }

    /// Whether the client closes the connection within [`TEST_TIMEOUT`]
    pub async fn observes_close(&mut self) -> bool {
        let closed = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
        };
        timeout(TEST_TIMEOUT, closed).await.is_ok()
    }

    /// Close the connection with a gateway close code
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.ws
            .close(Some(CloseFrame {
                code: WsCloseCode::from(code),
                reason: reason.to_string().into(),
            }))
            .await?;
        Ok(())
    }
}

/// Gateway lookup that always returns the same URL
pub struct StaticRest {
    info: GatewayInfo,
}

impl StaticRest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            info: GatewayInfo {
                url: url.into(),
                shards: Some(1),
            },
        }
    }
}

#[async_trait]
impl RestClient for StaticRest {
    async fn gateway(&self) -> RestResult<GatewayInfo> {
        Ok(self.info.clone())
    }

    async fn user(&self, _id: &str) -> RestResult<User> {
        Err(RestError::from_response(404, br#"{"code": 10013, "message": "Unknown User"}"#))
    }
}

/// Gateway lookup that always fails with the given status
pub struct FailingRest {
    pub status: u16,
}

#[async_trait]
impl RestClient for FailingRest {
    async fn gateway(&self) -> RestResult<GatewayInfo> {
        Err(RestError::from_response(
            self.status,
            br#"{"code": 0, "message": "401: Unauthorized"}"#,
        ))
    }

    async fn user(&self, _id: &str) -> RestResult<User> {
        Err(RestError::from_response(self.status, b""))
    }
}

/// Client configuration used across tests
pub fn test_config() -> GatewayConfig {
    GatewayConfig::new(TEST_TOKEN)
        .with_connect_timeout(TEST_TIMEOUT)
        .with_handler_drain_timeout(Duration::from_secs(1))
}

/// A `run` call in progress
pub struct RunningClient {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<GatewayResult<()>>,
}

impl RunningClient {
    /// Start `client.run` in the background
    pub fn spawn(client: &Arc<GatewayClient>) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let client = Arc::clone(client);
        let handle = tokio::spawn(async move {
            client
                .run(async move {
                    let _ = cancel_rx.await;
                })
                .await
        });
        Self {
            cancel: Some(cancel_tx),
            handle,
        }
    }

    /// Cancel the run and return its result
    pub async fn stop(mut self) -> Result<GatewayResult<()>> {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.finish().await
    }

    /// Wait for the run to end on its own
    pub async fn finish(self) -> Result<GatewayResult<()>> {
        Ok(timeout(TEST_TIMEOUT, self.handle).await??)
    }
}

/// Poll `condition` until it holds, failing after [`TEST_TIMEOUT`]
pub async fn wait_until(condition: impl Fn() -> bool) -> Result<()> {
    timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("condition not met within {TEST_TIMEOUT:?}"))
}

/// Run `future` with the test timeout applied
pub async fn within<T>(future: impl Future<Output = T>) -> Result<T> {
    Ok(timeout(TEST_TIMEOUT, future).await?)
}
