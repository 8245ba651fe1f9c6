//! # chord-gateway
//!
//! WebSocket gateway client: connects, identifies, keeps the heartbeat going,
//! and fans dispatch events out to registered handlers.

pub mod client;
pub mod connection;
pub mod error;
pub mod events;
pub mod protocol;

pub use client::{GatewayClient, GatewayConfig, GATEWAY_VERSION};
pub use error::{Activity, GatewayError, GatewayResult};
pub use events::{GatewayEvent, HandlerRegistration, HandlerRegistry};
pub use protocol::{OpCode, Payload};
