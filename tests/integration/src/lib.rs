//! Integration test utilities for the gateway client
//!
//! Provides an in-process mock gateway and canned REST responses so the
//! client can be driven end to end over a real WebSocket.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
