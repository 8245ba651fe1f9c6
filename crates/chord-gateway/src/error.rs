//! Gateway error types

use crate::protocol::CloseCode;
use chord_common::ConfigError;
use chord_rest::RestError;
use std::fmt;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// The concurrent activity a connection-ending error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    /// Socket read pump
    Read,
    /// Socket write pump
    Write,
    /// Protocol state machine
    Protocol,
}

impl Activity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "recv",
            Self::Write => "send",
            Self::Protocol => "run",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The socket failed to connect, read or write
    #[error("WebSocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// The gateway closed the connection
    #[error("Connection closed by gateway (code: {code:?}): {reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Timed out connecting to the gateway")]
    ConnectTimeout,

    #[error("Failed to encode payload: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("Failed to decode payload: {0}")]
    Decoding(#[source] serde_json::Error),

    /// A dispatch body did not match its registered event type
    #[error("Failed to decode {event} event: {source}")]
    DispatchDecode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// The gateway rejected the session
    #[error("Invalid session (resumable: {resumable})")]
    InvalidSession { resumable: bool },

    /// An opcode this client does not handle, or that the server should never send
    #[error("Protocol error on op {op}: {message}")]
    Protocol { op: i64, message: String },

    #[error("Gateway lookup failed: {0}")]
    Rest(#[from] RestError),

    #[error("Gateway client is not connected")]
    NotConnected,

    #[error("Gateway client is already running")]
    AlreadyRunning,

    #[error("Event {event} is already registered with a different payload type")]
    EventTypeConflict { event: &'static str },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A connection activity panicked or was aborted
    #[error("{activity} task failed: {message}")]
    TaskFailed { activity: Activity, message: String },

    /// An error tagged with the activity that produced it
    #[error("{activity}: {source}")]
    Activity {
        activity: Activity,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// Tag an error with the activity it came from
    #[must_use]
    pub fn in_activity(self, activity: Activity) -> Self {
        Self::Activity {
            activity,
            source: Box::new(self),
        }
    }

    /// The activity that ended the connection, if tagged
    #[must_use]
    pub fn activity(&self) -> Option<Activity> {
        match self {
            Self::Activity { activity, .. } | Self::TaskFailed { activity, .. } => Some(*activity),
            _ => None,
        }
    }

    /// The underlying error with activity tags stripped
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Activity { source, .. } => source.root(),
            other => other,
        }
    }

    /// Close code sent by the gateway, if it is one this client knows
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self.root() {
            Self::Closed { code: Some(code), .. } => CloseCode::from_u16(*code),
            _ => None,
        }
    }

    /// Whether calling `run` again has a chance of succeeding
    #[must_use]
    pub fn should_reconnect(&self) -> bool {
        match self.root() {
            Self::Closed { code: Some(code), .. } => {
                CloseCode::from_u16(*code).map_or(true, CloseCode::should_reconnect)
            }
            Self::Rest(e) => !matches!(e.status(), Some(401 | 403)),
            Self::AlreadyRunning | Self::EventTypeConflict { .. } | Self::Config(_) => false,
            _ => true,
        }
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
