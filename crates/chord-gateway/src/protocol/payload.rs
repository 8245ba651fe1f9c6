//! Gateway payload envelope
//!
//! Every message in either direction is a `{op, d, s, t}` object.

use super::OpCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Gateway payload envelope
///
/// `d` is kept as raw JSON so it is only decoded once the receiver knows what it
/// should contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// Operation code (raw, so unknown values still decode)
    pub op: i64,

    /// Opcode-specific body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Box<RawValue>>,

    /// Sequence number (Dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event type (Dispatch only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl Payload {
    /// Payload with no body
    #[must_use]
    pub fn new(op: OpCode) -> Self {
        Self {
            op: op.as_i64(),
            d: None,
            s: None,
            t: None,
        }
    }

    /// Payload with a serialized body
    pub fn with_data<T: Serialize + ?Sized>(op: OpCode, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            d: Some(serde_json::value::to_raw_value(data)?),
            ..Self::new(op)
        })
    }

    /// Dispatch payload (op=0), as the server sends it
    pub fn dispatch<T: Serialize + ?Sized>(
        event_type: impl Into<String>,
        sequence: u64,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            s: Some(sequence),
            t: Some(event_type.into()),
            ..Self::with_data(OpCode::Dispatch, data)?
        })
    }

    /// Hello payload (op=10), as the server sends it
    pub fn hello(heartbeat_interval: u64) -> Result<Self, serde_json::Error> {
        Self::with_data(OpCode::Hello, &super::HelloPayload::with_interval(heartbeat_interval))
    }

    /// Known opcode, or `None` for values this client does not understand
    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_i64(self.op)
    }

    /// Raw body, if present
    #[must_use]
    pub fn raw_data(&self) -> Option<&RawValue> {
        self.d.as_deref()
    }

    /// Decode the body. An absent body decodes as JSON `null`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.d.as_ref().map_or("null", |d| d.get()))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from JSON bytes
    pub fn from_slice(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.opcode() {
            Some(op) => write!(f, "Payload(op={op}")?,
            None => write!(f, "Payload(op=unknown ({})", self.op)?,
        }
        if let Some(t) = &self.t {
            write!(f, ", t={t}")?;
        }
        if let Some(s) = self.s {
            write!(f, ", s={s}")?;
        }
        write!(f, ")")
    }
}
