//! Per-connection session state
//!
//! Created fresh for every connection attempt and shared between the protocol
//! loop and the handler that captures the session id from READY.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// State observed over one gateway connection
#[derive(Debug)]
pub struct Session {
    /// Session id from READY
    session_id: RwLock<Option<String>>,

    /// Sequence number of the last dispatch; 0 until one is seen
    sequence: AtomicU64,

    /// Whether the last heartbeat we sent has been acknowledged
    heartbeat_acked: AtomicBool,

    /// When the last heartbeat was sent
    last_heartbeat: Mutex<Option<Instant>>,

    /// Round trip of the last acknowledged heartbeat
    latency: Mutex<Option<Duration>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: RwLock::new(None),
            sequence: AtomicU64::new(0),
            heartbeat_acked: AtomicBool::new(true),
            last_heartbeat: Mutex::new(None),
            latency: Mutex::new(None),
        }
    }

    /// Session id, once READY has been handled
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.write() = Some(session_id.into());
    }

    /// Sequence number of the most recently processed dispatch
    ///
    /// 0 doubles as "nothing seen yet", so a dispatch carrying `s: 0` reads
    /// back as `None` and is left out of the next heartbeat.
    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }

    /// Record a dispatch sequence number. Later values replace earlier ones
    /// whether or not they are larger.
    pub fn set_sequence(&self, seq: u64) {
        self.sequence.store(seq, Ordering::SeqCst);
    }

    /// Mark a heartbeat as sent and waiting for its ACK
    pub fn heartbeat_sent(&self) {
        self.heartbeat_acked.store(false, Ordering::SeqCst);
        *self.last_heartbeat.lock() = Some(Instant::now());
    }

    /// Record a HeartbeatAck
    pub fn ack_heartbeat(&self) {
        self.heartbeat_acked.store(true, Ordering::SeqCst);
        if let Some(sent) = *self.last_heartbeat.lock() {
            *self.latency.lock() = Some(sent.elapsed());
        }
    }

    /// False between sending a heartbeat and receiving its ACK
    #[must_use]
    pub fn is_heartbeat_acked(&self) -> bool {
        self.heartbeat_acked.load(Ordering::SeqCst)
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        *self.latency.lock()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
