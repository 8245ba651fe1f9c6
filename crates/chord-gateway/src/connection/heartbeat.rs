//! Heartbeat scheduling
//!
//! The timer is armed by Hello and owned by the protocol loop, so it stops
//! whenever the loop exits.

use std::future::pending;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Heartbeat timer for one connection
///
/// Disarmed until [`start`](Self::start); a disarmed timer never ticks, so
/// [`tick`](Self::tick) can sit in a `select!` from the moment the connection opens.
#[derive(Debug, Default)]
pub struct Heartbeat {
    interval: Option<Interval>,
    missed_acks: u32,
}

impl Heartbeat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. The first tick fires one full `period` from now.
    ///
    /// # Panics
    /// Panics if `period` is zero; callers reject a zero interval first.
    pub fn start(&mut self, period: Duration) {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.missed_acks = 0;
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        self.interval.as_ref().map(Interval::period)
    }

    /// Wait for the next tick. Pending forever while disarmed.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => pending().await,
        }
    }

    /// Count a tick that found the previous heartbeat still unacknowledged
    pub fn record_missed_ack(&mut self) -> u32 {
        self.missed_acks = self.missed_acks.saturating_add(1);
        self.missed_acks
    }

    pub fn ack_received(&mut self) {
        self.missed_acks = 0;
    }

    /// Consecutive ticks without an ACK in between
    #[must_use]
    pub fn missed_acks(&self) -> u32 {
        self.missed_acks
    }
}
