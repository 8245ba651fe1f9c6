//! Connection plumbing: per-connection state, heartbeat timer and socket pumps

pub mod heartbeat;
pub mod pump;
pub mod session;

pub use heartbeat::Heartbeat;
pub use pump::{read_pump, write_pump};
pub use session::Session;

use tokio::sync::watch;

/// Resolve once shutdown has been signalled, or the signal's owner is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
