//! Event handler registry
//!
//! Handlers are grouped by event name. Each group decodes a dispatch body once
//! and starts one task per handler, so a slow handler never holds up the
//! protocol loop.

use super::GatewayEvent;
use crate::error::{GatewayError, GatewayResult};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::value::RawValue;
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Identifies one registered handler
pub type HandlerId = u64;

type Callback<E> = Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Type-erased handler list for a single event name
trait HandlerSlot: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn len(&self) -> usize;

    fn remove(&self, id: HandlerId) -> bool;

    /// Decode `raw` and build one invocation per handler. Does not decode when
    /// the list is empty.
    fn prepare(&self, raw: &str) -> Result<Vec<BoxFuture<'static, ()>>, serde_json::Error>;
}

struct TypedSlot<E> {
    handlers: RwLock<Vec<(HandlerId, Callback<E>)>>,
}

impl<E> TypedSlot<E> {
    fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<E: GatewayEvent> HandlerSlot for TypedSlot<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.handlers.read().len()
    }

    fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    fn prepare(&self, raw: &str) -> Result<Vec<BoxFuture<'static, ()>>, serde_json::Error> {
        // Copy the list out so no lock is held while handlers run.
        let callbacks: Vec<Callback<E>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        if callbacks.is_empty() {
            return Ok(Vec::new());
        }

        let event = Arc::new(serde_json::from_str::<E>(raw)?);
        Ok(callbacks
            .into_iter()
            .map(|callback| {
                let event = Arc::clone(&event);
                Box::pin(async move { callback(event).await }) as BoxFuture<'static, ()>
            })
            .collect())
    }
}

/// Registry of dispatch event handlers
///
/// Shared between the client (which registers) and the protocol loop (which
/// dispatches). Registrations outlive individual connections.
pub struct HandlerRegistry {
    slots: DashMap<&'static str, Arc<dyn HandlerSlot>>,
    next_id: AtomicU64,
    tasks: Mutex<JoinSet<()>>,
    permits: Arc<Semaphore>,
}

impl HandlerRegistry {
    /// Default limit on concurrently running handler tasks
    pub const DEFAULT_CONCURRENCY: usize = 64;

    #[must_use]
    pub fn new() -> Self {
        Self::with_concurrency(Self::DEFAULT_CONCURRENCY)
    }

    /// Limit how many handler tasks run at once. Dispatch never waits on the
    /// limit; queued tasks wait inside the task instead.
    #[must_use]
    pub fn with_concurrency(limit: usize) -> Self {
        Self {
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(JoinSet::new()),
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Register an async handler for `E`
    ///
    /// Fails if another Rust type was already registered under `E::NAME`.
    pub fn register<E, F, Fut>(&self, handler: F) -> GatewayResult<HandlerRegistration>
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let slot = Arc::clone(
            self.slots
                .entry(E::NAME)
                .or_insert_with(|| Arc::new(TypedSlot::<E>::new()) as Arc<dyn HandlerSlot>)
                .value(),
        );
        let typed = slot
            .as_any()
            .downcast_ref::<TypedSlot<E>>()
            .ok_or(GatewayError::EventTypeConflict { event: E::NAME })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<E> =
            Arc::new(move |event: Arc<E>| -> BoxFuture<'static, ()> { Box::pin(handler(event)) });
        typed.handlers.write().push((id, callback));

        tracing::debug!(event_type = E::NAME, handler_id = id, "Handler registered");

        Ok(HandlerRegistration {
            event: E::NAME,
            id,
            slot: Arc::downgrade(&slot),
            released: AtomicBool::new(false),
        })
    }

    /// Number of handlers currently registered for an event name
    #[must_use]
    pub fn len(&self, event_type: &str) -> usize {
        self.slots.get(event_type).map_or(0, |slot| slot.len())
    }

    /// Whether no handlers are registered at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.len() == 0)
    }

    /// Decode a dispatch body and start every handler registered for it
    ///
    /// Returns the number of handler tasks started. Unknown event types and
    /// empty handler lists return `Ok(0)` without decoding.
    pub fn dispatch(&self, event_type: &str, data: Option<&RawValue>) -> GatewayResult<usize> {
        let Some(slot) = self.slots.get(event_type).map(|slot| Arc::clone(slot.value())) else {
            return Ok(0);
        };

        let invocations = slot
            .prepare(data.map_or("null", RawValue::get))
            .map_err(|source| GatewayError::DispatchDecode {
                event: event_type.to_string(),
                source,
            })?;

        let started = invocations.len();
        if started == 0 {
            return Ok(0);
        }

        let mut tasks = self.tasks.lock();
        while let Some(result) = tasks.try_join_next() {
            log_handler_result(result);
        }
        for invocation in invocations {
            let permits = Arc::clone(&self.permits);
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                invocation.await;
            });
        }

        tracing::trace!(event_type, handlers = started, "Event dispatched");
        Ok(started)
    }

    /// Handler tasks started but not yet reaped
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Wait for in-flight handler tasks, aborting any still running after `timeout`
    ///
    /// Returns the number of tasks that had to be aborted.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            return 0;
        }

        let finished = tokio::time::timeout(timeout, async {
            while let Some(result) = tasks.join_next().await {
                log_handler_result(result);
            }
        })
        .await;

        if finished.is_ok() {
            return 0;
        }

        let remaining = tasks.len();
        tracing::warn!(
            remaining,
            timeout_ms = timeout.as_millis() as u64,
            "Handlers still running after drain timeout, aborting"
        );
        tasks.shutdown().await;
        remaining
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.slots.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn log_handler_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Event handler panicked");
        }
    }
}

/// Removal token returned by [`HandlerRegistry::register`]
///
/// Dropping the token keeps the handler registered; call [`release`](Self::release)
/// or convert it with [`into_guard`](Self::into_guard) to tie removal to a scope.
#[derive(Debug)]
pub struct HandlerRegistration {
    event: &'static str,
    id: HandlerId,
    slot: Weak<dyn HandlerSlot>,
    released: AtomicBool,
}

impl HandlerRegistration {
    #[must_use]
    pub fn event(&self) -> &'static str {
        self.event
    }

    #[must_use]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Remove the handler. Safe to call more than once; returns whether this
    /// call did the removal.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        let removed = self.slot.upgrade().is_some_and(|slot| slot.remove(self.id));
        if removed {
            tracing::debug!(event_type = self.event, handler_id = self.id, "Handler released");
        }
        removed
    }

    /// Release automatically when the returned guard is dropped
    #[must_use]
    pub fn into_guard(self) -> RegistrationGuard {
        RegistrationGuard(self)
    }
}

/// Releases its registration on drop
#[derive(Debug)]
pub struct RegistrationGuard(HandlerRegistration);

impl RegistrationGuard {
    #[must_use]
    pub fn registration(&self) -> &HandlerRegistration {
        &self.0
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}
