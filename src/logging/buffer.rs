//! This module provides a bounded, thread-safe buffer of captured log entries.
//!
//! The `LogBuffer` keeps the most recent entries up to a fixed capacity and
//! tells registered observers whenever its contents change, so readers such
//! as the web layer can refresh without polling.
use super::LogEntry;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{error, warn};

/// Target used for the buffer's own diagnostics.
///
/// The collector skips events with this target so that reporting a failed
/// observer never adds to the buffer that is notifying it.
pub const DIAGNOSTICS_TARGET: &str = "log_relay::buffer";

/// The error an observer may report from a change notification.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// The result of delivering one change notification to an observer.
pub type ObserverResult = Result<(), ObserverError>;

/// Something that wants to know when a `LogBuffer` changed.
///
/// Notifications carry no payload; observers call `LogBuffer::get_all` if
/// they need the new contents. Closures of the shape
/// `Fn() -> ObserverResult` implement this trait and can be registered
/// directly with `LogBuffer::subscribe`.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self) -> ObserverResult;
}

impl<F> ChangeObserver for F
where
    F: Fn() -> ObserverResult + Send + Sync,
{
    fn on_change(&self) -> ObserverResult {
        self()
    }
}

/// Handle returned by `LogBuffer::subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogBufferError {
    #[error("log buffer capacity must be at least 1")]
    ZeroCapacity,
}

/// A capped buffer of log entries with strict FIFO eviction.
pub struct LogBuffer {
    /// The retained entries, oldest first.
    entries: Mutex<VecDeque<LogEntry>>,
    /// The maximum number of entries to retain.
    capacity: NonZeroUsize,
    /// The registered observers, in subscription order.
    observers: Mutex<Vec<(SubscriptionId, Arc<dyn ChangeObserver>)>>,
    next_subscription: AtomicU64,
}

impl LogBuffer {
    /// Creates an empty `LogBuffer`.
    ///
    /// # Errors
    ///
    /// Returns `LogBufferError::ZeroCapacity` if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self, LogBufferError> {
        NonZeroUsize::new(capacity)
            .map(Self::with_capacity)
            .ok_or(LogBufferError::ZeroCapacity)
    }

    /// Creates an empty `LogBuffer` from a capacity that is known to be valid.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.get())),
            capacity,
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.lock_observers().len()
    }

    /// Appends an entry, evicting the oldest entries beyond capacity, then
    /// notifies observers.
    pub fn add(&self, entry: LogEntry) {
        {
            let mut entries = self.lock_entries();
            entries.push_back(entry);
            self.trim(&mut entries);
        }
        self.notify();
    }

    /// Appends several entries as one step.
    ///
    /// Observers are notified once if at least one entry was added and not at
    /// all for an empty input.
    pub fn extend<I>(&self, batch: I)
    where
        I: IntoIterator<Item = LogEntry>,
    {
        // Drain the caller's iterator before locking: it may log or read the buffer.
        let batch: Vec<LogEntry> = batch.into_iter().collect();
        if batch.is_empty() {
            return;
        }
        {
            let mut entries = self.lock_entries();
            entries.extend(batch);
            self.trim(&mut entries);
        }
        self.notify();
    }

    /// Returns a copy of the current contents, oldest first.
    pub fn get_all(&self) -> Vec<LogEntry> {
        self.lock_entries().iter().cloned().collect()
    }

    /// Removes every entry, then notifies observers.
    pub fn clear(&self) {
        self.lock_entries().clear();
        self.notify();
    }

    /// Registers a closure to run after every change.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn() -> ObserverResult + Send + Sync + 'static,
    {
        self.subscribe_observer(Arc::new(observer))
    }

    /// Registers a shared observer for change notifications.
    pub fn subscribe_observer(&self, observer: Arc<dyn ChangeObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_observers().push((id, observer));
        id
    }

    /// Removes a previously registered observer.
    ///
    /// Returns `false` if the subscription was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.lock_observers();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    fn trim(&self, entries: &mut VecDeque<LogEntry>) {
        while entries.len() > self.capacity.get() {
            entries.pop_front();
        }
    }

    /// Delivers one notification to every observer registered right now.
    ///
    /// Must be called with no lock held: observers may call back into the
    /// buffer.
    fn notify(&self) {
        let observers: Vec<_> = self
            .lock_observers()
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect();

        for (id, observer) in observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer.on_change())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        subscription = id.0,
                        "Log buffer observer failed: {}",
                        e
                    );
                }
                Err(payload) => {
                    error!(
                        target: DIAGNOSTICS_TARGET,
                        subscription = id.0,
                        "Log buffer observer panicked: {}",
                        panic_message(&*payload)
                    );
                }
            }
        }
    }

    // Entries are only touched by push/pop/clear/clone, none of which leave the
    // deque half-updated, so a poisoned lock still guards a consistent value.
    fn lock_entries(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Arc<dyn ChangeObserver>)>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
