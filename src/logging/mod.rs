//! This module contains the in-memory log capture for the application.
//!
//! It includes the entry types, a bounded buffer that notifies observers on
//! every change, and a `tracing` layer that feeds the buffer.
pub mod buffer;
pub mod collector;
pub mod entry;

pub use buffer::{
    ChangeObserver, LogBuffer, LogBufferError, ObserverError, ObserverResult, SubscriptionId,
};
pub use collector::LogCollector;
pub use entry::{LogEntry, LogLevel, ParseLogLevelError};
