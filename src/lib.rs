//! In-memory log relay.
//!
//! Application log events are captured into a bounded, thread-safe buffer
//! that readers can snapshot, clear, and watch for changes. The `web` module
//! serves the buffer over HTTP for remote log viewers.
pub mod app;
pub mod config;
pub mod logging;
pub mod web;
