//! This module provides a `tracing` layer that captures every event into a
//! `LogBuffer`.
use super::buffer::DIAGNOSTICS_TARGET;
use super::{LogBuffer, LogEntry, LogLevel};
use chrono::Local;
use std::error::Error;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

/// A `tracing` layer that converts events into `LogEntry` values and adds
/// them to a shared `LogBuffer`.
pub struct LogCollector {
    buffer: Arc<LogBuffer>,
}

impl LogCollector {
    /// Creates a new `LogCollector`.
    ///
    /// # Arguments
    ///
    /// * `buffer` - The `LogBuffer` that receives one entry per event.
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for LogCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    /// Handles a `tracing` event.
    ///
    /// The event target becomes the entry source. The `message` field and any
    /// other fields are rendered into the message; errors recorded as errors,
    /// or under an `exception` field, become the entry exception. A boolean
    /// `fatal = true` field raises the level to `Fatal`.
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        // The buffer reports observer failures through tracing; capturing them
        // would notify the failing observer again.
        if metadata.target() == DIAGNOSTICS_TARGET {
            return;
        }

        let mut visitor = EntryVisitor::default();
        event.record(&mut visitor);

        let level = if visitor.fatal {
            LogLevel::Fatal
        } else {
            LogLevel::from(*metadata.level())
        };

        let entry = LogEntry {
            timestamp: Local::now().fixed_offset(),
            level,
            source: Some(metadata.target().to_string()),
            message: visitor.rendered_message(),
            exception: visitor.exception,
        };

        self.buffer.add(entry);
    }
}

/// Collects the fields of one event.
#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: Vec<String>,
    exception: Option<String>,
    fatal: bool,
}

impl EntryVisitor {
    fn rendered_message(&self) -> String {
        let mut rendered = self.message.clone();
        for field in &self.fields {
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            rendered.push_str(field);
        }
        rendered
    }
}

impl Visit for EntryVisitor {
    /// Records a debug-formatted value.
    ///
    /// Numeric fields land here through the default `Visit` methods.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "exception" => self.exception = Some(format!("{:?}", value)),
            name => self.fields.push(format!("{}={:?}", name, value)),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "exception" => self.exception = Some(value.to_string()),
            name => self.fields.push(format!("{}={}", name, value)),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "fatal" {
            self.fatal = value;
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn Error + 'static)) {
        self.exception = Some(render_error(value));
    }
}

/// Renders an error followed by its chain of sources.
fn render_error(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\nCaused by: {}", cause);
        source = cause.source();
    }
    rendered
}
