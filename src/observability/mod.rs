//! Observability
//!
//! Structured JSON logging of query-layer events. Logging is read-only:
//! nothing it does changes a result, and failures to write are ignored.
//!
//! ```ignore
//! use results_query::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PageListed, &[("items", "50")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
