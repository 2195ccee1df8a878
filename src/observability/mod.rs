//! Observability for the optimizer
//!
//! - Structured logging (JSON lines)
//! - Monotonic counters
//! - Lifecycle events and scopes
//!
//! Observability is read-only: nothing here influences the plan chosen.
//!
//! # Usage
//!
//! ```ignore
//! use docplan::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::IndexSkipped, &[("index", "a_1"), ("reason", "hidden")]);
//!
//! let scope = ObservationScope::new("METADATA");
//! // ... build metadata ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

fn severity_for(event: Event) -> Severity {
    match event {
        Event::OptimizerFallback | Event::PlanNotFound | Event::IndexSkipped => Severity::Warn,
        e if e.is_trace() => Severity::Trace,
        _ => Severity::Info,
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}
