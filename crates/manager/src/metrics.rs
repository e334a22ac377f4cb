//! Metrics emission.

use std::sync::Mutex;
use std::time::SystemTime;

use tracing::info;

/// Receives structured counter/event records from the engine.
///
/// Implementations must be thread-safe; workers record from many threads.
pub trait MetricsSink: Send + Sync {
    /// Records one event. Both fields are free-form strings.
    fn record(&self, name: &str, value: &str);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _name: &str, _value: &str) {}
}

/// Forwards events to the `tracing` log stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, name: &str, value: &str) {
        info!(target: "fsmirror::metrics", metric = name, value, "metric");
    }
}

/// One recorded event.
#[derive(Clone, Debug)]
pub struct MetricEvent {
    /// Event name, e.g. `tx_completed`.
    pub name: String,
    /// Free-form value.
    pub value: String,
    /// When the event was recorded.
    pub timestamp: SystemTime,
}

/// Keeps every event in memory. Used by tests and the check binary to
/// inspect what the engine emitted.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<MetricEvent>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event, in order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MetricEvent> {
        self.events.lock().expect("metrics mutex poisoned").clone()
    }

    /// Removes and returns every recorded event.
    #[must_use]
    pub fn drain(&self) -> Vec<MetricEvent> {
        std::mem::take(&mut *self.events.lock().expect("metrics mutex poisoned"))
    }

    /// Number of events recorded under `name`.
    #[must_use]
    pub fn count_of(&self, name: &str) -> usize {
        self.events
            .lock()
            .expect("metrics mutex poisoned")
            .iter()
            .filter(|event| event.name == name)
            .count()
    }

    /// Values recorded under `name`, in order.
    #[must_use]
    pub fn values_of(&self, name: &str) -> Vec<String> {
        self.events
            .lock()
            .expect("metrics mutex poisoned")
            .iter()
            .filter(|event| event.name == name)
            .map(|event| event.value.clone())
            .collect()
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, name: &str, value: &str) {
        self.events
            .lock()
            .expect("metrics mutex poisoned")
            .push(MetricEvent {
                name: name.to_string(),
                value: value.to_string(),
                timestamp: SystemTime::now(),
            });
    }
}
