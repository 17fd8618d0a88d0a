use crate::level::Severity;
use crate::record::LogRecord;
use crate::sink::LogSink;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events from this crate are never shipped, so the shipper cannot feed itself.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands each one to a [`LogSink`].
///
/// Every accepted event is dispatched on its own Tokio task: nothing is
/// queued, batched or retried, and records may reach the sink in any
/// order. Only severities listed by [`LogSink::levels`] are dispatched.
pub struct ShippingLayer {
    sink: Arc<dyn LogSink>,
    handle: Handle,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Events handed to the sink.
    pub dispatched_events: Arc<AtomicU64>,
    /// Events skipped because the sink does not accept their level.
    pub filtered_events: Arc<AtomicU64>,
}

impl ShippingLayer {
    /// Create a layer dispatching on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; use
    /// [`ShippingLayer::with_handle`] in that case.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self::with_handle(sink, Handle::current())
    }

    pub fn with_handle(sink: Arc<dyn LogSink>, handle: Handle) -> Self {
        Self {
            sink,
            handle,
            total_events: Arc::new(AtomicU64::new(0)),
            dispatched_events: Arc::new(AtomicU64::new(0)),
            filtered_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<S> Layer<S> for ShippingLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if meta.target().starts_with(OWN_TARGET) {
            return;
        }
        let level = Severity::from(*meta.level());
        if !self.sink.levels().contains(&level) {
            self.filtered_events.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;
        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            message: message.unwrap_or_default(),
            target: Some(meta.target().to_string()),
            module_path: meta.module_path().map(|s| s.to_string()),
            file: meta.file().map(|s| s.to_string()),
            line: meta.line(),
            fields,
        };

        self.dispatched_events.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::clone(&self.sink);
        self.handle.spawn(async move {
            if let Err(e) = sink.send(&record).await {
                eprintln!("error shipping log record: {}", e);
            }
        });
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
