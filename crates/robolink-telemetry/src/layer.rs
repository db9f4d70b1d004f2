use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::entry::sanitize;
use crate::log::{TelemetryLog, FORWARD_TARGET};

/// Copies every `tracing` event into the log ring of a [`TelemetryLog`].
///
/// Compose it next to the usual `fmt` layer; the fmt output is unaffected.
///
/// ```no_run
/// use std::sync::Arc;
/// use robolink_telemetry::{TelemetryLayer, TelemetryLog};
/// use tracing_subscriber::prelude::*;
///
/// let telemetry = Arc::new(TelemetryLog::default());
/// tracing_subscriber::registry()
///     .with(tracing_subscriber::fmt::layer())
///     .with(TelemetryLayer::new(Arc::clone(&telemetry)))
///     .init();
/// ```
#[derive(Clone)]
pub struct TelemetryLayer {
    log: Arc<TelemetryLog>,
}

impl TelemetryLayer {
    pub fn new(log: Arc<TelemetryLog>) -> Self {
        Self { log }
    }
}

impl<S: Subscriber> Layer<S> for TelemetryLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == FORWARD_TARGET {
            return;
        }

        let mut line = LineVisitor::default();
        event.record(&mut line);
        let text = format!("{} {}: {}", meta.level(), meta.target(), line.finish());
        self.log.store_log(sanitize(text.as_bytes()));
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
