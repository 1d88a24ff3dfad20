//! Log forwarding to the host shell
//!
//! Bridge code logs through `tracing`. [`LogBridgeLayer`] picks up events at
//! or above a level and hands them to a [`LogSink`] as the same payload the
//! webview log panel already understands.

use std::fmt::Write as _;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LoggerPayload {
    pub message: String,
    pub message_type: String,
}

/// Receives forwarded log events
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, payload: LoggerPayload);
}

/// Emits `log-event` to the webview
#[cfg(feature = "tauri")]
#[derive(Clone)]
pub struct Logger<R: tauri::Runtime> {
    pub app: tauri::AppHandle<R>,
}

#[cfg(feature = "tauri")]
impl<R: tauri::Runtime> LogSink for Logger<R> {
    fn log(&self, payload: LoggerPayload) {
        use tauri::Emitter;
        let _ = self.app.emit_to("main", "log-event", payload);
    }
}

/// `tracing` layer forwarding events to a [`LogSink`]
pub struct LogBridgeLayer<S> {
    sink: S,
    max_level: Level,
}

impl<S: LogSink> LogBridgeLayer<S> {
    /// Forward events at `max_level` or more severe
    pub fn new(sink: S, max_level: Level) -> Self {
        LogBridgeLayer { sink, max_level }
    }
}

impl<S, Sub> Layer<Sub> for LogBridgeLayer<S>
where
    S: LogSink,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let level = *event.metadata().level();
        if level > self.max_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.sink.log(LoggerPayload {
            message: visitor.finish(),
            message_type: message_type(level).to_string(),
        });
    }
}

fn message_type(level: Level) -> &'static str {
    match level {
        Level::ERROR => "error",
        Level::WARN => "warning",
        Level::INFO => "info",
        _ => "debug",
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Install the global subscriber: fmt output filtered by `RUST_LOG` (falling
/// back to `default_level`), plus an optional forwarding sink.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing<S: LogSink>(default_level: &str, sink: Option<S>) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sink.map(|sink| LogBridgeLayer::new(sink, Level::WARN)))
        .try_init()
        .is_ok()
}
