//! # Structured Logging Module
//!
//! Routes `tracing` events from the native side to the host through the
//! callback proxy. Each event becomes one JSON record delivered to a
//! host-chosen log callback handle:
//!
//! ```json
//! {"t":"2024-01-01T00:00:00+00:00","lvl":"info","msg":"dispatcher ready","target":"invoke_bridge::dispatcher","operations":12}
//! ```
//!
//! The filter level can be changed at any time with [`setup_logging`].

use crate::callback::{self, Callback, CallbackSlot};
use crate::error::{BridgeError, BridgeResult};
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cell::Cell;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

struct LogState {
    filter: reload::Handle<EnvFilter, Registry>,
    layer: CallbackLayer,
}

static LOG_STATE: OnceLock<LogState> = OnceLock::new();

/// `tracing` layer forwarding events to the host through a callback slot
#[derive(Clone)]
pub struct CallbackLayer {
    slot: &'static CallbackSlot,
    target: Arc<RwLock<Option<Callback>>>,
}

impl CallbackLayer {
    pub fn new(slot: &'static CallbackSlot) -> Self {
        Self {
            slot,
            target: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the callback receiving log records, shared by all clones of this layer
    pub fn set_target(&self, callback: Option<Callback>) {
        *self.target.write() = callback;
    }

    pub fn target(&self) -> Option<Callback> {
        *self.target.read()
    }

    fn deliver(&self, callback: Callback, record: &Map<String, Value>) {
        // events raised by the host while handling a record are dropped
        if DELIVERING.with(|flag| flag.replace(true)) {
            return;
        }
        let _ = callback.notify_via(self.slot, record);
        DELIVERING.with(|flag| flag.set(false));
    }
}

impl<S: Subscriber> Layer<S> for CallbackLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(callback) = self.target() else {
            return;
        };
        let metadata = event.metadata();
        let mut record = Map::new();
        record.insert("t".into(), Value::String(Utc::now().to_rfc3339()));
        record.insert(
            "lvl".into(),
            Value::String(metadata.level().as_str().to_ascii_lowercase()),
        );
        record.insert("msg".into(), Value::String(String::new()));
        record.insert("target".into(), Value::String(metadata.target().to_string()));
        if let Some(file) = metadata.file() {
            record.insert("file".into(), Value::String(file.to_string()));
        }
        if let Some(line) = metadata.line() {
            record.insert("line".into(), Value::from(line));
        }
        event.record(&mut RecordVisitor(&mut record));
        self.deliver(callback, &record);
    }
}

struct RecordVisitor<'a>(&'a mut Map<String, Value>);

impl RecordVisitor<'_> {
    fn insert(&mut self, field: &Field, value: Value) {
        let key = match field.name() {
            "message" => "msg",
            name => name,
        };
        self.0.insert(key.to_string(), value);
    }
}

impl Visit for RecordVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}

/// Parse a level name such as `info`, `WARN` or `off`
pub fn parse_level(level: &str) -> BridgeResult<LevelFilter> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| BridgeError::configuration(format!("invalid log level: {level}")))
}

fn filter_for(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

fn state(level: LevelFilter) -> &'static LogState {
    LOG_STATE.get_or_init(|| {
        let (filter, handle) = reload::Layer::new(filter_for(level));
        let layer = CallbackLayer::new(callback::global());
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(layer.clone());

        // Use try_init to avoid panic if global subscriber already set
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        LogState {
            filter: handle,
            layer,
        }
    })
}

/// Install the callback-backed subscriber at `level`.
///
/// Only the first call installs anything; later calls are no-ops.
pub fn init_logging(level: &str) -> BridgeResult<()> {
    state(parse_level(level)?);
    Ok(())
}

/// Deliver log records at or above `level` to the host callback `handle`.
///
/// An unparsable level is logged and leaves the current configuration intact.
pub fn setup_logging(handle: i32, level: &str) -> BridgeResult<()> {
    let level = match parse_level(level) {
        Ok(level) => level,
        Err(err) => {
            tracing::error!(error = %err, "unable to parse log level");
            return Err(err);
        }
    };
    let state = state(level);
    if let Err(err) = state.filter.reload(filter_for(level)) {
        tracing::debug!(error = %err, "log filter not reloaded");
    }
    state.layer.set_target(Some(Callback::new(handle)));
    tracing::debug!(handle, level = %level, "log callback configured");
    Ok(())
}
