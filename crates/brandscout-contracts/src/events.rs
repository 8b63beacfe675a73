use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::runs::{now_utc_iso, RunState, Stage};

pub type EventPayload = Map<String, Value>;

pub const RUN_STARTED: &str = "run_started";
pub const STATE_CHANGED: &str = "state_changed";
pub const STYLE_DESCRIBED: &str = "style_described";
pub const BACKGROUND_SYNTHESIZED: &str = "background_synthesized";
pub const RUN_WARNING: &str = "run_warning";
pub const RUN_FINISHED: &str = "run_finished";
pub const RUN_FAILED: &str = "run_failed";

/// Append-only writer for a run's `events.jsonl`.
///
/// Every line is one compact JSON object carrying `type`, `run_id` and `ts`;
/// the caller payload is merged last and may override those defaults.
/// Clones share the file and its lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    run_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                run_id: run_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }

    pub fn emit_state_change(&self, from: RunState, to: RunState) -> anyhow::Result<Value> {
        self.emit(
            STATE_CHANGED,
            payload(json!({
                "from": from,
                "to": to,
            })),
        )
    }

    pub fn emit_failure(&self, stage: Option<Stage>, error: &str) -> anyhow::Result<Value> {
        self.emit(
            RUN_FAILED,
            payload(json!({
                "stage": stage,
                "error": error,
            })),
        )
    }
}

/// Converts a `json!` object literal into an [`EventPayload`]; anything else is empty.
pub fn payload(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}
