use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

const OMITTED: &str = "<omitted>";

/// Leading fields of every line. Payload keys are merged after these and
/// win on collision.
#[derive(Debug, Serialize)]
struct EventHeader<'a> {
    #[serde(rename = "type")]
    event_type: &'a str,
    session_id: &'a str,
    seq: u64,
    ts: String,
}

/// Append-only `events.jsonl` for one session.
///
/// Lines carry a per-session `seq` starting at 1 that only advances when the
/// line reached the file. Image bytes are never written.
#[derive(Debug, Clone)]
pub struct EventWriter {
    log: Arc<SessionLog>,
}

#[derive(Debug)]
struct SessionLog {
    path: PathBuf,
    session_id: String,
    written: Mutex<u64>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            log: Arc::new(SessionLog {
                path: path.into(),
                session_id: session_id.into(),
                written: Mutex::new(0),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log.path
    }

    pub fn session_id(&self) -> &str {
        &self.log.session_id
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut written = self
            .log
            .written
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        let header = EventHeader {
            event_type,
            session_id: &self.log.session_id,
            seq: *written + 1,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        };
        let mut event = match serde_json::to_value(&header)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        event.extend(
            payload
                .into_iter()
                .map(|(key, value)| (key, strip_image_data(value))),
        );

        let line = serde_json::to_string(&event)?;
        self.log.append(&line)?;
        *written += 1;
        Ok(Value::Object(event))
    }
}

impl SessionLog {
    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

fn is_image_data_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "b64_json" | "image" | "image_bytes" | "data" | "inlinedata" | "inline_data"
    )
}

fn strip_image_data(value: Value) -> Value {
    match value {
        Value::Array(rows) => Value::Array(rows.into_iter().map(strip_image_data).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, row)| {
                    if is_image_data_key(&key) {
                        (key, Value::String(OMITTED.to_string()))
                    } else {
                        (key, strip_image_data(row))
                    }
                })
                .collect(),
        ),
        scalar => scalar,
    }
}
