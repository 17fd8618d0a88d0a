use crate::record::LogRecord;
use chrono::SecondsFormat;
use serde_json::{Map, Value};

/// Error produced when a [`LogRecord`] cannot be rendered.
#[derive(thiserror::Error, Debug)]
#[error("unable to serialize log record: {0}")]
pub struct SerializationError(#[from] pub serde_json::Error);

/// Renders a [`LogRecord`] into the bytes that follow the token on the wire.
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, SerializationError>;
}

const TIME_KEY: &str = "time";
const LEVEL_KEY: &str = "level";
const MESSAGE_KEY: &str = "msg";
const TARGET_KEY: &str = "target";

/// Newline-terminated JSON object per record.
///
/// Caller fields sit at the top level next to `time`, `level` and `msg`.
/// A field that would clobber one of those keys is kept under
/// `fields.<key>` instead.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub disable_timestamp: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    fn to_object(&self, record: &LogRecord) -> Map<String, Value> {
        let mut object = Map::new();
        for (key, value) in &record.fields {
            let key = match key.as_str() {
                TIME_KEY | LEVEL_KEY | MESSAGE_KEY => format!("fields.{key}"),
                _ => key.clone(),
            };
            object.insert(key, value.clone());
        }

        if let Some(target) = &record.target {
            object
                .entry(TARGET_KEY)
                .or_insert_with(|| Value::String(target.clone()));
        }
        if !self.disable_timestamp {
            let time = record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
            object.insert(TIME_KEY.to_string(), Value::String(time));
        }
        object.insert(LEVEL_KEY.to_string(), Value::String(record.level.to_string()));
        object.insert(MESSAGE_KEY.to_string(), Value::String(record.message.clone()));
        object
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, SerializationError> {
        let mut line = serde_json::to_vec(&self.to_object(record))?;
        line.push(b'\n');
        Ok(line)
    }
}
