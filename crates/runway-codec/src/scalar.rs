use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::CodecError;

/// Wire format used by the platform for event timestamps
/// (`yyyy-MM-dd'T'HH:mm:ss.SSSZ`).
pub const DATETIME_WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Converts one scalar kind between its wire form and the form the native
/// type deserializes from.
///
/// Scalar codecs are registered on the [`PayloadCodec`](crate::PayloadCodec)
/// by name and consulted before structural mapping for schema fields declared
/// as `{ scalar = "<name>" }`.
pub trait ScalarCodec: Send + Sync {
    /// Wire value to native-compatible value.
    fn decode(&self, wire: &Value) -> Result<Value, CodecError>;

    /// Native value (as serialized by serde) back to its wire form.
    fn encode(&self, native: &Value) -> Result<Value, CodecError>;
}

/// Timestamps: `2020-01-01T10:00:00.000+0000` on the wire, RFC 3339 natively
/// (the format `chrono::DateTime<Utc>` deserializes from).
#[derive(Debug, Clone)]
pub struct DateTimeCodec {
    format: String,
}

impl DateTimeCodec {
    pub fn new() -> Self {
        Self::with_format(DATETIME_WIRE_FORMAT)
    }

    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    fn parse(&self, text: &str) -> Result<DateTime<Utc>, CodecError> {
        DateTime::parse_from_str(text, &self.format)
            .or_else(|_| DateTime::parse_from_rfc3339(text))
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| self.error(format!("cannot parse `{text}`: {e}")))
    }

    fn error(&self, reason: String) -> CodecError {
        CodecError::Scalar {
            codec: "datetime".into(),
            reason,
        }
    }
}

impl Default for DateTimeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarCodec for DateTimeCodec {
    fn decode(&self, wire: &Value) -> Result<Value, CodecError> {
        match wire {
            Value::Null => Ok(Value::Null),
            Value::String(text) => {
                let parsed = self.parse(text)?;
                Ok(Value::String(
                    parsed.to_rfc3339_opts(SecondsFormat::Millis, true),
                ))
            }
            other => Err(self.error(format!("expected a string, got {other}"))),
        }
    }

    fn encode(&self, native: &Value) -> Result<Value, CodecError> {
        match native {
            Value::Null => Ok(Value::Null),
            Value::String(text) => {
                let parsed = self.parse(text)?;
                Ok(Value::String(parsed.format(&self.format).to_string()))
            }
            other => Err(self.error(format!("expected a string, got {other}"))),
        }
    }
}
