use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::CodecError;
use crate::events::{
    AttributeValue, DynamodbEvent, DynamodbStreamRecord, S3EventNotification,
    S3EventNotificationRecord, S3ResponseElements, SqsEvent, SqsMessage, SqsMessageAttribute,
    StreamRecord,
};
use crate::naming::wire_candidates;
use crate::scalar::{DateTimeCodec, ScalarCodec};
use crate::schema::{FieldShape, SchemaSet};

/// Converts between wire JSON text and native handler types.
///
/// Types bound to a schema (see [`PayloadCodec::bind`]) have their JSON tree
/// reconciled first: wire names are matched against each field's candidate
/// list, excluded fields are dropped and scalar codecs are applied. Unbound
/// types map structurally through serde.
pub struct PayloadCodec {
    schemas: SchemaSet,
    bindings: HashMap<TypeId, String>,
    scalars: HashMap<String, Arc<dyn ScalarCodec>>,
}

impl std::fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec")
            .field("schemas", &self.schemas.types.keys().collect::<Vec<_>>())
            .field("bindings", &self.bindings.len())
            .field("scalars", &self.scalars.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCodec {
    /// A codec with no schemas and the `datetime` scalar codec registered.
    pub fn new() -> Self {
        let mut scalars: HashMap<String, Arc<dyn ScalarCodec>> = HashMap::new();
        scalars.insert("datetime".into(), Arc::new(DateTimeCodec::new()));
        Self {
            schemas: SchemaSet::default(),
            bindings: HashMap::new(),
            scalars,
        }
    }

    /// A codec with the built-in platform event schemas loaded and the event
    /// types in [`crate::events`] bound to them.
    pub fn with_platform_events() -> Self {
        let mut codec = Self::new();
        codec.schemas = SchemaSet::platform_events();

        let bindings: [(TypeId, &str); 10] = [
            (TypeId::of::<DynamodbEvent>(), "DynamodbEvent"),
            (TypeId::of::<DynamodbStreamRecord>(), "DynamodbStreamRecord"),
            (TypeId::of::<StreamRecord>(), "StreamRecord"),
            (TypeId::of::<AttributeValue>(), "AttributeValue"),
            (TypeId::of::<S3EventNotification>(), "S3EventNotification"),
            (
                TypeId::of::<S3EventNotificationRecord>(),
                "S3EventNotificationRecord",
            ),
            (TypeId::of::<S3ResponseElements>(), "S3ResponseElements"),
            (TypeId::of::<SqsEvent>(), "SqsEvent"),
            (TypeId::of::<SqsMessage>(), "SqsMessage"),
            (TypeId::of::<SqsMessageAttribute>(), "SqsMessageAttribute"),
        ];
        for (id, name) in bindings {
            codec.bindings.insert(id, name.to_string());
        }
        codec
    }

    /// Add schema types. Existing bindings stay in place.
    pub fn add_schemas(&mut self, schemas: SchemaSet) -> Result<(), CodecError> {
        self.schemas.merge(schemas)
    }

    /// Bind a native type to a schema type so decoding and encoding it goes
    /// through reconciliation.
    pub fn bind<T: 'static>(&mut self, schema_type: &str) -> Result<(), CodecError> {
        if !self.schemas.contains(schema_type) {
            return Err(CodecError::Schema(format!(
                "cannot bind {} to unknown schema type `{schema_type}`",
                type_name::<T>()
            )));
        }
        self.bindings
            .insert(TypeId::of::<T>(), schema_type.to_string());
        Ok(())
    }

    /// Register (or replace) a scalar codec under `name`.
    pub fn register_scalar(&mut self, name: impl Into<String>, codec: impl ScalarCodec + 'static) {
        self.scalars.insert(name.into(), Arc::new(codec));
    }

    /// The schema type `T` is bound to, if any.
    pub fn schema_of<T: 'static>(&self) -> Option<&str> {
        self.bindings.get(&TypeId::of::<T>()).map(String::as_str)
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    /// Decode a wire payload into `T`.
    ///
    /// A payload that is not valid JSON is offered to `T` as a JSON string,
    /// so plain-text bodies reach `String` inputs unchanged. An empty payload
    /// is offered as `null` first.
    pub fn decode<T: DeserializeOwned + 'static>(&self, payload: &str) -> Result<T, CodecError> {
        if payload.trim().is_empty() {
            return serde_json::from_value(Value::Null)
                .or_else(|_| serde_json::from_value(Value::String(payload.to_owned())))
                .map_err(|e| CodecError::Deserialization(format!("empty payload: {e}")));
        }

        let json: Value = match serde_json::from_str(payload) {
            Ok(json) => json,
            Err(parse_err) => {
                return serde_json::from_value(Value::String(payload.to_owned()))
                    .map_err(|_| CodecError::Deserialization(parse_err.to_string()));
            }
        };

        let json = match self.schema_of::<T>() {
            Some(schema_type) => self.reconcile(json, schema_type)?,
            None => json,
        };

        let scalar_text = matches!(json, Value::Number(_) | Value::Bool(_));
        match serde_json::from_value(json) {
            Ok(value) => Ok(value),
            // Bare numbers and booleans coerce into string inputs.
            Err(_) if scalar_text => {
                serde_json::from_value(Value::String(payload.trim().to_owned()))
                    .map_err(|e| CodecError::Deserialization(e.to_string()))
            }
            Err(e) => Err(CodecError::Deserialization(e.to_string())),
        }
    }

    /// Encode a handler result for the wire.
    ///
    /// Strings are returned verbatim, `null`/unit becomes an empty body and
    /// everything else is compact JSON.
    pub fn encode<T: Serialize + 'static>(&self, value: &T) -> Result<String, CodecError> {
        let json =
            serde_json::to_value(value).map_err(|e| CodecError::Serialization(e.to_string()))?;

        let json = match self.schema_of::<T>() {
            Some(schema_type) => self.restore(json, schema_type)?,
            None => json,
        };

        match json {
            Value::Null => Ok(String::new()),
            Value::String(text) => Ok(text),
            other => serde_json::to_string(&other)
                .map_err(|e| CodecError::Serialization(e.to_string())),
        }
    }

    /// Rewrite a wire JSON tree so its keys are the internal field names of
    /// `schema_type`.
    pub fn reconcile(&self, value: Value, schema_type: &str) -> Result<Value, CodecError> {
        let schema = self
            .schemas
            .get(schema_type)
            .ok_or_else(|| CodecError::Schema(format!("unknown schema type `{schema_type}`")))?;

        let Value::Object(mut wire) = value else {
            return Ok(value);
        };

        let mut native = Map::with_capacity(wire.len());
        for (field, shape) in schema.fields() {
            let candidates = wire_candidates(field);

            if *shape == FieldShape::Binary || self.schemas.is_excluded(schema_type, field) {
                for candidate in &candidates {
                    wire.remove(candidate);
                }
                continue;
            }

            let Some((matched, raw)) = candidates
                .iter()
                .find_map(|candidate| wire.remove(candidate).map(|raw| (candidate, raw)))
            else {
                continue;
            };

            if matched != field {
                tracing::trace!(schema_type, field, wire_name = %matched, "Reconciled field name");
            }
            native.insert(field.to_string(), self.decode_shape(raw, shape)?);
        }

        for (key, raw) in wire {
            native.entry(key).or_insert(raw);
        }

        Ok(Value::Object(native))
    }

    /// Inverse of [`reconcile`](Self::reconcile) for encoding: drops excluded
    /// fields and applies scalar encoders. Keys stay internal names.
    fn restore(&self, value: Value, schema_type: &str) -> Result<Value, CodecError> {
        let Some(schema) = self.schemas.get(schema_type) else {
            return Ok(value);
        };
        let Value::Object(mut native) = value else {
            return Ok(value);
        };

        for (field, shape) in schema.fields() {
            if *shape == FieldShape::Binary || self.schemas.is_excluded(schema_type, field) {
                native.remove(field);
                continue;
            }
            if let Some(raw) = native.remove(field) {
                native.insert(field.to_string(), self.encode_shape(raw, shape)?);
            }
        }

        Ok(Value::Object(native))
    }

    fn decode_shape(&self, raw: Value, shape: &FieldShape) -> Result<Value, CodecError> {
        match shape {
            FieldShape::Plain | FieldShape::Binary => Ok(raw),
            FieldShape::Object(nested) => self.reconcile(raw, nested),
            FieldShape::List(nested) => map_items(raw, |item| self.reconcile(item, nested)),
            FieldShape::Map(nested) => map_entries(raw, |item| self.reconcile(item, nested)),
            FieldShape::Scalar(name) => self.scalar(name)?.decode(&raw),
        }
    }

    fn encode_shape(&self, raw: Value, shape: &FieldShape) -> Result<Value, CodecError> {
        match shape {
            FieldShape::Plain | FieldShape::Binary => Ok(raw),
            FieldShape::Object(nested) => self.restore(raw, nested),
            FieldShape::List(nested) => map_items(raw, |item| self.restore(item, nested)),
            FieldShape::Map(nested) => map_entries(raw, |item| self.restore(item, nested)),
            FieldShape::Scalar(name) => self.scalar(name)?.encode(&raw),
        }
    }

    fn scalar(&self, name: &str) -> Result<&Arc<dyn ScalarCodec>, CodecError> {
        self.scalars
            .get(name)
            .ok_or_else(|| CodecError::Schema(format!("no scalar codec registered for `{name}`")))
    }
}

fn map_items(
    raw: Value,
    mut f: impl FnMut(Value) -> Result<Value, CodecError>,
) -> Result<Value, CodecError> {
    match raw {
        Value::Array(items) => items
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn map_entries(
    raw: Value,
    mut f: impl FnMut(Value) -> Result<Value, CodecError>,
) -> Result<Value, CodecError> {
    match raw {
        Value::Object(entries) => entries
            .into_iter()
            .map(|(key, item)| f(item).map(|item| (key, item)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        other => Ok(other),
    }
}
