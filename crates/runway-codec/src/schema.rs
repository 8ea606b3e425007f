use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::CodecError;

/// Built-in schemas for the platform's event payloads.
const PLATFORM_EVENTS_TOML: &str = include_str!("../schemas/aws_events.toml");

/// How a field's wire value is mapped before structural decoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// Passed through as-is once its wire name is reconciled.
    Plain,
    /// Raw byte buffers have no stable JSON shape and are always dropped.
    Binary,
    /// A nested object of another schema type.
    Object(String),
    /// A list of objects of another schema type.
    List(String),
    /// A string-keyed map whose values are of another schema type.
    Map(String),
    /// A value handled by the named scalar codec.
    Scalar(String),
}

impl FieldShape {
    fn nested_type(&self) -> Option<&str> {
        match self {
            FieldShape::Object(t) | FieldShape::List(t) | FieldShape::Map(t) => Some(t),
            _ => None,
        }
    }
}

/// Field layout of one schema type, keyed by internal field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TypeSchema {
    fields: BTreeMap<String, FieldShape>,
}

impl TypeSchema {
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldShape)> {
        self.fields.iter().map(|(name, shape)| (name.as_str(), shape))
    }

    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExcludedField {
    #[serde(rename = "type")]
    pub type_name: String,
    pub field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Exclusions {
    #[serde(default)]
    pub fields: Vec<ExcludedField>,
}

/// A set of schema types plus the fields the codec never maps.
///
/// Schemas are data: new event shapes are added by loading more TOML, not by
/// writing new code paths.
///
/// ```toml
/// [exclude]
/// fields = [{ type = "StreamRecord", field = "approximateCreationDateTime" }]
///
/// [types.SqsEvent]
/// records = { list = "SqsMessage" }
///
/// [types.SqsMessage]
/// eventSourceArn = "plain"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SchemaSet {
    #[serde(default)]
    pub exclude: Exclusions,
    #[serde(default)]
    pub types: BTreeMap<String, TypeSchema>,
}

impl SchemaSet {
    /// Parse and validate a schema set from TOML.
    pub fn from_toml(source: &str) -> Result<Self, CodecError> {
        let set: SchemaSet = toml::from_str(source)
            .map_err(|e| CodecError::Schema(format!("failed to parse schema set: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    /// Schemas for the DynamoDB stream, S3 notification and SQS events.
    pub fn platform_events() -> Self {
        Self::from_toml(PLATFORM_EVENTS_TOML)
            .expect("embedded platform event schemas should be valid")
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn is_excluded(&self, type_name: &str, field: &str) -> bool {
        self.exclude
            .fields
            .iter()
            .any(|e| e.type_name == type_name && e.field == field)
    }

    /// Add the types and exclusions of `other`. Types already present are
    /// replaced by the incoming definition.
    ///
    /// A merge that fails validation leaves `self` unchanged.
    pub fn merge(&mut self, other: SchemaSet) -> Result<(), CodecError> {
        let mut merged = self.clone();
        merged.types.extend(other.types);
        for excluded in other.exclude.fields {
            if !merged.exclude.fields.contains(&excluded) {
                merged.exclude.fields.push(excluded);
            }
        }
        merged.validate()?;
        *self = merged;
        Ok(())
    }

    /// Every nested reference must name a type in this set.
    pub fn validate(&self) -> Result<(), CodecError> {
        for (type_name, schema) in &self.types {
            for (field, shape) in schema.fields() {
                if let Some(nested) = shape.nested_type()
                    && !self.types.contains_key(nested)
                {
                    return Err(CodecError::Schema(format!(
                        "{type_name}.{field} references unknown type `{nested}`"
                    )));
                }
            }
        }
        for excluded in &self.exclude.fields {
            if !self.types.contains_key(&excluded.type_name) {
                return Err(CodecError::Schema(format!(
                    "exclusion names unknown type `{}`",
                    excluded.type_name
                )));
            }
        }
        Ok(())
    }
}
