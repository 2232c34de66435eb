//! Tenant attribute records

use serde_json::{Map, Value};

use super::error::{Result, TenantError};

/// Attributes describing the record itself rather than the tenant. They are
/// never turned into filters.
pub const EXCLUDED_FIELDS: &[&str] = &[
    "name",
    "owner",
    "creation",
    "modified",
    "modified_by",
    "docstatus",
    "idx",
    "doctype",
    "user",
];

/// Per-principal attribute document from the tenant-metadata service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenantRecord {
    attributes: Map<String, Value>,
}

impl TenantRecord {
    #[must_use]
    pub const fn new(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    /// Build from a bare attribute object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(attributes) => Ok(Self { attributes }),
            other => Err(TenantError::MalformedEnvelope(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Unwrap the service response envelope `{"data": {...}}`.
    ///
    /// A missing or non-object `data` is an error, never an empty record.
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        let Value::Object(mut outer) = envelope else {
            return Err(TenantError::MalformedEnvelope(
                "response is not a JSON object".into(),
            ));
        };
        match outer.remove("data") {
            Some(Value::Object(attributes)) => Ok(Self { attributes }),
            Some(other) => Err(TenantError::MalformedEnvelope(format!(
                "`data` is {}, expected an object",
                json_kind(&other)
            ))),
            None => Err(TenantError::MalformedEnvelope(
                "response has no `data` field".into(),
            )),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes that become equality filters: not excluded (built-in set
    /// or `extra_excluded`) and not null.
    pub fn scoping_attributes<'a>(
        &'a self,
        extra_excluded: &'a [String],
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.attributes
            .iter()
            .filter(move |(key, value)| {
                !value.is_null()
                    && !EXCLUDED_FIELDS.contains(&key.as_str())
                    && !extra_excluded.iter().any(|e| e == *key)
            })
            .map(|(key, value)| (key.as_str(), value))
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
