//! Dynamic values for parameters and configuration.
//!
//! Parameter values arrive from three places (explicit arguments, the
//! configuration document and declared defaults) and are only converted to
//! their declared Rust type at resolution time. Holding them as a JSON tree
//! until then lets YAML scalars, maps and sequences flow through unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Dynamic, untyped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(pub JsonValue);

impl Value {
    /// Create a null value.
    pub fn null() -> Self {
        Self(JsonValue::Null)
    }

    /// Create a value from any serializable type.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, String> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| e.to_string())
    }

    /// Convert a YAML node into a value.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, String> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(|e| format!("unsupported configuration value: {}", e))
    }

    /// Deserialize into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.0.clone()).map_err(|e| e.to_string())
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Get a field by dotted path ("parent.child.value").
    ///
    /// Returns None if any segment is missing.
    pub fn get_field(&self, path: &str) -> Option<Value> {
        let mut current = &self.0;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(Value(current.clone()))
    }

    /// Convert to string if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Convert to f64 if the value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.as_f64()
    }

    /// Access the inner serde_json::Value.
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert into the inner serde_json::Value.
    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Self(v)
    }
}

impl From<Value> for JsonValue {
    fn from(v: Value) -> Self {
        v.0
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(JsonValue::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self(JsonValue::String(s))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self(JsonValue::Bool(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self(serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::from(f64::from(v))
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self(JsonValue::from(v))
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);
