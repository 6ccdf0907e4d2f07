//! The explicit registry of converters, operator factories and extensions.
//!
//! A fragment owns one registry. Nothing is process-global, so tests can
//! build a fresh registry per case.

use crate::error::{Result, SluiceError};
use crate::operator::Operator;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Converts a raw value into the shape the declared type deserializes from.
pub type Converter = Arc<dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Creates a fresh operator instance.
pub type OperatorFactory = Arc<dyn Fn() -> Box<dyn Operator> + Send + Sync>;

/// A bundle of converters and factories registered as a unit.
pub trait Extension: Send + Sync {
    /// The name used in the configuration `extensions:` list.
    fn name(&self) -> &str;

    /// Register everything this extension provides.
    fn register(&self, registry: &mut Registry) -> Result<()>;
}

/// Converters, factories and extensions available to a fragment.
#[derive(Default, Clone)]
pub struct Registry {
    converters: HashMap<String, Converter>,
    factories: HashMap<String, OperatorFactory>,
    available: HashMap<String, Arc<dyn Extension>>,
    loaded: Vec<String>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in converters.
    ///
    /// Registers a [`Duration`] converter accepting `"250ms"`, `"2s"`,
    /// `"1m"` or a plain number of milliseconds.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_converter::<Duration>(Arc::new(convert_duration));
        registry
    }

    /// Register a converter for values bound to parameters of type `T`.
    pub fn register_converter<T: 'static>(&mut self, converter: Converter) -> &mut Self {
        self.converters
            .insert(std::any::type_name::<T>().to_string(), converter);
        self
    }

    /// Apply the converter registered for `type_name`, if any.
    pub fn convert(&self, type_name: &str, value: &Value) -> std::result::Result<Value, String> {
        match self.converters.get(type_name) {
            Some(converter) => converter(value),
            None => Ok(value.clone()),
        }
    }

    /// Register an operator factory under `type_name`.
    pub fn register_factory(&mut self, type_name: impl Into<String>, factory: OperatorFactory) -> &mut Self {
        self.factories.insert(type_name.into(), factory);
        self
    }

    /// Create an operator by type name.
    pub fn create(&self, type_name: &str) -> Result<Box<dyn Operator>> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| SluiceError::UnknownOperatorType {
                type_name: type_name.to_string(),
            })
    }

    /// Registered operator type names, sorted.
    pub fn operator_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Make an extension available for loading.
    pub fn add_extension(&mut self, extension: Arc<dyn Extension>) -> &mut Self {
        self.available
            .insert(extension.name().to_string(), extension);
        self
    }

    /// Load an available extension. Loading twice is a no-op.
    pub fn load(&mut self, name: &str) -> Result<()> {
        if self.is_loaded(name) {
            return Ok(());
        }
        let extension = self
            .available
            .get(name)
            .cloned()
            .ok_or_else(|| SluiceError::UnknownExtension {
                name: name.to_string(),
            })?;
        extension.register(self)?;
        self.loaded.push(name.to_string());
        tracing::info!(extension = %name, "Extension loaded");
        Ok(())
    }

    /// Whether the named extension has been loaded.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|n| n == name)
    }

    /// Loaded extension names, in load order.
    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("converters", &self.converters.keys().collect::<Vec<_>>())
            .field("factories", &self.operator_types())
            .field("available", &self.available.keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded)
            .finish()
    }
}

fn convert_duration(value: &Value) -> std::result::Result<Value, String> {
    let duration = if let Some(ms) = value.as_f64() {
        duration_from_ms(ms)?
    } else if let Some(text) = value.as_str() {
        parse_duration(text)?
    } else {
        return Ok(value.clone());
    };
    Value::from_serialize(&duration)
}

fn duration_from_ms(ms: f64) -> std::result::Result<Duration, String> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(format!("invalid duration: {} ms", ms));
    }
    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
}

fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration '{}'", text))?;
    let ms = match unit.trim() {
        "" | "ms" => number,
        "us" => number / 1000.0,
        "s" => number * 1000.0,
        "m" => number * 60_000.0,
        other => return Err(format!("unknown duration unit '{}'", other)),
    };
    duration_from_ms(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::OperatorSpec;

    struct Nop;

    impl Operator for Nop {
        fn setup(&mut self, _spec: &mut OperatorSpec) {}
    }

    struct Codecs;

    impl Extension for Codecs {
        fn name(&self) -> &str {
            "codecs"
        }

        fn register(&self, registry: &mut Registry) -> Result<()> {
            registry.register_factory("Nop", Arc::new(|| Box::new(Nop) as Box<dyn Operator>));
            Ok(())
        }
    }

    #[test]
    fn duration_converter_accepts_units() {
        let registry = Registry::with_defaults();
        let name = std::any::type_name::<Duration>();
        let converted = registry.convert(name, &Value::from("250ms")).unwrap();
        assert_eq!(converted.decode::<Duration>().unwrap(), Duration::from_millis(250));
        let converted = registry.convert(name, &Value::from("2s")).unwrap();
        assert_eq!(converted.decode::<Duration>().unwrap(), Duration::from_secs(2));
        let converted = registry.convert(name, &Value::from(40)).unwrap();
        assert_eq!(converted.decode::<Duration>().unwrap(), Duration::from_millis(40));
        assert!(registry.convert(name, &Value::from("3 parsecs")).is_err());
    }

    #[test]
    fn unconverted_types_pass_through() {
        let registry = Registry::new();
        assert_eq!(registry.convert("u32", &Value::from(7)).unwrap(), Value::from(7));
    }

    #[test]
    fn extensions_load_once() {
        let mut registry = Registry::new();
        registry.add_extension(Arc::new(Codecs));
        assert!(registry.create("Nop").is_err());
        registry.load("codecs").unwrap();
        registry.load("codecs").unwrap();
        assert_eq!(registry.loaded(), ["codecs".to_string()]);
        assert!(registry.create("Nop").is_ok());
    }

    #[test]
    fn unknown_extension_fails() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.load("missing").unwrap_err(),
            SluiceError::UnknownExtension { ref name } if name == "missing"
        ));
    }
}
