//! Parameters and arguments.
//!
//! An operator declares its parameters in `setup`; the values are resolved
//! once, right before `initialize`, from three layers in decreasing
//! precedence: explicit [`Arg`]s given at construction, values taken from the
//! configuration document, and the declared default.

use crate::error::{Result, SluiceError};
use crate::registry::Registry;
use crate::value::Value;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;

/// A named argument value.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    name: String,
    value: Value,
}

impl Arg {
    /// Create an argument.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Argument name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// An ordered list of arguments. Later entries override earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    args: Vec<Arg>,
}

impl ArgList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument.
    pub fn add(&mut self, arg: Arg) -> &mut Self {
        self.args.push(arg);
        self
    }

    /// Append every argument of another list.
    pub fn extend(&mut self, other: ArgList) -> &mut Self {
        self.args.extend(other.args);
        self
    }

    /// The last value given for `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.iter().rev().find(|a| a.name == name).map(|a| &a.value)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.args.iter()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl FromIterator<Arg> for ArgList {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().collect(),
        }
    }
}

type CheckFn = fn(&Value) -> std::result::Result<(), String>;

fn check_as<T: DeserializeOwned>(value: &Value) -> std::result::Result<(), String> {
    value.decode::<T>().map(|_| ())
}

/// Declaration of a single parameter.
#[derive(Clone)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Rust type name of the declared type.
    pub type_name: &'static str,
    /// Default value, if any.
    pub default: Option<Value>,
    /// Optional parameters may stay unbound.
    pub optional: bool,
    check: CheckFn,
}

impl ParamSpec {
    /// Declare a parameter of type `T`.
    pub fn new<T: DeserializeOwned>(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            type_name: std::any::type_name::<T>(),
            default: None,
            optional: false,
            check: check_as::<T>,
        }
    }

    /// Set the default value.
    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(value.into());
        self
    }

    /// Allow the parameter to stay unbound.
    pub fn optional(&mut self) -> &mut Self {
        self.optional = true;
        self
    }

    fn check(&self, value: &Value) -> std::result::Result<(), String> {
        (self.check)(value)
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("default", &self.default)
            .field("optional", &self.optional)
            .finish()
    }
}

/// Resolved parameter values for one operator.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    operator: String,
    values: HashMap<String, Value>,
}

impl Parameters {
    /// Resolve declared parameters against explicit and configured arguments.
    ///
    /// Every declared parameter is checked; the first unbound or ill-typed one
    /// fails resolution. Arguments naming no declared parameter are logged and
    /// ignored.
    pub fn resolve(
        operator: &str,
        specs: &[ParamSpec],
        explicit: &ArgList,
        configured: &ArgList,
        registry: &Registry,
    ) -> Result<Self> {
        for arg in explicit.iter() {
            if !specs.iter().any(|s| s.name == arg.name) {
                tracing::warn!(
                    operator = %operator,
                    argument = %arg.name,
                    "Argument does not match any declared parameter"
                );
            }
        }

        let mut values = HashMap::with_capacity(specs.len());
        for spec in specs {
            let raw = explicit
                .get(&spec.name)
                .or_else(|| configured.get(&spec.name))
                .or(spec.default.as_ref());

            let Some(raw) = raw else {
                if spec.optional {
                    continue;
                }
                return Err(SluiceError::MissingParameter {
                    operator: operator.to_string(),
                    parameter: spec.name.clone(),
                });
            };

            let converted = registry.convert(spec.type_name, raw).map_err(|cause| {
                SluiceError::ParameterType {
                    operator: operator.to_string(),
                    parameter: spec.name.clone(),
                    expected: spec.type_name.to_string(),
                    cause,
                }
            })?;
            spec.check(&converted).map_err(|cause| SluiceError::ParameterType {
                operator: operator.to_string(),
                parameter: spec.name.clone(),
                expected: spec.type_name.to_string(),
                cause,
            })?;

            tracing::trace!(operator = %operator, parameter = %spec.name, value = %converted, "Parameter resolved");
            values.insert(spec.name.clone(), converted);
        }

        Ok(Self {
            operator: operator.to_string(),
            values,
        })
    }

    /// Get a resolved value.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| SluiceError::MissingParameter {
                operator: self.operator.clone(),
                parameter: name.to_string(),
            })?;
        value.decode().map_err(|cause| SluiceError::ParameterType {
            operator: self.operator.clone(),
            parameter: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            cause,
        })
    }

    /// Get a resolved value, falling back to `default` when unbound.
    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> Result<T> {
        if self.contains(name) {
            self.get(name)
        } else {
            Ok(default)
        }
    }

    /// Whether a value was bound for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The operator these parameters belong to.
    pub fn operator(&self) -> &str {
        &self.operator
    }
}
