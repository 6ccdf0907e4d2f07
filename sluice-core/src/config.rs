//! Configuration documents.
//!
//! A configuration is one or more YAML documents (JSON is accepted as a YAML
//! subset). The core only reads it: the top-level `extensions:` list names
//! extensions to load, a top-level key equal to an operator name supplies that
//! operator's parameter overrides, and any other key can be pulled in as
//! arguments with [`Config::from_config`].

use crate::error::{Result, SluiceError};
use crate::parameter::{Arg, ArgList};
use crate::value::Value;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

const EXTENSIONS_KEY: &str = "extensions";

/// A parsed configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    source: Option<PathBuf>,
    documents: Vec<serde_yaml::Value>,
}

impl Config {
    /// An empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse configuration text. Multiple `---` separated documents are allowed;
    /// later documents override earlier ones.
    pub fn parse(text: &str) -> Result<Self> {
        let mut documents = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(doc)
                .map_err(|e| SluiceError::config(format!("invalid YAML: {}", e)))?;
            if !value.is_null() {
                documents.push(value);
            }
        }
        Ok(Self {
            source: None,
            documents,
        })
    }

    /// Load a configuration file.
    ///
    /// A missing file is not an error: it is logged and yields an empty
    /// configuration. An unreadable or malformed file is an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file does not exist, using an empty configuration");
            return Ok(Self {
                source: Some(path.to_path_buf()),
                documents: Vec::new(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            SluiceError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&text)?;
        config.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), documents = config.documents.len(), "Loaded configuration");
        Ok(config)
    }

    /// The file this configuration was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether no document was loaded.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Extension names from every document's `extensions:` list, deduplicated
    /// in order of first appearance.
    pub fn extensions(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for doc in &self.documents {
            let Some(list) = doc.get(EXTENSIONS_KEY).and_then(|v| v.as_sequence()) else {
                continue;
            };
            for name in list.iter().filter_map(|v| v.as_str()) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Look up a dotted path (`"group.key"`). The last document defining it wins.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.documents.iter().rev().find_map(|doc| {
            let node = path
                .split('.')
                .try_fold(doc, |node, part| node.get(part))?;
            match Value::from_yaml(node) {
                Ok(value) => Some(value),
                Err(cause) => {
                    tracing::warn!(key = %path, %cause, "Skipping configuration value");
                    None
                }
            }
        })
    }

    /// Turn a configuration key into arguments.
    ///
    /// A mapping yields one argument per entry; any other value yields a
    /// single argument named by the full key. A missing key is logged and
    /// yields an empty list.
    pub fn from_config(&self, key: &str) -> ArgList {
        match self.get(key) {
            None => {
                tracing::warn!(key = %key, "Unable to find the parameter item/map with key");
                ArgList::new()
            }
            Some(value) => into_args(key, value),
        }
    }

    /// Parameter overrides for the operator named `operator`.
    ///
    /// Only a mapping under that top-level key counts; nothing is logged when
    /// it is absent.
    pub fn operator_overrides(&self, operator: &str) -> ArgList {
        self.documents
            .iter()
            .filter_map(|doc| doc.get(operator))
            .filter(|node| node.is_mapping())
            .filter_map(|node| Value::from_yaml(node).ok())
            .flat_map(|value| into_args(operator, value).iter().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Deserialize the section under `key`, if present.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|value| {
                value
                    .decode::<T>()
                    .map_err(|cause| SluiceError::config(format!("section '{}': {}", key, cause)))
            })
            .transpose()
    }
}

fn into_args(key: &str, value: Value) -> ArgList {
    match value.into_inner() {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(name, v)| Arg::new(name, Value(v)))
            .collect(),
        other => [Arg::new(key, Value(other))].into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = r#"
extensions:
  - video_codec
  - video_codec
  - tensor_ops

source:
  rate:
    hz: 30
  label: camera

multiplier: 3

filter:
  threshold: 0.75
"#;

    #[test]
    fn dotted_lookup() {
        let config = Config::parse(DOC).unwrap();
        assert_eq!(config.get("source.rate.hz"), Some(Value(json!(30))));
        assert!(config.get("source.rate.missing").is_none());
    }

    #[test]
    fn extensions_are_deduplicated() {
        let config = Config::parse(DOC).unwrap();
        assert_eq!(config.extensions(), vec!["video_codec", "tensor_ops"]);
    }

    #[test]
    fn from_config_mapping_and_scalar() {
        let config = Config::parse(DOC).unwrap();
        let args = config.from_config("source");
        assert_eq!(args.len(), 2);
        assert_eq!(args.get("label"), Some(&Value::from("camera")));

        let args = config.from_config("multiplier");
        assert_eq!(args.get("multiplier"), Some(&Value::from(3)));

        assert!(config.from_config("absent").is_empty());
    }

    #[test]
    fn later_documents_override_earlier() {
        let config = Config::parse("filter:\n  threshold: 0.1\n---\nfilter:\n  threshold: 0.9\n").unwrap();
        assert_eq!(config.get("filter.threshold"), Some(Value::from(0.9)));
        let overrides = config.operator_overrides("filter");
        assert_eq!(overrides.get("threshold"), Some(&Value::from(0.9)));
    }

    #[test]
    fn missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(dir.path().join("absent.yaml")).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.yaml");
        std::fs::write(&path, DOC).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source(), Some(path.as_path()));
        assert_eq!(config.operator_overrides("filter").len(), 1);
    }
}
