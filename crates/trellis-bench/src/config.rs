#![forbid(unsafe_code)]

//! Startup configuration for bench modules.
//!
//! A [`ConfigSource`] yields one JSON document when the bench starts. Its
//! top-level keys are module ids, matched case-insensitively; each value is
//! handed to the module verbatim.

use std::path::{Path, PathBuf};

use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{BenchError, Result};

/// Default file read by [`JsonFileConfig`].
pub const DEFAULT_CONFIG_PATH: &str = "bench.json";

pub trait ConfigSource {
    /// Where the document comes from, for logs and errors.
    fn origin(&self) -> String;

    fn load(&self) -> LocalBoxFuture<'_, Result<Value>>;
}

/// Reads a JSON file, `bench.json` unless told otherwise.
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonFileConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

impl ConfigSource for JsonFileConfig {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> LocalBoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let text =
                std::fs::read_to_string(&self.path).map_err(|source| BenchError::ConfigLoad {
                    origin: self.origin(),
                    source,
                })?;
            serde_json::from_str(&text).map_err(|source| BenchError::ConfigParse {
                origin: self.origin(),
                source,
            })
        })
    }
}

/// An in-memory document.
#[derive(Debug, Clone, Default)]
pub struct InlineConfig {
    document: Value,
}

impl InlineConfig {
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

impl ConfigSource for InlineConfig {
    fn origin(&self) -> String {
        "inline configuration".to_string()
    }

    fn load(&self) -> LocalBoxFuture<'_, Result<Value>> {
        let document = self.document.clone();
        Box::pin(async move { Ok(document) })
    }
}

/// Every module gets `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfig;

impl ConfigSource for NoConfig {
    fn origin(&self) -> String {
        "no configuration".to_string()
    }

    fn load(&self) -> LocalBoxFuture<'_, Result<Value>> {
        Box::pin(async { Ok(Value::Object(Map::new())) })
    }
}

/// Loaded configuration, keyed by upper-cased module id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchConfig {
    entries: Map<String, Value>,
}

impl BenchConfig {
    /// Re-key a loaded document. Anything but a JSON object is rejected.
    pub fn from_document(origin: &str, document: Value) -> Result<Self> {
        let object = match document {
            Value::Object(object) => object,
            other => {
                return Err(BenchError::ConfigShape {
                    origin: origin.to_string(),
                    found: kind(&other),
                });
            }
        };
        let mut entries = Map::new();
        for (key, value) in object {
            let normalized = key.to_uppercase();
            if entries.insert(normalized.clone(), value).is_some() {
                debug!(key = %normalized, "configuration key repeated; last value wins");
            }
        }
        Ok(Self { entries })
    }

    /// Entry for module `id`, `null` when absent.
    #[must_use]
    pub fn get(&self, id: &str) -> Value {
        self.entries
            .get(&id.to_uppercase())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Upper-cased keys present in the document.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
