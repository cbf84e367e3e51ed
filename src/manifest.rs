//! Template manifests
//!
//! A manifest is a TOML file declaring a set of named templates that are
//! compiled together into one [`Registry`], so they can call each other:
//!
//! ```toml
//! escape = "html"
//!
//! [templates.cell]
//! params = "value"
//! body = "= <td>{value}</td>"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::error::CompileError;
use crate::escape::Strategy;
use crate::render::Value;
use crate::template::{
    compile_with_options, CompileOptions, Registry, RegistryError, Signature, SignatureError,
};

/// Errors that can occur when loading a manifest or building its registry
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown escape strategy '{0}' (expected \"plain\" or \"html\")")]
    UnknownStrategy(String),

    #[error("template '{name}': {source}")]
    Signature {
        name: String,
        #[source]
        source: SignatureError,
    },

    #[error("template '{name}': {source}")]
    Compile {
        name: String,
        #[source]
        source: CompileError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One declared template
#[derive(Debug, Clone)]
pub struct ManifestTemplate {
    pub name: String,
    pub params: String,
    pub body: String,
    pub strategy: Strategy,
}

/// A parsed manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Strategy for templates that do not name their own
    pub strategy: Strategy,
    /// Templates sorted by name
    pub templates: Vec<ManifestTemplate>,
}

/// TOML structure for deserializing manifests
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlManifest {
    escape: Option<String>,
    #[serde(default)]
    templates: BTreeMap<String, TomlTemplate>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTemplate {
    #[serde(default)]
    params: String,
    body: String,
    escape: Option<String>,
}

fn strategy(name: Option<&str>, fallback: Strategy) -> Result<Strategy, ManifestError> {
    match name {
        Some(name) => {
            Strategy::by_name(name).ok_or_else(|| ManifestError::UnknownStrategy(name.to_string()))
        }
        None => Ok(fallback),
    }
}

impl Manifest {
    /// Load a manifest from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a manifest from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let parsed: TomlManifest = toml::from_str(content)?;
        let default = strategy(parsed.escape.as_deref(), Strategy::default())?;

        let templates = parsed
            .templates
            .into_iter()
            .map(|(name, t)| {
                Ok(ManifestTemplate {
                    strategy: strategy(t.escape.as_deref(), default)?,
                    name,
                    params: t.params,
                    body: t.body,
                })
            })
            .collect::<Result<Vec<_>, ManifestError>>()?;

        Ok(Manifest {
            strategy: default,
            templates,
        })
    }

    /// Get a declared template by name
    pub fn template(&self, name: &str) -> Option<&ManifestTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Compile every template into a registry
    pub fn into_registry(&self) -> Result<Registry, ManifestError> {
        let mut registry = Registry::new();
        for entry in &self.templates {
            let signature =
                Signature::parse(&entry.params).map_err(|source| ManifestError::Signature {
                    name: entry.name.clone(),
                    source,
                })?;
            let options = CompileOptions::new()
                .with_name(entry.name.as_str())
                .with_strategy(entry.strategy);
            let template = compile_with_options(&entry.body, signature, options).map_err(
                |source| ManifestError::Compile {
                    name: entry.name.clone(),
                    source,
                },
            )?;
            registry.register(template)?;
        }
        log::debug!("built registry with {} templates", registry.len());
        Ok(registry)
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::Str(s),
            toml::Value::Integer(n) => Value::Int(n),
            toml::Value::Float(x) => Value::Float(x),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(d) => Value::Str(d.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => {
                Value::Map(table.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
