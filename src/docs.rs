//! API documentation resolver.
//!
//! Operation docs live in one YAML file mapping an operation name to a
//! fragment (`summary`, `parameters`, `responses`, ...). The served spec is
//! assembled from those fragments and the routes the server registers.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

/// A documented route: HTTP method, path, and operation name in the docs file
#[derive(Debug, Clone, Copy)]
pub struct DocumentedRoute {
    pub method: &'static str,
    pub path: &'static str,
    pub operation: &'static str,
}

#[derive(Debug, Default, Clone)]
pub struct ApiDocs {
    operations: BTreeMap<String, Value>,
}

impl ApiDocs {
    /// Load docs from `path`; a missing file yields an empty catalog
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "API docs file not found, serving empty spec");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        Self::from_yaml(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Top-level keys are operation names; each value is kept as JSON
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let operations: BTreeMap<String, Value> =
            serde_yaml::from_str(raw).context("API docs must be a mapping of operation names")?;
        Ok(Self { operations })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.operations.get(name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Swagger 2.0 document covering `routes`
    pub fn openapi(&self, routes: &[DocumentedRoute]) -> Value {
        let mut paths: Map<String, Value> = Map::new();
        for route in routes {
            let operation = self
                .get(route.operation)
                .cloned()
                .unwrap_or_else(|| json!({ "summary": route.operation }));
            let entry = paths
                .entry(route.path.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(methods) = entry {
                methods.insert(route.method.to_lowercase(), operation);
            }
        }

        json!({
            "swagger": "2.0",
            "info": {
                "title": "RULEYATEAM API",
                "description": "Game statistics, fantasy and session API",
                "version": env!("CARGO_PKG_VERSION"),
            },
            "securityDefinitions": {
                "Bearer": {
                    "type": "apiKey",
                    "name": "Authorization",
                    "in": "header",
                    "description": "JWT Authorization header using the Bearer scheme. Example: 'Bearer {token}'"
                }
            },
            "security": [{ "Bearer": [] }],
            "paths": paths,
        })
    }
}
