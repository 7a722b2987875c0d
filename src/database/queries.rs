//! Query Catalog
//!
//! Resolves symbolic query names to SQL text kept in `*.sql` files. Each file
//! holds one or more blocks introduced by a `-- name: <ident>` marker:
//!
//! ```sql
//! -- name: get_user_by_email
//! SELECT id, email, username, user_rol FROM nba.dim_users WHERE email = $1;
//! ```
//!
//! The catalog is an explicit instance owned by the application state. Lookups
//! hit an in-memory cache; a miss rescans the directory once and fills the
//! cache with every block found.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use thiserror::Error;

static NAME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"--\s*name:\s*(\w+)").expect("query name marker regex"));

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query '{name}' not found. Available queries: {available:?}")]
    NotFound { name: String, available: Vec<String> },
    #[error("Failed to read SQL files from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct QueryCatalog {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl QueryCatalog {
    /// Catalog over `dir`; nothing is read until the first lookup or `preload`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// SQL text for `name`
    pub fn get(&self, name: &str) -> Result<Arc<str>, QueryError> {
        if let Some(sql) = self.cache.read().get(name) {
            return Ok(sql.clone());
        }

        tracing::debug!(query = name, dir = %self.dir.display(), "query cache miss, scanning");
        let scanned = self.scan()?;

        let mut cache = self.cache.write();
        cache.extend(scanned);
        match cache.get(name) {
            Some(sql) => Ok(sql.clone()),
            None => {
                let mut available: Vec<String> = cache.keys().cloned().collect();
                available.sort();
                Err(QueryError::NotFound {
                    name: name.to_string(),
                    available,
                })
            }
        }
    }

    /// Load every query up front; returns the number cached
    pub fn preload(&self) -> Result<usize, QueryError> {
        let scanned = self.scan()?;
        let mut cache = self.cache.write();
        cache.extend(scanned);
        Ok(cache.len())
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached text; the next lookup rescans the directory
    pub fn reset(&self) {
        self.cache.write().clear();
    }

    fn scan(&self) -> Result<Vec<(String, Arc<str>)>, QueryError> {
        let io_err = |source| QueryError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
            .collect();
        // Later files win on duplicate names; keep that deterministic
        files.sort();

        let mut queries = Vec::new();
        for path in files {
            let content = fs::read_to_string(&path).map_err(|source| QueryError::Io {
                path: path.clone(),
                source,
            })?;
            queries.extend(
                parse_queries(&content)
                    .into_iter()
                    .map(|(name, sql)| (name, Arc::from(sql))),
            );
        }
        Ok(queries)
    }
}

/// Split a file into `(name, sql)` pairs, dropping empty blocks
pub fn parse_queries(content: &str) -> Vec<(String, String)> {
    let markers: Vec<_> = NAME_MARKER.captures_iter(content).collect();
    let mut queries = Vec::with_capacity(markers.len());

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(content.len());

        let body = content[whole.end()..end].trim();
        let sql = body.strip_suffix(';').unwrap_or(body).trim();
        if !sql.is_empty() {
            queries.push((name.as_str().to_string(), sql.to_string()));
        }
    }
    queries
}
