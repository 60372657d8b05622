//! # Store Configuration
//!
//! TOML-backed settings for building a `Session`.
//!
//! ```toml
//! default_graph = "urn:example:default"
//! standard_prefixes = true
//!
//! [backend]
//! kind = "redb"
//! path = "data/quads.redb"
//!
//! [prefixes]
//! ex = "http://example.org/"
//! ```
//!
//! Environment overrides: `QUADRANT_BACKEND` (`memory` | `redb`),
//! `QUADRANT_DB_PATH`, `QUADRANT_DEFAULT_GRAPH`.

use crate::QuadError;
use crate::namespace::NamespaceRegistry;
use crate::primitives::DEFAULT_GRAPH_URI;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable selecting the backend kind.
pub const ENV_BACKEND: &str = "QUADRANT_BACKEND";
/// Environment variable holding the redb database path.
pub const ENV_DB_PATH: &str = "QUADRANT_DB_PATH";
/// Environment variable overriding the default graph URI.
pub const ENV_DEFAULT_GRAPH: &str = "QUADRANT_DEFAULT_GRAPH";

/// Which storage backend a session uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory store.
    #[default]
    Memory,
    /// redb database file.
    Redb { path: PathBuf },
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendConfig,
    /// URI of the reserved default graph.
    pub default_graph: String,
    /// Preload the well-known prefixes (rdf, rdfs, xsd, owl, foaf, ...).
    pub standard_prefixes: bool,
    /// Extra prefixes, registered after the standard ones in file order.
    pub prefixes: IndexMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            default_graph: DEFAULT_GRAPH_URI.to_string(),
            standard_prefixes: true,
            prefixes: IndexMap::new(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, QuadError> {
        let config: Self =
            toml::from_str(text).map_err(|e| QuadError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QuadError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QuadError::IoError(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Apply `QUADRANT_*` environment overrides.
    pub fn apply_env(self) -> Result<Self, QuadError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment in production).
    ///
    /// `QUADRANT_DB_PATH` alone switches the backend to redb.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, QuadError> {
        let path = lookup(ENV_DB_PATH).map(PathBuf::from);

        match lookup(ENV_BACKEND).map(|kind| kind.to_ascii_lowercase()) {
            Some(kind) if kind == "memory" => self.backend = BackendConfig::Memory,
            Some(kind) if kind == "redb" => {
                let path = match (path, &self.backend) {
                    (Some(path), _) => path,
                    (None, BackendConfig::Redb { path }) => path.clone(),
                    (None, BackendConfig::Memory) => {
                        return Err(QuadError::ConfigError(format!(
                            "{}=redb requires {}",
                            ENV_BACKEND, ENV_DB_PATH
                        )));
                    }
                };
                self.backend = BackendConfig::Redb { path };
            }
            Some(other) => {
                return Err(QuadError::ConfigError(format!(
                    "unknown backend '{}'",
                    other
                )));
            }
            None => {
                if let Some(path) = path {
                    self.backend = BackendConfig::Redb { path };
                }
            }
        }

        if let Some(graph) = lookup(ENV_DEFAULT_GRAPH) {
            self.default_graph = graph;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check invariants a session relies on.
    pub fn validate(&self) -> Result<(), QuadError> {
        if self.default_graph.trim().is_empty() {
            return Err(QuadError::ConfigError(
                "default_graph must not be empty".to_string(),
            ));
        }
        if let BackendConfig::Redb { path } = &self.backend
            && path.as_os_str().is_empty()
        {
            return Err(QuadError::ConfigError(
                "redb backend requires a path".to_string(),
            ));
        }
        if let Some((prefix, _)) = self
            .prefixes
            .iter()
            .find(|(prefix, uri)| prefix.is_empty() || prefix.contains(':') || uri.is_empty())
        {
            return Err(QuadError::ConfigError(format!(
                "invalid prefix entry '{}'",
                prefix
            )));
        }
        Ok(())
    }

    /// The namespace registry this configuration describes.
    #[must_use]
    pub fn namespace_registry(&self) -> NamespaceRegistry {
        let mut registry = if self.standard_prefixes {
            NamespaceRegistry::new()
        } else {
            NamespaceRegistry::empty()
        };
        for (prefix, uri) in &self.prefixes {
            registry.add_prefix(prefix.as_str(), uri.as_str());
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_empty() {
        let config = StoreConfig::from_toml_str("").expect("parse");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.namespace_registry(), NamespaceRegistry::new());
    }

    #[test]
    fn parse_full_document() {
        let config = StoreConfig::from_toml_str(
            r#"
            default_graph = "urn:example:default"
            standard_prefixes = false

            [backend]
            kind = "redb"
            path = "data/quads.redb"

            [prefixes]
            zz = "http://z.example/"
            aa = "http://a.example/"
            "#,
        )
        .expect("parse");

        assert_eq!(
            config.backend,
            BackendConfig::Redb {
                path: PathBuf::from("data/quads.redb")
            }
        );
        assert_eq!(config.default_graph, "urn:example:default");

        let registry = config.namespace_registry();
        let order: Vec<_> = registry.prefixes().map(|(prefix, _)| prefix).collect();
        assert_eq!(order, vec!["zz", "aa"]);
    }

    #[test]
    fn reject_invalid_documents() {
        assert!(matches!(
            StoreConfig::from_toml_str("default_graph = \"\""),
            Err(QuadError::ConfigError(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("[backend]\nkind = \"sql\""),
            Err(QuadError::ConfigError(_))
        ));
        assert!(matches!(
            StoreConfig::from_toml_str("[prefixes]\n\"a:b\" = \"http://x/\""),
            Err(QuadError::ConfigError(_))
        ));
    }

    #[test]
    fn overrides_switch_backend() {
        let env: HashMap<&str, &str> = [
            (ENV_DB_PATH, "/tmp/q.redb"),
            (ENV_DEFAULT_GRAPH, "urn:other"),
        ]
        .into_iter()
        .collect();

        let config = StoreConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("overrides");

        assert_eq!(
            config.backend,
            BackendConfig::Redb {
                path: PathBuf::from("/tmp/q.redb")
            }
        );
        assert_eq!(config.default_graph, "urn:other");
    }

    #[test]
    fn overrides_reject_redb_without_path() {
        let result = StoreConfig::default().apply_overrides(|key| {
            (key == ENV_BACKEND).then(|| "redb".to_string())
        });
        assert!(matches!(result, Err(QuadError::ConfigError(_))));
    }

    #[test]
    fn overrides_force_memory() {
        let config = StoreConfig {
            backend: BackendConfig::Redb {
                path: PathBuf::from("x.redb"),
            },
            ..StoreConfig::default()
        };
        let config = config
            .apply_overrides(|key| (key == ENV_BACKEND).then(|| "MEMORY".to_string()))
            .expect("overrides");
        assert_eq!(config.backend, BackendConfig::Memory);
    }
}
