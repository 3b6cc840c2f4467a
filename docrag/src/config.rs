//! Configuration for chunking, embedding, and retrieval.
//!
//! A [`RagConfig`] is fixed when an index is built: the `embedding_size`
//! recorded in the persisted index must match the one used at query time
//! for the pretrained path to be used without reconciliation.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// What the retriever does with a query that has no searchable content.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyQueryPolicy {
    /// Fail with [`RagError::InvalidQuery`].
    #[default]
    Reject,
    /// Search with the zero vector, i.e. rank rows by their own magnitude
    /// and row id. Deterministic, but not semantically meaningful.
    Default,
}

impl FromStr for EmptyQueryPolicy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "default" => Ok(Self::Default),
            other => Err(RagError::ConfigError(format!(
                "unknown empty query policy '{other}' (expected 'reject' or 'default')"
            ))),
        }
    }
}

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Length of every vector stored in the index.
    pub embedding_size: usize,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of results returned by a query.
    pub top_k: usize,
    /// Upper bound on chunks taken from a single document. `None` means unbounded.
    pub max_chunks_per_document: Option<usize>,
    /// Pull non-final chunk ends back to the last sentence boundary in the window.
    pub sentence_boundaries: bool,
    /// Handling of queries that have no searchable content.
    pub empty_query: EmptyQueryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_size: 300,
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            max_chunks_per_document: Some(50),
            sentence_boundaries: false,
            empty_query: EmptyQueryPolicy::Reject,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a config from process environment variables over the defaults.
    ///
    /// Recognized variables: `EMBEDDING_SIZE`, `CHUNK_SIZE`, `CHUNK_OVERLAP`,
    /// `TOP_K`, `MAX_CHUNKS_PER_DOCUMENT` (`0` or `none` disables the cap),
    /// `SENTENCE_BOUNDARIES` and `EMPTY_QUERY_POLICY`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a variable fails to parse or the
    /// resulting config is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(v) = lookup("EMBEDDING_SIZE") {
            builder = builder.embedding_size(parse_var("EMBEDDING_SIZE", &v)?);
        }
        if let Some(v) = lookup("CHUNK_SIZE") {
            builder = builder.chunk_size(parse_var("CHUNK_SIZE", &v)?);
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            builder = builder.chunk_overlap(parse_var("CHUNK_OVERLAP", &v)?);
        }
        if let Some(v) = lookup("TOP_K") {
            builder = builder.top_k(parse_var("TOP_K", &v)?);
        }
        if let Some(v) = lookup("MAX_CHUNKS_PER_DOCUMENT") {
            let cap = if v.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                match parse_var::<usize>("MAX_CHUNKS_PER_DOCUMENT", &v)? {
                    0 => None,
                    n => Some(n),
                }
            };
            builder = builder.max_chunks_per_document(cap);
        }
        if let Some(v) = lookup("SENTENCE_BOUNDARIES") {
            builder = builder.sentence_boundaries(parse_var("SENTENCE_BOUNDARIES", &v)?);
        }
        if let Some(v) = lookup("EMPTY_QUERY_POLICY") {
            builder = builder.empty_query(v.parse()?);
        }
        builder.build()
    }

    /// Load a JSON-serialized config and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: RagConfig = serde_json::from_str(&content).map_err(|e| {
            RagError::ConfigError(format!("failed to parse {}: {e}", path.display()))
        })?;
        RagConfigBuilder { config }.build()
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RagError::ConfigError(format!("{key} has invalid value '{value}'")))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the length of stored embedding vectors.
    pub fn embedding_size(mut self, size: usize) -> Self {
        self.config.embedding_size = size;
        self
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of results returned by a query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Cap the number of chunks taken from one document.
    pub fn max_chunks_per_document(mut self, max: Option<usize>) -> Self {
        self.config.max_chunks_per_document = max;
        self
    }

    /// Enable or disable sentence-boundary snapping of chunk ends.
    pub fn sentence_boundaries(mut self, enabled: bool) -> Self {
        self.config.sentence_boundaries = enabled;
        self
    }

    /// Set the empty-query policy.
    pub fn empty_query(mut self, policy: EmptyQueryPolicy) -> Self {
        self.config.empty_query = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `embedding_size == 0`
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `max_chunks_per_document == Some(0)`
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if c.embedding_size == 0 {
            return Err(RagError::ConfigError("embedding_size must be greater than zero".into()));
        }
        if c.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if c.max_chunks_per_document == Some(0) {
            return Err(RagError::ConfigError(
                "max_chunks_per_document must be greater than zero when set".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config, RagConfig::default());
        assert_eq!(config.embedding_size, 300);
        assert_eq!(config.top_k, 5);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(RagConfig::builder().embedding_size(0).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().max_chunks_per_document(Some(0)).build().is_err());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = RagConfig::from_lookup(lookup_from(&[
            ("EMBEDDING_SIZE", "384"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "20"),
            ("TOP_K", "3"),
            ("MAX_CHUNKS_PER_DOCUMENT", "none"),
            ("EMPTY_QUERY_POLICY", "Default"),
        ]))
        .unwrap();
        assert_eq!(config.embedding_size, 384);
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.chunk_overlap, 20);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.max_chunks_per_document, None);
        assert_eq!(config.empty_query, EmptyQueryPolicy::Default);
    }

    #[test]
    fn lookup_rejects_garbage() {
        let err = RagConfig::from_lookup(lookup_from(&[("TOP_K", "many")])).unwrap_err();
        assert!(err.to_string().contains("TOP_K"));
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = RagConfig::builder().embedding_size(64).top_k(7).build().unwrap();
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(RagConfig::from_json_file(&path).unwrap(), config);
    }
}
