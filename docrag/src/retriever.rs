//! Query-time retrieval.
//!
//! The [`Retriever`] embeds query text, reconciles the embedding with the
//! index dimensionality, searches, and maps rows back to chunks. It owns the
//! current [`IndexSnapshot`] behind an `Arc`; queries take a reference to
//! the snapshot and search without holding any lock, and
//! [`replace`](Retriever::replace) publishes a fully built snapshot in one
//! step.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{Retriever, RagConfig, HybridEmbedder, store};
//!
//! let retriever = Retriever::builder()
//!     .config(RagConfig::default())
//!     .embedder(HybridEmbedder::new(300))
//!     .snapshot(store::load("vector_db")?)
//!     .build()?;
//!
//! let result = retriever.query("How do I scale a model?", 5).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{EmptyQueryPolicy, RagConfig};
use crate::document::{QueryResult, SOURCE_FILE_KEY, SearchResult, URL_KEY};
use crate::embedding::{HybridEmbedder, reconcile_dimension};
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::snapshot::IndexSnapshot;
use crate::summarizer::{ExtractiveSummarizer, Summarizer};

/// Attribution for one passage used in an [`Answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub title: Option<String>,
    pub url: Option<String>,
    pub file: Option<String>,
}

/// A synthesized answer with the passages and sources behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    /// Retrieved passages joined by blank lines, in rank order.
    pub context: String,
    pub sources: Vec<SourceRef>,
}

/// Answers queries against the current [`IndexSnapshot`].
///
/// Construct one via [`Retriever::builder()`].
pub struct Retriever {
    config: RagConfig,
    embedder: HybridEmbedder,
    summarizer: Arc<dyn Summarizer>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The snapshot queries currently run against.
    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Publish `snapshot`, returning the one it replaces.
    ///
    /// Queries already in flight finish against the previous snapshot.
    pub async fn replace(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let next = Arc::new(snapshot);
        let mut current = self.snapshot.write().await;
        info!(rows = next.len(), build_id = %next.build_id(), "publishing index snapshot");
        std::mem::replace(&mut *current, next)
    }

    /// Query with the configured default `top_k`.
    pub async fn query_default(&self, text: &str) -> Result<QueryResult> {
        self.query(text, self.config.top_k).await
    }

    /// Return up to `top_k` chunks closest to `text`, ascending by distance.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if the index has no rows.
    /// - [`RagError::InvalidQuery`] if `text` embeds to the zero vector (it is
    ///   blank, punctuation, or only stopwords and numbers) and the
    ///   empty-query policy is [`EmptyQueryPolicy::Reject`].
    pub async fn query(&self, text: &str, top_k: usize) -> Result<QueryResult> {
        let snapshot = self.snapshot().await;
        if snapshot.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let normalized = text.trim();
        let vector = if normalized.chars().any(char::is_alphanumeric) {
            self.embedder.embed(normalized).await
        } else {
            vec![0.0; snapshot.dimension()]
        };

        // Stopword-only or numeric text embeds to the zero vector as well.
        if vector.iter().all(|x| *x == 0.0) {
            match self.config.empty_query {
                EmptyQueryPolicy::Reject => {
                    return Err(RagError::InvalidQuery(
                        "query has no searchable content".to_string(),
                    ));
                }
                EmptyQueryPolicy::Default => {
                    debug!(query = text, "degenerate query; searching with the zero vector");
                }
            }
        }

        rank(&snapshot, text, &vector, top_k)
    }

    /// Search with a precomputed query vector.
    ///
    /// The vector is reconciled with the index dimension like an embedded query.
    pub async fn query_vector(&self, vector: &[f32], top_k: usize) -> Result<QueryResult> {
        let snapshot = self.snapshot().await;
        if snapshot.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        rank(&snapshot, "", vector, top_k)
    }

    /// Answer `question` from the configured default number of passages.
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        self.answer_with(question, self.config.top_k).await
    }

    /// Retrieve `top_k` passages for `question` and hand them to the summarizer.
    pub async fn answer_with(&self, question: &str, top_k: usize) -> Result<Answer> {
        let retrieved = self.query(question, top_k).await?;
        let answer = self.summarizer.summarize(question, &retrieved).await?;

        let context = retrieved
            .results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let sources = retrieved
            .results
            .iter()
            .map(|r| {
                let meta = &r.chunk.metadata;
                SourceRef {
                    title: meta.title.clone(),
                    url: meta.extra.get(URL_KEY).cloned(),
                    file: meta.extra.get(SOURCE_FILE_KEY).cloned(),
                }
            })
            .collect();

        Ok(Answer { question: question.to_string(), answer, context, sources })
    }
}

fn rank(
    snapshot: &IndexSnapshot,
    query: &str,
    vector: &[f32],
    top_k: usize,
) -> Result<QueryResult> {
    let dimension = snapshot.dimension();
    let reconciled;
    let vector = if vector.len() == dimension {
        vector
    } else {
        warn!(
            expected = dimension,
            actual = vector.len(),
            "query embedding dimension differs from index; padding/truncating"
        );
        reconciled = reconcile_dimension(vector, dimension);
        reconciled.as_slice()
    };

    let neighbors = snapshot.index().search(vector, top_k)?;
    let results: Vec<SearchResult> = neighbors
        .into_iter()
        .filter_map(|n| match snapshot.chunk(n.row) {
            Some(chunk) => Some(SearchResult::new(chunk.clone(), n.distance)),
            None => {
                warn!(row = n.row, "index row has no chunk; skipping");
                None
            }
        })
        .collect();

    info!(result_count = results.len(), top_k, "query completed");
    Ok(QueryResult { query: query.to_string(), results })
}

/// Builder for constructing a [`Retriever`].
///
/// `config` and `snapshot` are required. The embedder defaults to a hashed
/// embedder of the config's `embedding_size`; the summarizer defaults to
/// [`ExtractiveSummarizer`].
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    embedder: Option<HybridEmbedder>,
    summarizer: Option<Arc<dyn Summarizer>>,
    snapshot: Option<IndexSnapshot>,
}

impl RetrieverBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedder(mut self, embedder: HybridEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Set the initial snapshot.
    pub fn snapshot(mut self, snapshot: IndexSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Build the [`Retriever`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<Retriever> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let snapshot = self
            .snapshot
            .ok_or_else(|| RagError::ConfigError("snapshot is required".to_string()))?;
        let embedder = self.embedder.unwrap_or_else(|| HybridEmbedder::new(config.embedding_size));
        if embedder.dimension() != snapshot.dimension() && !snapshot.is_empty() {
            warn!(
                embedder = embedder.dimension(),
                index = snapshot.dimension(),
                "embedder and index dimensions differ; queries will be reconciled"
            );
        }
        let summarizer =
            self.summarizer.unwrap_or_else(|| Arc::new(ExtractiveSummarizer::default()));

        Ok(Retriever { config, embedder, summarizer, snapshot: RwLock::new(Arc::new(snapshot)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunk, ChunkMetadata};

    fn chunk(text: &str) -> Chunk {
        Chunk { id: 0, text: text.to_string(), metadata: ChunkMetadata::default() }
    }

    fn retriever(snapshot: IndexSnapshot, config: RagConfig) -> Retriever {
        Retriever::builder().config(config).snapshot(snapshot).build().unwrap()
    }

    #[tokio::test]
    async fn empty_index_is_an_error() {
        let r = retriever(IndexSnapshot::empty(4), RagConfig::default());
        assert!(matches!(r.query("muscle", 3).await.unwrap_err(), RagError::EmptyIndex));
        assert!(matches!(r.query_vector(&[0.0; 4], 3).await.unwrap_err(), RagError::EmptyIndex));
    }

    #[tokio::test]
    async fn blank_query_rejected_by_default() {
        let snapshot = IndexSnapshot::from_parts(vec![chunk("a")], &[vec![1.0; 300]]).unwrap();
        let r = retriever(snapshot, RagConfig::default());
        assert!(matches!(r.query("  ?! ", 3).await.unwrap_err(), RagError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn stopword_and_numeric_queries_rejected_by_default() {
        let snapshot = IndexSnapshot::from_parts(
            vec![chunk("far"), chunk("near")],
            &[vec![30.0; 300], vec![0.1; 300]],
        )
        .unwrap();
        let r = retriever(snapshot, RagConfig::default());
        for text in ["the and of", "123", "123 456", "How is it?"] {
            assert!(
                matches!(r.query(text, 2).await.unwrap_err(), RagError::InvalidQuery(_)),
                "{text:?} should be rejected"
            );
        }
        assert_eq!(r.query("muscle forces", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stopword_query_searches_zero_vector_under_default_policy() {
        let snapshot = IndexSnapshot::from_parts(
            vec![chunk("far"), chunk("near")],
            &[vec![3.0, 4.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let config = RagConfig::builder()
            .embedding_size(2)
            .empty_query(EmptyQueryPolicy::Default)
            .build()
            .unwrap();
        let result = retriever(snapshot, config).query("the and of", 2).await.unwrap();
        assert_eq!(result.results[0].chunk.text, "near");
    }

    #[tokio::test]
    async fn blank_query_searches_zero_vector_under_default_policy() {
        let snapshot = IndexSnapshot::from_parts(
            vec![chunk("far"), chunk("near")],
            &[vec![3.0, 4.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let config = RagConfig::builder()
            .embedding_size(2)
            .empty_query(EmptyQueryPolicy::Default)
            .build()
            .unwrap();
        let result = retriever(snapshot, config).query("", 2).await.unwrap();
        assert_eq!(result.results[0].chunk.text, "near");
        assert_eq!(result.results[1].distance, 5.0);
    }

    #[tokio::test]
    async fn replace_swaps_whole_snapshot() {
        let first = IndexSnapshot::from_parts(vec![chunk("old")], &[vec![1.0, 0.0]]).unwrap();
        let second = IndexSnapshot::from_parts(
            vec![chunk("new"), chunk("newer")],
            &[vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .unwrap();
        let r = retriever(first, RagConfig::builder().embedding_size(2).build().unwrap());

        let old = r.replace(second).await;
        assert_eq!(old.len(), 1);
        let result = r.query_vector(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.results[0].chunk.text, "new");
    }

    fn scaling_chunk(url: Option<&str>) -> Chunk {
        let mut c = chunk("Use the Scale tool to resize a model.");
        c.metadata.title = Some("Scaling".into());
        c.metadata.source_uri = Some(url.unwrap_or("data/scaling.txt").into());
        c.metadata.extra.insert(SOURCE_FILE_KEY.into(), "data/scaling.txt".into());
        if let Some(url) = url {
            c.metadata.extra.insert(URL_KEY.into(), url.into());
        }
        c
    }

    async fn scaling_retriever(url: Option<&str>, top_k: usize) -> Retriever {
        let with_source = scaling_chunk(url);
        let embedder = HybridEmbedder::new(300);
        let vectors = embedder.embed_batch(&[with_source.text.as_str(), "unrelated text"]).await;
        let snapshot =
            IndexSnapshot::from_parts(vec![with_source, chunk("unrelated text")], &vectors)
                .unwrap();
        retriever(snapshot, RagConfig::builder().top_k(top_k).build().unwrap())
    }

    #[tokio::test]
    async fn answer_collects_context_and_sources() {
        let url = "https://simtk-confluence.stanford.edu/scaling";
        let r = scaling_retriever(Some(url), 1).await;

        let answer = r.answer("How do I scale a model?").await.unwrap();
        assert_eq!(answer.context, "Use the Scale tool to resize a model.");
        assert_eq!(
            answer.sources,
            vec![SourceRef {
                title: Some("Scaling".into()),
                url: Some(url.into()),
                file: Some("data/scaling.txt".into()),
            }]
        );
        assert_eq!(answer.answer, "Based on the documentation, here's what I found:");
    }

    #[tokio::test]
    async fn source_without_url_reports_only_the_file() {
        let r = scaling_retriever(None, 1).await;
        let answer = r.answer("How do I scale a model?").await.unwrap();
        assert_eq!(answer.sources[0].url, None);
        assert_eq!(answer.sources[0].file.as_deref(), Some("data/scaling.txt"));
    }

    #[tokio::test]
    async fn answer_with_overrides_configured_top_k() {
        let r = scaling_retriever(None, 1).await;
        assert_eq!(r.answer("scale model").await.unwrap().sources.len(), 1);

        let answer = r.answer_with("scale model", 2).await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.context, "Use the Scale tool to resize a model.\n\nunrelated text");
    }
}
