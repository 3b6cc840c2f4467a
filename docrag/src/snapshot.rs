//! An index paired with the chunks its rows refer to.
//!
//! [`IndexBuilder`] runs the build path (chunk → embed → index) and produces
//! an immutable [`IndexSnapshot`]. Row `i` of the snapshot's index is always
//! `chunks[i]`.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag::{IndexBuilder, RagConfig};
//!
//! let mut builder = IndexBuilder::new(RagConfig::default());
//! builder.add_documents(&documents);
//! let snapshot = builder.build().await?;
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::HybridEmbedder;
use crate::error::{RagError, Result};
use crate::index::{FlatL2Index, VectorIndex};

/// A built index and its row-to-chunk mapping. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    build_id: Uuid,
    index: FlatL2Index,
    chunks: Vec<Chunk>,
}

impl IndexSnapshot {
    /// Pair chunks with precomputed vectors; `vectors[i]` belongs to `chunks[i]`.
    ///
    /// Chunk ids are rewritten to their row positions.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexBuild`] if the two sequences differ in length
    /// or the vectors cannot be indexed.
    pub fn from_parts<V: AsRef<[f32]>>(mut chunks: Vec<Chunk>, vectors: &[V]) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::IndexBuild(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let index = FlatL2Index::build(vectors)?;
        for (row, chunk) in chunks.iter_mut().enumerate() {
            chunk.id = row;
        }
        Ok(Self { build_id: Uuid::new_v4(), index, chunks })
    }

    /// A snapshot with zero rows. Every query against it fails with
    /// [`RagError::EmptyIndex`].
    pub fn empty(dimension: usize) -> Self {
        Self { build_id: Uuid::new_v4(), index: FlatL2Index::empty(dimension), chunks: Vec::new() }
    }

    /// Reassemble a snapshot read back from disk.
    pub(crate) fn from_loaded(
        build_id: Uuid,
        index: FlatL2Index,
        chunks: Vec<Chunk>,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(RagError::Persistence {
                path: "snapshot".to_string(),
                message: format!("index has {} rows but {} chunks", index.len(), chunks.len()),
            });
        }
        if let Some((row, chunk)) = chunks.iter().enumerate().find(|(row, c)| c.id != *row) {
            return Err(RagError::Persistence {
                path: "snapshot".to_string(),
                message: format!("chunk at row {row} has id {}", chunk.id),
            });
        }
        Ok(Self { build_id, index, chunks })
    }

    /// Identifier shared by both persisted artifacts of this snapshot.
    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Batch builder for an [`IndexSnapshot`].
///
/// Documents are chunked as they are added; embedding and indexing happen
/// once, in [`build`](IndexBuilder::build). Rows follow insertion order.
pub struct IndexBuilder {
    embedder: HybridEmbedder,
    chunker: Arc<dyn Chunker>,
    chunks: Vec<Chunk>,
    documents: usize,
}

impl IndexBuilder {
    /// Create a builder using the config's chunking parameters and a
    /// hashed-only embedder of `embedding_size` dimensions.
    pub fn new(config: RagConfig) -> Self {
        Self {
            embedder: HybridEmbedder::new(config.embedding_size),
            chunker: Arc::new(FixedSizeChunker::from_config(&config)),
            chunks: Vec::new(),
            documents: 0,
        }
    }

    /// Use `embedder` instead of the hashed-only default.
    pub fn with_embedder(mut self, embedder: HybridEmbedder) -> Self {
        self.embedder = embedder;
        self
    }

    /// Use a custom chunking strategy.
    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Chunk `document` and queue its chunks. Returns how many were queued.
    ///
    /// Whitespace-only chunks carry nothing to embed and are skipped.
    pub fn add_document(&mut self, document: &Document) -> usize {
        let before = self.chunks.len();
        for chunk in self.chunker.chunk(document) {
            if chunk.text.trim().is_empty() {
                debug!(
                    document.id = %document.id,
                    chunk.index = chunk.metadata.chunk_index,
                    "skipping blank chunk"
                );
                continue;
            }
            self.chunks.push(chunk);
        }
        self.documents += 1;
        let added = self.chunks.len() - before;
        debug!(document.id = %document.id, chunk_count = added, "chunked document");
        added
    }

    pub fn add_documents(&mut self, documents: &[Document]) -> usize {
        documents.iter().map(|d| self.add_document(d)).sum()
    }

    /// Number of chunks queued so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Embed every queued chunk and build the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexBuild`] if no chunks were queued.
    pub async fn build(self) -> Result<IndexSnapshot> {
        if self.chunks.is_empty() {
            warn!(documents = self.documents, "refusing to build an index from an empty corpus");
            return Err(RagError::IndexBuild("corpus produced no chunks".to_string()));
        }

        let texts: Vec<&str> = self.chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await;
        let snapshot = IndexSnapshot::from_parts(self.chunks, &vectors)?;

        info!(
            documents = self.documents,
            chunk_count = snapshot.len(),
            dimension = snapshot.dimension(),
            build_id = %snapshot.build_id(),
            "built index"
        );
        Ok(snapshot)
    }
}
