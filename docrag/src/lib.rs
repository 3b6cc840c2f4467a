//! # docrag
//!
//! Retrieval over scraped product documentation: split documents into
//! overlapping chunks, embed them into fixed-size vectors, index the vectors
//! for Euclidean nearest-neighbour search, and answer free-text queries with
//! ranked, attributed passages.
//!
//! ## Build path
//!
//! ```rust,ignore
//! use docrag::{ingest, store, IndexBuilder, RagConfig};
//!
//! let config = RagConfig::from_env()?;
//! let mut builder = IndexBuilder::new(config);
//! builder.add_documents(&ingest::load_directory("data")?);
//! let snapshot = builder.build().await?;
//! store::save("vector_db", &snapshot)?;
//! ```
//!
//! ## Query path
//!
//! ```rust,ignore
//! use docrag::{store, RagConfig, Retriever};
//!
//! let retriever = Retriever::builder()
//!     .config(RagConfig::from_env()?)
//!     .snapshot(store::load("vector_db")?)
//!     .build()?;
//! let result = retriever.query("How do I run inverse kinematics?", 5).await?;
//! ```
//!
//! ## Features
//!
//! - `openai`: [`openai::OpenAIEmbeddingProvider`], a pretrained provider
//!   for OpenAI-compatible embedding endpoints.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod index;
pub mod ingest;
pub mod retriever;
pub mod snapshot;
pub mod store;
pub mod summarizer;
pub mod telemetry;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{ChunkIter, Chunker, FixedSizeChunker};
pub use config::{EmptyQueryPolicy, RagConfig, RagConfigBuilder};
pub use document::{Chunk, ChunkMetadata, Document, QueryResult, SearchResult};
pub use embedding::{
    Embedding, EmbeddingProvider, EmbeddingSource, EmbeddingStrategy, HybridEmbedder,
    reconcile_dimension,
};
pub use error::{RagError, Result};
pub use hashing::HashedBagOfWordsEmbedder;
pub use index::{FlatL2Index, Neighbor, VectorIndex};
pub use retriever::{Answer, Retriever, RetrieverBuilder, SourceRef};
pub use snapshot::{IndexBuilder, IndexSnapshot};
pub use summarizer::{ExtractiveSummarizer, Summarizer};
