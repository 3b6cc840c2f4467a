//! Data types for documents, chunks, and query results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding a document's human-readable title.
pub const TITLE_KEY: &str = "Title";

/// Metadata key holding a document's origin URL.
pub const URL_KEY: &str = "URL";

/// Metadata key holding the file a document was read from.
pub const SOURCE_FILE_KEY: &str = "source_file";

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source (URL or file path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach a source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    /// The document title, if one was recorded.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get(TITLE_KEY).map(String::as_str)
    }

    /// Where the document came from: the explicit source URI, else the
    /// `URL` metadata entry, else the file it was read from.
    pub fn origin(&self) -> Option<&str> {
        self.source_uri
            .as_deref()
            .or_else(|| self.metadata.get(URL_KEY).map(String::as_str))
            .or_else(|| self.metadata.get(SOURCE_FILE_KEY).map(String::as_str))
    }
}

/// Provenance of a [`Chunk`] within its parent [`Document`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    /// Start offset in the parent text, in characters.
    pub start: usize,
    /// End offset (exclusive) in the parent text, in characters.
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// URL or file path of the parent document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    /// Parent document metadata other than the title, including any `URL`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

/// A contiguous span of a [`Document`].
///
/// `id` is the chunk's row in the index once the corpus is assembled;
/// before that it equals the chunk's index within its document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: usize,
    /// The passage content.
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A retrieved [`Chunk`] with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Euclidean distance to the query vector (lower is more relevant).
    pub distance: f32,
    /// `1 / (1 + distance)`, in `(0, 1]` (higher is more relevant).
    pub score: f32,
}

impl SearchResult {
    pub(crate) fn new(chunk: Chunk, distance: f32) -> Self {
        Self { chunk, distance, score: 1.0 / (1.0 + distance) }
    }
}

/// Ranked results for a query, ascending by distance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// The query text as submitted.
    pub query: String,
    pub results: Vec<SearchResult>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
