//! Document chunking.
//!
//! [`FixedSizeChunker`] splits a document into windows of at most
//! `chunk_size` characters, each sharing exactly `chunk_overlap` characters
//! with its predecessor. Units are Unicode scalar values (`char`s), so
//! offsets never split a code point.

use std::iter::FusedIterator;

use crate::config::RagConfig;
use crate::document::{Chunk, ChunkMetadata, Document, TITLE_KEY};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and provenance but without
/// corpus row ids; those are assigned when the index is assembled.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// The final chunk may be shorter than `chunk_size`; it is always emitted.
/// A document shorter than `chunk_size` yields exactly one chunk.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(100, 20);
/// for chunk in chunker.chunks(&document) {
///     println!("{}..{}", chunk.metadata.start, chunk.metadata.end);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks: Option<usize>,
    sentence_boundaries: bool,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    ///
    /// An overlap that is not smaller than the chunk size is clamped to
    /// `chunk_size - 1` so the sequence always advances. Use
    /// [`RagConfig`] to have invalid combinations rejected instead.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            max_chunks: None,
            sentence_boundaries: false,
        }
    }

    /// Create a chunker from a validated config.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
            .with_max_chunks(config.max_chunks_per_document)
            .with_sentence_boundaries(config.sentence_boundaries)
    }

    /// Stop after `max` chunks per document.
    pub fn with_max_chunks(mut self, max: Option<usize>) -> Self {
        self.max_chunks = max;
        self
    }

    /// End non-final chunks just after the last `". "` in the window when
    /// doing so still leaves the chunk longer than the overlap.
    pub fn with_sentence_boundaries(mut self, enabled: bool) -> Self {
        self.sentence_boundaries = enabled;
        self
    }

    /// Lazily iterate over the chunks of `document`.
    ///
    /// Calling this again (or cloning the iterator) restarts the sequence.
    pub fn chunks<'a>(&'a self, document: &'a Document) -> ChunkIter<'a> {
        let mut offsets: Vec<usize> = document.text.char_indices().map(|(i, _)| i).collect();
        offsets.push(document.text.len());
        ChunkIter { chunker: self, document, offsets, start: 0, index: 0, done: false }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.chunks(document).collect()
    }
}

/// Lazy iterator returned by [`FixedSizeChunker::chunks`].
#[derive(Debug, Clone)]
pub struct ChunkIter<'a> {
    chunker: &'a FixedSizeChunker,
    document: &'a Document,
    /// Byte offset of every char, plus the text length as a sentinel.
    offsets: Vec<usize>,
    start: usize,
    index: usize,
    done: bool,
}

impl ChunkIter<'_> {
    fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.document.text[self.offsets[start]..self.offsets[end]]
    }

    /// Char index just past the last `.` of a `". "` inside `[start, end)`.
    fn sentence_end(&self, start: usize, end: usize) -> Option<usize> {
        let window = self.slice(start, end);
        let pos = window.rfind(". ")?;
        let byte = self.offsets[start] + pos;
        self.offsets.binary_search(&byte).ok().map(|i| i + 1)
    }

    fn make_chunk(&self, start: usize, end: usize) -> Chunk {
        let document = self.document;
        let mut extra = document.metadata.clone();
        extra.remove(TITLE_KEY);
        Chunk {
            id: self.index,
            text: self.slice(start, end).to_string(),
            metadata: ChunkMetadata {
                document_id: document.id.clone(),
                chunk_index: self.index,
                start,
                end,
                title: document.title().map(str::to_string),
                source_uri: document.origin().map(str::to_string),
                extra,
            },
        }
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        let len = self.char_len();
        let size = self.chunker.chunk_size;
        let overlap = self.chunker.chunk_overlap;
        if len == 0 || self.chunker.max_chunks.is_some_and(|max| self.index >= max) {
            self.done = true;
            return None;
        }

        let start = self.start;
        let mut end = (start + size).min(len);
        if end < len && self.chunker.sentence_boundaries {
            if let Some(snapped) = self.sentence_end(start, end) {
                if snapped - start > overlap {
                    end = snapped;
                }
            }
        }

        let chunk = self.make_chunk(start, end);
        if end >= len {
            self.done = true;
        } else {
            self.start = end - overlap;
            self.index += 1;
        }
        Some(chunk)
    }
}

impl FusedIterator for ChunkIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::URL_KEY;

    fn doc(text: &str) -> Document {
        Document::new("doc", text)
    }

    #[test]
    fn short_document_yields_single_identical_chunk() {
        let d = doc("OpenSim models musculoskeletal dynamics.");
        let chunks = FixedSizeChunker::new(100, 20).chunk(&d);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, d.text);
        assert_eq!((chunks[0].metadata.start, chunks[0].metadata.end), (0, d.text.len()));
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(FixedSizeChunker::new(100, 20).chunk(&doc("")).is_empty());
    }

    #[test]
    fn two_hundred_fifty_chars_with_overlap_twenty() {
        let text: String = (0..250).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let d = doc(&text);
        let chunks = FixedSizeChunker::new(100, 20).chunk(&d);

        let lens: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(lens, vec![100, 100, 90]);
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0].text.chars().skip(80).collect();
            let next_head: String = pair[1].text.chars().take(20).collect();
            assert_eq!(prev_tail, next_head);
        }
        assert_eq!(chunks.last().unwrap().metadata.end, 250);
    }

    #[test]
    fn exact_multiple_does_not_emit_redundant_tail() {
        let text = "x".repeat(180);
        let chunks = FixedSizeChunker::new(100, 20).chunk(&doc(&text));
        let spans: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.metadata.start, c.metadata.end)).collect();
        assert_eq!(spans, vec![(0, 100), (80, 180)]);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(30);
        let chunks = FixedSizeChunker::new(10, 3).chunk(&doc(&text));
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
        assert_eq!(chunks[0].text, "é".repeat(10));
    }

    #[test]
    fn max_chunks_caps_the_sequence() {
        let text = "y".repeat(1000);
        let chunker = FixedSizeChunker::new(100, 20).with_max_chunks(Some(3));
        assert_eq!(chunker.chunks(&doc(&text)).count(), 3);
    }

    #[test]
    fn iterator_is_restartable() {
        let text = "z".repeat(400);
        let d = doc(&text);
        let chunker = FixedSizeChunker::new(100, 10);
        let mut iter = chunker.chunks(&d);
        let first = iter.next().unwrap();
        let replay = iter.clone().collect::<Vec<_>>();
        assert_eq!(iter.collect::<Vec<_>>(), replay);
        assert_eq!(chunker.chunks(&d).next().unwrap(), first);
    }

    #[test]
    fn sentence_boundaries_pull_chunk_end_back() {
        let text = format!("{}. {}", "a".repeat(60), "b".repeat(100));
        let chunker = FixedSizeChunker::new(100, 10).with_sentence_boundaries(true);
        let chunks = chunker.chunk(&doc(&text));
        assert!(chunks[0].text.ends_with('.'));
        assert_eq!(chunks[0].metadata.end, 61);
        assert_eq!(chunks[1].metadata.start, 51);
    }

    #[test]
    fn metadata_carries_provenance() {
        let d = doc("some text")
            .with_metadata(TITLE_KEY, "Getting Started")
            .with_metadata(URL_KEY, "https://simtk-confluence.stanford.edu/start")
            .with_metadata("file_name", "start.txt");
        let chunk = &FixedSizeChunker::new(50, 5).chunk(&d)[0];
        assert_eq!(chunk.metadata.title.as_deref(), Some("Getting Started"));
        assert_eq!(
            chunk.metadata.source_uri.as_deref(),
            Some("https://simtk-confluence.stanford.edu/start")
        );
        assert_eq!(chunk.metadata.extra.get("file_name").map(String::as_str), Some("start.txt"));
        assert_eq!(
            chunk.metadata.extra.get(URL_KEY).map(String::as_str),
            Some("https://simtk-confluence.stanford.edu/start")
        );
        assert!(!chunk.metadata.extra.contains_key(TITLE_KEY));
    }
}
