//! Answer synthesis over retrieved passages.

use async_trait::async_trait;

use crate::document::QueryResult;
use crate::error::Result;

/// Turns a question and its retrieved passages into answer text.
///
/// Implementations typically prompt a language model with the passages as
/// context; the retriever treats them as a black box.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, question: &str, retrieved: &QueryResult) -> Result<String>;
}

/// A summarizer that does no synthesis and returns a fixed preamble.
///
/// The passages themselves reach the caller through [`Answer::context`](crate::Answer).
///
/// # Example
///
/// ```rust,ignore
/// use docrag::ExtractiveSummarizer;
///
/// let summarizer = ExtractiveSummarizer::new("Here is what the OpenSim docs say:");
/// ```
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    preamble: String,
}

impl ExtractiveSummarizer {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self { preamble: preamble.into() }
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new("Based on the documentation, here's what I found:")
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, _question: &str, retrieved: &QueryResult) -> Result<String> {
        if retrieved.is_empty() {
            return Ok("No relevant documentation was found.".to_string());
        }
        Ok(self.preamble.clone())
    }
}
