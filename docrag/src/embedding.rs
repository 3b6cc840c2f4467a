//! Embedding generation.
//!
//! [`EmbeddingProvider`] is the seam for pretrained dense models.
//! [`HybridEmbedder`] composes an optional provider with the
//! [`HashedBagOfWordsEmbedder`] fallback so that embedding text never fails
//! and always yields exactly `dimension` components.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::hashing::HashedBagOfWordsEmbedder;

/// A pretrained model that generates dense vector embeddings from text.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Short name used in logs and errors.
    fn name(&self) -> &str {
        "pretrained"
    }
}

/// Which path produced an embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    /// The pretrained provider's vector, returned as-is.
    Pretrained,
    /// The hashed bag-of-words fallback.
    HashedBagOfWords,
}

/// An embedding together with the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub source: EmbeddingSource,
}

/// How a [`HybridEmbedder`] produces vectors.
#[derive(Clone)]
pub enum EmbeddingStrategy {
    /// Try the pretrained provider first, fall back to hashing.
    PretrainedWithFallback(Arc<dyn EmbeddingProvider>),
    /// Always use the hashed bag-of-words embedder.
    HashedBagOfWords,
}

impl std::fmt::Debug for EmbeddingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PretrainedWithFallback(p) => {
                f.debug_tuple("PretrainedWithFallback").field(&p.name()).finish()
            }
            Self::HashedBagOfWords => f.write_str("HashedBagOfWords"),
        }
    }
}

/// Total embedding function over a pretrained provider and a hashed fallback.
///
/// A pretrained vector is used only when the provider succeeds and returns
/// exactly `dimension` finite components that are not all zero; anything
/// else falls through to [`HashedBagOfWordsEmbedder`].
///
/// # Example
///
/// ```rust,ignore
/// use docrag::HybridEmbedder;
///
/// let embedder = HybridEmbedder::new(300).with_pretrained(Arc::new(provider));
/// let v = embedder.embed("How do I scale a model?").await;
/// assert_eq!(v.len(), 300);
/// ```
#[derive(Debug, Clone)]
pub struct HybridEmbedder {
    strategy: EmbeddingStrategy,
    fallback: HashedBagOfWordsEmbedder,
}

impl HybridEmbedder {
    /// Create an embedder that uses only the hashed fallback.
    pub fn new(dimension: usize) -> Self {
        Self {
            strategy: EmbeddingStrategy::HashedBagOfWords,
            fallback: HashedBagOfWordsEmbedder::new(dimension),
        }
    }

    /// Try `provider` before falling back.
    pub fn with_pretrained(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        if provider.dimensions() != self.dimension() {
            warn!(
                provider = provider.name(),
                provider_dimensions = provider.dimensions(),
                dimension = self.dimension(),
                "pretrained provider dimensionality differs; its vectors will be bypassed"
            );
        }
        self.strategy = EmbeddingStrategy::PretrainedWithFallback(provider);
        self
    }

    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    pub fn strategy(&self) -> &EmbeddingStrategy {
        &self.strategy
    }

    /// Embed `text`. Never fails; empty text yields the zero vector.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        self.embed_tagged(text).await.vector
    }

    /// Embed `text`, reporting which path produced the vector.
    pub async fn embed_tagged(&self, text: &str) -> Embedding {
        if text.trim().is_empty() {
            return self.hashed(text);
        }
        if let EmbeddingStrategy::PretrainedWithFallback(provider) = &self.strategy {
            match provider.embed(text).await {
                Ok(vector) => {
                    if let Some(embedding) = self.accept_pretrained(provider.name(), vector) {
                        return embedding;
                    }
                }
                Err(e) => {
                    debug!(provider = provider.name(), error = %e, "pretrained embedding failed");
                }
            }
        }
        self.hashed(text)
    }

    /// Embed a batch of texts, one vector per input in order.
    ///
    /// The provider is asked for the whole batch at once; if that call
    /// fails every text falls back to hashing.
    pub async fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        let pretrained = match &self.strategy {
            EmbeddingStrategy::PretrainedWithFallback(provider) => {
                match provider.embed_batch(texts).await {
                    Ok(vectors) if vectors.len() == texts.len() => Some((provider, vectors)),
                    Ok(vectors) => {
                        warn!(
                            provider = provider.name(),
                            expected = texts.len(),
                            actual = vectors.len(),
                            "pretrained batch returned wrong number of vectors"
                        );
                        None
                    }
                    Err(e) => {
                        warn!(provider = provider.name(), error = %e, "pretrained batch failed");
                        None
                    }
                }
            }
            EmbeddingStrategy::HashedBagOfWords => None,
        };

        match pretrained {
            Some((provider, vectors)) => texts
                .iter()
                .zip(vectors)
                .map(|(text, vector)| {
                    if text.trim().is_empty() {
                        return self.hashed(text).vector;
                    }
                    self.accept_pretrained(provider.name(), vector)
                        .unwrap_or_else(|| self.hashed(text))
                        .vector
                })
                .collect(),
            None => texts.iter().map(|text| self.fallback.embed(text)).collect(),
        }
    }

    fn hashed(&self, text: &str) -> Embedding {
        Embedding { vector: self.fallback.embed(text), source: EmbeddingSource::HashedBagOfWords }
    }

    fn accept_pretrained(&self, provider: &str, vector: Vec<f32>) -> Option<Embedding> {
        if vector.len() != self.dimension() {
            debug!(
                provider,
                expected = self.dimension(),
                actual = vector.len(),
                "pretrained vector has wrong dimensionality"
            );
            return None;
        }
        if !vector.iter().all(|x| x.is_finite()) || vector.iter().all(|x| *x == 0.0) {
            debug!(provider, "pretrained vector is zero or non-finite");
            return None;
        }
        Some(Embedding { vector, source: EmbeddingSource::Pretrained })
    }
}

/// Copy `vector` into a new vector of length `dimension`, truncating or
/// zero-padding the tail.
pub fn reconcile_dimension(vector: &[f32], dimension: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dimension];
    let n = vector.len().min(dimension);
    out[..n].copy_from_slice(&vector[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    struct FixedProvider {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        fn dimensions(&self) -> usize {
            self.vector.len()
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::EmbeddingError { provider: "failing".into(), message: "offline".into() })
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn pretrained_vector_of_right_size_is_returned_unchanged() {
        let vector = vec![3.0, 0.0, 4.0, 0.0];
        let embedder = HybridEmbedder::new(4)
            .with_pretrained(Arc::new(FixedProvider { vector: vector.clone() }));
        let embedding = embedder.embed_tagged("gait analysis").await;
        assert_eq!(embedding.source, EmbeddingSource::Pretrained);
        assert_eq!(embedding.vector, vector);
    }

    #[tokio::test]
    async fn wrong_size_pretrained_falls_back() {
        let embedder = HybridEmbedder::new(8)
            .with_pretrained(Arc::new(FixedProvider { vector: vec![1.0; 5] }));
        let embedding = embedder.embed_tagged("gait analysis").await;
        assert_eq!(embedding.source, EmbeddingSource::HashedBagOfWords);
        assert_eq!(embedding.vector, HashedBagOfWordsEmbedder::new(8).embed("gait analysis"));
    }

    #[tokio::test]
    async fn zero_pretrained_vector_falls_back() {
        let embedder = HybridEmbedder::new(4)
            .with_pretrained(Arc::new(FixedProvider { vector: vec![0.0; 4] }));
        assert_eq!(
            embedder.embed_tagged("joint reaction").await.source,
            EmbeddingSource::HashedBagOfWords
        );
    }

    #[tokio::test]
    async fn provider_error_falls_back() {
        let embedder = HybridEmbedder::new(4).with_pretrained(Arc::new(FailingProvider));
        let v = embedder.embed("muscle").await;
        assert_eq!(v.len(), 4);
        assert_eq!(embedder.embed_batch(&["muscle", ""]).await[0], v);
    }

    #[tokio::test]
    async fn empty_text_is_zero_even_with_pretrained() {
        let embedder = HybridEmbedder::new(4)
            .with_pretrained(Arc::new(FixedProvider { vector: vec![1.0; 4] }));
        assert_eq!(embedder.embed("   ").await, vec![0.0; 4]);
        assert_eq!(embedder.embed_batch(&["", "x"]).await, vec![vec![0.0; 4], vec![1.0; 4]]);
    }

    #[test]
    fn reconcile_pads_and_truncates() {
        assert_eq!(reconcile_dimension(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(reconcile_dimension(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
        assert_eq!(reconcile_dimension(&[], 3), vec![0.0; 3]);
    }
}
