//! Deterministic hashed bag-of-words embeddings.
//!
//! Tokens are hashed with 64-bit FNV-1a into `dimension` buckets. FNV-1a is
//! fixed and unseeded, so the same text always produces bit-identical
//! vectors across processes and machines. Collisions are accepted: the
//! vector is a fixed-width sketch, not a reversible encoding.

use std::collections::BTreeMap;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// English stopwords dropped before hashing.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "may", "me", "might", "more", "most", "must", "my", "myself", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves",
    "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "us", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours", "yourself", "yourselves",
];

/// 64-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Scale `v` to unit length in place. A zero vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Lowercased alphabetic, non-stopword tokens of `text`, in order.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && t.chars().all(char::is_alphabetic))
        .map(str::to_lowercase)
        .filter(|t| !is_stopword(t))
}

/// Feature-hashing embedder over word frequencies.
///
/// Total and deterministic: any text, including the empty string, maps to
/// a vector of exactly `dimension` components. Text without usable tokens
/// maps to the zero vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedBagOfWordsEmbedder {
    dimension: usize,
}

impl HashedBagOfWordsEmbedder {
    /// Create an embedder producing `dimension`-length vectors.
    ///
    /// A zero dimension is raised to one.
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Bucket a token lands in.
    pub fn bucket(&self, token: &str) -> usize {
        (fnv1a(token.as_bytes()) % self.dimension as u64) as usize
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut frequencies: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokenize(text) {
            *frequencies.entry(token).or_insert(0) += 1;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (token, count) in &frequencies {
            vector[self.bucket(token)] += *count as f32;
        }
        l2_normalize(&mut vector);
        vector
    }
}
