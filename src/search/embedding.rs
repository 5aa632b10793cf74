//! Embedding providers.
//!
//! The router only sees the [`EmbeddingProvider`] trait. The bundled
//! [`HarmonicEmbedder`] is a deterministic, model-free projection: every
//! content token is read as a base-2^16 integer, reduced modulo a set of
//! primes and each residue placed on the unit circle. Token vectors are mean
//! pooled and L2 normalized, so cosine similarity and inner product agree.
//!
//! HTP is lexical: two texts are close when they share words, not when they
//! mean the same thing. Its recommended threshold is lower than the one for a
//! sentence-transformer model, see [`EmbeddingProvider::recommended_threshold`].
//!
//! Reference: "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//! Deterministic, and Reversible Embedding Methodology",
//! https://arxiv.org/html/2511.20665

use std::collections::HashSet;
use std::f64::consts::TAU;

use lazy_static::lazy_static;

use super::error::{RetrievalError, RetrievalResult};
use super::router::DEFAULT_SIMILARITY_THRESHOLD;

/// Dimension of the bundled embedder (matches all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Only the leading code points of a token contribute.
const MAX_TOKEN_CHARS: usize = 64;

/// Radix a token is read in.
const TOKEN_BASE: u64 = 1 << 16;

/// Default threshold for [`HarmonicEmbedder`]. Questions sharing one or two
/// content words with an article score 0.38-0.7; unrelated questions stay
/// below 0.25.
pub const HTP_SIMILARITY_THRESHOLD: f32 = 0.35;

lazy_static! {
    // Function words carry no topic; left in, they dominate short questions.
    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "and", "any", "are", "as", "at", "be", "been", "by", "can", "could",
        "do", "does", "for", "from", "had", "has", "have", "his", "her", "how", "i",
        "if", "in", "into", "is", "it", "its", "me", "my", "no", "not", "of", "on",
        "or", "our", "shall", "should", "so", "such", "that", "the", "their", "them",
        "there", "these", "they", "this", "those", "to", "under", "upon", "was", "we",
        "were", "what", "when", "where", "which", "who", "whom", "why", "will", "with",
        "without", "would", "you", "your",
    ]
    .into_iter()
    .collect();
}

/// Converts text to a fixed-length dense vector.
///
/// Implementations must be deterministic for a given `embedder_id` and always
/// return vectors of length [`dim`](EmbeddingProvider::dim).
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier of the model/version, recorded next to stored vectors.
    fn embedder_id(&self) -> &str;

    fn dim(&self) -> usize;

    fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>>;

    /// Similarity threshold used when the settings do not name one.
    fn recommended_threshold(&self) -> f32 {
        DEFAULT_SIMILARITY_THRESHOLD
    }
}

impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for &T {
    fn embedder_id(&self) -> &str {
        (**self).embedder_id()
    }

    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        (**self).embed(text)
    }

    fn recommended_threshold(&self) -> f32 {
        (**self).recommended_threshold()
    }
}

/// Harmonic Token Projection embedder.
pub struct HarmonicEmbedder {
    id: String,
    moduli: Vec<u64>,
}

impl HarmonicEmbedder {
    /// Embedder producing `dim` values; `dim` must be even and non-zero.
    pub fn with_dim(dim: usize) -> RetrievalResult<Self> {
        if dim == 0 || dim % 2 != 0 {
            return Err(RetrievalError::Embedding {
                provider: "htp".to_string(),
                message: format!("dimension must be a positive even number, got {}", dim),
            });
        }

        Ok(Self {
            id: format!("htp-v2-d{}", dim),
            moduli: first_primes(dim / 2),
        })
    }

    pub fn new() -> Self {
        Self {
            id: format!("htp-v2-d{}", EMBEDDING_DIM),
            moduli: first_primes(EMBEDDING_DIM / 2),
        }
    }

    fn project_token(&self, token: &str, acc: &mut [f64]) {
        let digits: Vec<u64> = token
            .chars()
            .take(MAX_TOKEN_CHARS)
            .map(|c| c as u64)
            .collect();

        for (pair, &m) in acc.chunks_exact_mut(2).zip(&self.moduli) {
            // n mod m, one base-2^16 digit at a time
            let residue = digits.iter().fold(0u64, |r, &d| (r * TOKEN_BASE + d) % m);
            let theta = TAU * residue as f64 / m as f64;
            pair[0] += theta.sin();
            pair[1] += theta.cos();
        }
    }
}

impl Default for HarmonicEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HarmonicEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.moduli.len() * 2
    }

    fn recommended_threshold(&self) -> f32 {
        HTP_SIMILARITY_THRESHOLD
    }

    fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let mut acc = vec![0.0f64; self.dim()];
        let mut count = 0usize;

        for token in tokenize(text) {
            self.project_token(&token, &mut acc);
            count += 1;
        }

        if count > 0 {
            acc.iter_mut().for_each(|v| *v /= count as f64);
        }

        Ok(l2_normalize(acc))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .filter(|s| !STOP_WORDS.contains(s.as_str()))
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

fn l2_normalize(values: Vec<f64>) -> Vec<f32> {
    let norm = values.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        values.into_iter().map(|x| (x / norm) as f32).collect()
    } else {
        values.into_iter().map(|x| x as f32).collect()
    }
}

/// Mean of equally sized vectors, L2 normalized. `None` for an empty input or
/// ragged lengths.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = vectors.first()?.len();
    if vectors.iter().any(|v| v.len() != dim) {
        return None;
    }

    let mut acc = vec![0.0f64; dim];
    for v in vectors {
        for (a, x) in acc.iter_mut().zip(v) {
            *a += *x as f64;
        }
    }
    let n = vectors.len() as f64;
    acc.iter_mut().for_each(|a| *a /= n);

    Some(l2_normalize(acc))
}

/// Cosine similarity in [-1, 1]; 0 for zero vectors or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
