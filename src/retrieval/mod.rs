//! Per-session retrieval of previously fetched API text.
//!
//! An index is built once from a single response text and never mutated;
//! a new fetch builds a new index which replaces the old one.

mod embedding;

pub use embedding::HashingEmbedder;

use async_trait::async_trait;

use crate::error::LlmError;

/// Maximum characters per chunk. Chunks do not overlap.
pub const CHUNK_SIZE: usize = 500;

/// Most texts sent to the embedder in one call.
pub const EMBED_BATCH_SIZE: usize = 512;

/// Turns texts into vectors. Implementations must return one vector per
/// input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// Split `text` into consecutive chunks of at most `size` characters.
pub fn split_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|c| c.iter().collect::<String>())
        .filter(|c| !c.trim().is_empty())
        .collect()
}

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    embedding: Vec<f32>,
}

/// Vector index over the chunks of one API response.
#[derive(Debug, Clone, Default)]
pub struct RetrievalIndex {
    chunks: Vec<IndexedChunk>,
}

impl RetrievalIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Chunk and embed `text` into a fresh index, at most
    /// [`EMBED_BATCH_SIZE`] chunks per embedder call.
    pub async fn build(text: &str, embedder: &dyn Embedder) -> Result<Self, LlmError> {
        let texts = split_text(text, CHUNK_SIZE);
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(embedder.embed(batch).await?);
        }
        if embeddings.len() != texts.len() {
            return Err(LlmError::Parse(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }

        let chunks = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| IndexedChunk { text, embedding })
            .collect();
        Ok(Self { chunks })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.text.as_str())
    }

    /// The chunk closest to `query`, or `None` for an empty index.
    pub fn nearest(&self, query: &[f32]) -> Option<&str> {
        self.chunks
            .iter()
            .map(|c| (cosine_similarity(query, &c.embedding), c))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, c)| c.text.as_str())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn splits_without_overlap() {
        let text = "a".repeat(1200);
        let chunks = split_text(&text, CHUNK_SIZE);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[2].len(), 200);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn splits_on_char_boundaries() {
        let chunks = split_text("éééé", 3);
        assert_eq!(chunks, vec!["ééé".to_string(), "é".to_string()]);
    }

    #[test]
    fn blank_text_yields_no_chunks() {
        assert!(split_text("   ", CHUNK_SIZE).is_empty());
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn nearest_returns_most_similar_chunk() {
        let embedder = HashingEmbedder::default();
        let mut text = "pods running in namespace team-a: web-0 web-1".to_string();
        text.push_str(&" ".repeat(CHUNK_SIZE - text.chars().count()));
        text.push_str("alarm 100.101 platform cpu threshold exceeded on controller-0");

        let index = RetrievalIndex::build(&text, &embedder).await.unwrap();
        assert_eq!(index.len(), 2);

        let query = embedder.embed(&["which alarm is raised on controller-0".to_string()]).await.unwrap();
        let hit = index.nearest(&query[0]).unwrap();
        assert!(hit.contains("alarm 100.101"));
    }

    /// Rejects calls above `cap` inputs, like a remote embeddings API.
    struct CappedEmbedder {
        cap: usize,
        calls: AtomicUsize,
        largest: AtomicUsize,
        inner: HashingEmbedder,
    }

    #[async_trait]
    impl Embedder for CappedEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.largest.fetch_max(texts.len(), Ordering::SeqCst);
            if texts.len() > self.cap {
                return Err(LlmError::Api {
                    status: 400,
                    body: "too many inputs".to_string(),
                });
            }
            self.inner.embed(texts).await
        }
    }

    #[tokio::test]
    async fn large_texts_are_embedded_in_batches() {
        let embedder = CappedEmbedder {
            cap: EMBED_BATCH_SIZE,
            calls: AtomicUsize::new(0),
            largest: AtomicUsize::new(0),
            inner: HashingEmbedder::default(),
        };
        let text = "pod web-0 Running ".repeat(CHUNK_SIZE * 70);
        let expected = split_text(&text, CHUNK_SIZE).len();
        assert!(expected > 2 * EMBED_BATCH_SIZE);

        let index = RetrievalIndex::build(&text, &embedder).await.unwrap();

        assert_eq!(index.len(), expected);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), expected.div_ceil(EMBED_BATCH_SIZE));
        assert!(embedder.largest.load(Ordering::SeqCst) <= EMBED_BATCH_SIZE);
    }

    #[test]
    fn blank_context_builds_empty_index() {
        let index = tokio_test::block_on(RetrievalIndex::build("  \n ", &HashingEmbedder::default()))
            .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn empty_index_has_no_nearest() {
        assert!(RetrievalIndex::empty().nearest(&[1.0]).is_none());
    }
}
