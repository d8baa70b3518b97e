//! Offline embedding by feature hashing.

use std::collections::HashMap;

use async_trait::async_trait;

use super::Embedder;
use crate::error::LlmError;

/// Deterministic term-frequency vectors hashed into fixed buckets.
///
/// Much weaker than a neural embedding, but needs no network. Used in tests
/// and when `EMBEDDING_MODEL=hashing`.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// FNV-1a.
    fn bucket(&self, term: &str) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % self.dimensions
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut counts: HashMap<String, f32> = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-' && c != '.')
            .filter(|t| t.len() >= 2)
        {
            *counts.entry(term.to_lowercase()).or_default() += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        for (term, count) in &counts {
            vec[self.bucket(term)] += count;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_gives_same_vector() {
        let e = HashingEmbedder::new(64);
        let v = e
            .embed(&["kube pods".to_string(), "kube pods".to_string()])
            .await
            .unwrap();
        assert_eq!(v[0], v[1]);
        assert_eq!(v[0].len(), 64);
    }

    #[tokio::test]
    async fn empty_text_gives_zero_vector() {
        let v = HashingEmbedder::default().embed(&[String::new()]).await.unwrap();
        assert!(v[0].iter().all(|&x| x == 0.0));
    }
}
