//! Embedding backend interface and similarity helpers.

use rpg_core::error::Result;

/// An embedding backend. Implementations may hold model state internally;
/// calls are synchronous and CPU- or I/O-bound depending on the backend.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cosine similarity between two vectors. Zero when either is empty or
/// zero-length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Jaccard similarity over two keyword sets.
pub fn keyword_jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let left: std::collections::HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: std::collections::HashSet<&str> = b.iter().map(String::as_str).collect();
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

/// Local embedding backend over fastembed.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| rpg_core::RpgError::Config(format!("embedding model init: {e}")))?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
        })
    }
}

#[cfg(feature = "local-embeddings")]
impl Embedder for LocalEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| rpg_core::RpgError::Store("embedder lock poisoned".to_string()))?;
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| rpg_core::RpgError::Llm(format!("embedding failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn jaccard_basics() {
        let a = vec!["parse".to_string(), "args".to_string()];
        let b = vec!["parse".to_string(), "args".to_string()];
        assert_eq!(keyword_jaccard(&a, &b), 1.0);

        let c = vec!["render".to_string(), "template".to_string()];
        assert_eq!(keyword_jaccard(&a, &c), 0.0);

        let d = vec!["parse".to_string(), "template".to_string()];
        assert!((keyword_jaccard(&a, &d) - 1.0 / 3.0).abs() < 1e-9);
    }
}
