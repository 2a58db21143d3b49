use crate::traits::SimilarityModel;
use crate::types::Result;
use crate::utils::text;
use async_trait::async_trait;
use std::collections::HashMap;

/// Cosine similarity over term-frequency vectors of title tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenCosine;

impl TokenCosine {
    pub fn score(a: &str, b: &str) -> f64 {
        let left = term_frequencies(a);
        let right = term_frequencies(b);
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let dot: f64 = left
            .iter()
            .filter_map(|(term, count)| right.get(term).map(|other| count * other))
            .sum();
        let norm = |v: &HashMap<String, f64>| v.values().map(|c| c * c).sum::<f64>().sqrt();

        (dot / (norm(&left) * norm(&right))).clamp(0.0, 1.0)
    }
}

fn term_frequencies(input: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for token in text::tokenize(input) {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

#[async_trait]
impl SimilarityModel for TokenCosine {
    async fn similarity(&self, a: &str, b: &str) -> Result<f64> {
        Ok(Self::score(a, b))
    }
}
