//! Vector similarity and ranking utilities.

use switchyard_core::index::{IndexEntry, ScoredChunk};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank entries by cosine similarity to `query`, best first.
///
/// Ties are broken by chunk id so identical inputs always give identical
/// output order.
pub fn rank<'a>(
    entries: impl IntoIterator<Item = &'a IndexEntry>,
    query: &[f32],
    limit: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<(f32, &IndexEntry)> = entries
        .into_iter()
        .map(|entry| (cosine_similarity(&entry.embedding, query), entry))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(similarity, entry)| ScoredChunk {
            chunk: entry.to_chunk(),
            similarity,
        })
        .collect()
}
