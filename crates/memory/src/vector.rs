//! Vector similarity and ranking.
//!
//! Both search paths (indexed and brute-force) rank through
//! [`rank_candidates`], so they order identical data identically:
//! descending cosine similarity, ties broken by the larger record id.

use recall_core::memory::RecordId;
use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty, or if lengths differ.
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

/// Order two scored ids: higher score first, then larger id first.
pub fn compare_scored(a: &(RecordId, f32), b: &(RecordId, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0))
}

/// Rank `(id, vector)` candidates against `query` and keep the top `k`.
///
/// Candidates whose length differs from the query are ignored; callers
/// filter (and log) dimension mismatches before getting here.
pub fn rank_candidates<'a, I>(candidates: I, query: &[f32], k: usize) -> Vec<(RecordId, f32)>
where
    I: IntoIterator<Item = (RecordId, &'a [f32])>,
{
    if k == 0 || query.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(RecordId, f32)> = candidates
        .into_iter()
        .filter(|(_, v)| v.len() == query.len())
        .map(|(id, v)| (id, cosine_similarity(v, query)))
        .collect();

    scored.sort_by(compare_scored);
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_empty_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn rank_orders_by_similarity() {
        let a = vec![0.0, 1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.5, 0.5, 0.0];
        let candidates = vec![(1, a.as_slice()), (2, b.as_slice()), (3, c.as_slice())];

        let ranked = rank_candidates(candidates, &[1.0, 0.0, 0.0], 10);
        let ids: Vec<_> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn rank_ties_prefer_larger_id() {
        let v = vec![1.0, 0.0];
        let candidates = vec![(4, v.as_slice()), (9, v.as_slice()), (6, v.as_slice())];

        let ranked = rank_candidates(candidates, &[1.0, 0.0], 10);
        let ids: Vec<_> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![9, 6, 4]);
    }

    #[test]
    fn rank_respects_k_and_skips_other_dimensions() {
        let short = vec![1.0];
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| vec![1.0, i as f32 * 0.1]).collect();
        let mut candidates: Vec<(RecordId, &[f32])> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i as RecordId + 1, v.as_slice()))
            .collect();
        candidates.push((99, short.as_slice()));

        let ranked = rank_candidates(candidates, &[1.0, 0.0], 3);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|(id, _)| *id != 99));
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn rank_zero_k_is_empty() {
        let v = vec![1.0];
        assert!(rank_candidates(vec![(1, v.as_slice())], &[1.0], 0).is_empty());
    }
}
