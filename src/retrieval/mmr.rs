//! Maximal Marginal Relevance re-ranking

use crate::index::ScoredSlice;

/// Cosine similarity of two dense vectors
///
/// Zero-length, mismatched or zero-norm inputs give 0.0 instead of NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let similarity = dot / (mag_a * mag_b);
    if similarity.is_nan() {
        0.0
    } else {
        similarity
    }
}

/// Reorder `candidates` by marginal relevance
///
/// `candidates` must arrive sorted by descending similarity: the first one is
/// always kept first. Each following pick maximises
/// `relevance_factor * score - (1 - relevance_factor) * max_sim_to_selected`,
/// ties going to the earliest remaining candidate. The output is a
/// permutation of the input. `relevance_factor` is not clamped.
pub fn rerank(candidates: Vec<ScoredSlice>, relevance_factor: f32) -> Vec<ScoredSlice> {
    if candidates.len() <= 1 {
        return candidates;
    }

    tracing::debug!("sort_slices_using_mmr=start candidates={}", candidates.len());

    let n = candidates.len();
    let diversity_factor = 1.0 - relevance_factor;

    // Highest similarity of each candidate to anything selected so far
    let mut max_sim: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(&c.vector, &candidates[0].vector))
        .collect();

    let mut selected = Vec::with_capacity(n);
    selected.push(0);
    let mut remaining: Vec<usize> = (1..n).collect();

    while !remaining.is_empty() {
        let marginal =
            |i: usize| relevance_factor * candidates[i].score - diversity_factor * max_sim[i];

        let mut best_pos = 0;
        let mut best_value = marginal(remaining[0]);
        for (pos, &i) in remaining.iter().enumerate().skip(1) {
            let value = marginal(i);
            if value > best_value {
                best_pos = pos;
                best_value = value;
            }
        }

        let picked = remaining.remove(best_pos);
        selected.push(picked);

        for &i in &remaining {
            let sim = cosine_similarity(&candidates[i].vector, &candidates[picked].vector);
            if sim > max_sim[i] {
                max_sim[i] = sim;
            }
        }
    }

    let mut slots: Vec<Option<ScoredSlice>> = candidates.into_iter().map(Some).collect();
    let reranked: Vec<ScoredSlice> = selected
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    tracing::debug!("sort_slices_using_mmr=end");
    reranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{PointId, SlicePayload};

    fn slice(id: u64, score: f32, vector: Vec<f32>) -> ScoredSlice {
        ScoredSlice {
            id: PointId::Num(id),
            score,
            vector,
            payload: Some(SlicePayload::default()),
        }
    }

    fn ids(slices: &[ScoredSlice]) -> Vec<PointId> {
        slices.iter().map(|s| s.id.clone()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(rerank(Vec::new(), 0.5).is_empty());

        let single = vec![slice(7, 0.3, vec![0.2, 0.4])];
        assert_eq!(rerank(single.clone(), 0.5), single);
    }

    #[test]
    fn test_diversity_promotes_dissimilar_slice() {
        let candidates = vec![
            slice(1, 0.9, vec![1.0, 0.0, 0.0]),
            slice(2, 0.8, vec![0.95, 0.312, 0.0]),
            slice(3, 0.7, vec![0.1, 0.0, 0.995]),
        ];

        let reranked = rerank(candidates, 0.5);
        assert_eq!(
            ids(&reranked),
            vec![PointId::Num(1), PointId::Num(3), PointId::Num(2)]
        );
    }

    #[test]
    fn test_pure_relevance_keeps_score_order() {
        let candidates = vec![
            slice(1, 0.9, vec![1.0, 0.0]),
            slice(2, 0.8, vec![1.0, 0.0]),
            slice(3, 0.7, vec![0.0, 1.0]),
            slice(4, 0.6, vec![1.0, 0.01]),
        ];

        let reranked = rerank(candidates.clone(), 1.0);
        assert_eq!(reranked, candidates);
    }

    #[test]
    fn test_first_candidate_always_first() {
        let candidates = vec![
            slice(1, 0.2, vec![1.0, 0.0]),
            slice(2, 0.9, vec![0.0, 1.0]),
        ];

        let reranked = rerank(candidates, 1.0);
        assert_eq!(reranked[0].id, PointId::Num(1));
    }

    #[test]
    fn test_ties_go_to_earliest() {
        let candidates = vec![
            slice(1, 0.9, vec![1.0, 0.0]),
            slice(2, 0.5, vec![0.0, 1.0]),
            slice(3, 0.5, vec![0.0, 1.0]),
        ];

        let reranked = rerank(candidates, 0.5);
        assert_eq!(
            ids(&reranked),
            vec![PointId::Num(1), PointId::Num(2), PointId::Num(3)]
        );
    }

    #[test]
    fn test_output_is_permutation_for_any_factor() {
        let candidates: Vec<ScoredSlice> = (0..12u64)
            .map(|i| {
                let angle = i as f32 * 0.7;
                slice(i, 1.0 - i as f32 * 0.05, vec![angle.cos(), angle.sin(), 0.3])
            })
            .collect();

        for factor in [-1.0, 0.0, 0.3, 0.5, 1.0, 2.5] {
            let reranked = rerank(candidates.clone(), factor);
            assert_eq!(reranked.len(), candidates.len());

            let mut got: Vec<String> = reranked.iter().map(|s| s.id.to_string()).collect();
            let mut want: Vec<String> = candidates.iter().map(|s| s.id.to_string()).collect();
            got.sort();
            want.sort();
            assert_eq!(got, want, "factor {}", factor);
            assert_eq!(reranked[0].id, candidates[0].id);
        }
    }

    #[test]
    fn test_zero_vectors_do_not_panic() {
        let candidates = vec![
            slice(1, 0.9, vec![0.0, 0.0]),
            slice(2, 0.8, vec![0.0, 0.0]),
            slice(3, 0.7, vec![]),
        ];

        let reranked = rerank(candidates, 0.3);
        assert_eq!(
            ids(&reranked),
            vec![PointId::Num(1), PointId::Num(2), PointId::Num(3)]
        );
    }
}
