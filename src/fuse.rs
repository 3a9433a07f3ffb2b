use std::collections::HashMap;

use crate::types::{FusedResult, Provenance, RankedHit};

/// Reciprocal Rank Fusion.
///
/// Folds two independently-ranked candidate lists into one by adding
/// `1 / (K + rank)` per list, where `rank` is 1-based. Only ranks are
/// consumed: the two rankers' raw score scales (cosine similarity vs.
/// unbounded BM25 relevance) are incomparable by construction, so no score
/// normalization is attempted. Documents that appear in both lists at
/// modest ranks beat documents that top only one list.
#[derive(Debug, Clone)]
pub struct RrfFuser {
    k: f32,
}

impl RrfFuser {
    pub const DEFAULT_K: f32 = 60.0;

    pub fn new(k: f32) -> Self {
        Self { k }
    }

    /// Merge the dense and sparse candidate lists into at most `limit`
    /// results sorted by non-increasing fused score.
    ///
    /// Ties are stable: ids with equal fused score keep the order in which
    /// they were first encountered, with the dense list folded before the
    /// sparse list.
    pub fn merge(
        &self,
        dense: &[RankedHit],
        sparse: &[RankedHit],
        limit: usize,
    ) -> Vec<FusedResult> {
        // `fused` stays in first-seen order until the final stable sort;
        // the map only locates entries by id.
        let mut fused: Vec<FusedResult> = Vec::new();
        let mut by_id: HashMap<&str, usize> = HashMap::new();

        for (position, hit) in dense.iter().enumerate() {
            let rank = position + 1;
            let slot = self.entry(&mut fused, &mut by_id, hit);
            if slot.provenance.dense_rank.is_none() {
                slot.provenance.dense_rank = Some(rank);
                slot.fused_score += 1.0 / (self.k + rank as f32);
            }
        }

        for (position, hit) in sparse.iter().enumerate() {
            let rank = position + 1;
            let slot = self.entry(&mut fused, &mut by_id, hit);
            if slot.provenance.sparse_rank.is_none() {
                slot.provenance.sparse_rank = Some(rank);
                slot.fused_score += 1.0 / (self.k + rank as f32);
            }
        }

        // Vec::sort_by is stable, so equal scores preserve first-seen order.
        fused.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        fused.truncate(limit);
        fused
    }

    fn entry<'f, 'h>(
        &self,
        fused: &'f mut Vec<FusedResult>,
        by_id: &mut HashMap<&'h str, usize>,
        hit: &'h RankedHit,
    ) -> &'f mut FusedResult {
        let index = match by_id.get(hit.id.as_str()) {
            Some(index) => *index,
            None => {
                fused.push(FusedResult {
                    id: hit.id.clone(),
                    fused_score: 0.0,
                    provenance: Provenance::default(),
                });
                by_id.insert(hit.id.as_str(), fused.len() - 1);
                fused.len() - 1
            }
        };
        &mut fused[index]
    }
}

impl Default for RrfFuser {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K)
    }
}
