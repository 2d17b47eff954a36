//! Reciprocal Rank Fusion of vector and keyword results.
//!
//! RRF_score(chunk) = sum(weight_i / (k + rank_i(chunk)))
//! where k=60 is the standard constant and ranks start at 1.

use std::collections::HashMap;

use docqa_indexing::ScoredChunk;

/// Standard RRF constant (Cormack, Clarke and Buettcher, 2009)
pub const RRF_K: f32 = 60.0;

/// Fuse ranked lists, each with its weight, into one list of at most
/// `top_k` chunks ordered by fused score. A chunk's score in the output is
/// its fused score. Ties keep the order in which chunks were first seen.
pub fn fuse_rrf(lists: &[(&[ScoredChunk], f32)], top_k: usize) -> Vec<ScoredChunk> {
    let mut positions: HashMap<u64, usize> = HashMap::new();
    let mut entries: Vec<ScoredChunk> = Vec::new();

    for (list, weight) in lists {
        for (rank, hit) in list.iter().enumerate() {
            let score = weight / (RRF_K + rank as f32 + 1.0);
            match positions.get(&hit.chunk.chunk_id) {
                Some(&pos) => entries[pos].score += score,
                None => {
                    positions.insert(hit.chunk.chunk_id, entries.len());
                    entries.push(ScoredChunk {
                        chunk: hit.chunk.clone(),
                        score,
                    });
                }
            }
        }
    }

    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    entries.truncate(top_k);
    entries
}
