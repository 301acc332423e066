//! Relevance filter: threshold, then rank.

use second_core::knowledge::RetrievalResult;

/// A retrieval result tagged with the merge rank of the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub priority: u8,
    pub result: RetrievalResult,
}

/// Whether a score clears the threshold. The boundary is inclusive; NaN
/// never passes.
pub fn passes(score: f32, threshold: f32) -> bool {
    score >= threshold
}

/// Drop candidates scoring below `threshold` and order the rest by source
/// priority (lower first), then by score (higher first).
///
/// The sort is stable, so candidates equal on both keys keep the order the
/// source returned them in.
pub fn filter_and_rank(candidates: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| passes(c.result.score, threshold))
        .collect();

    kept.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.result.score.total_cmp(&a.result.score))
    });
    kept
}
