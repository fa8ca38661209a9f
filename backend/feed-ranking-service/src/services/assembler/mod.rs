//! Feed assembly
//!
//! Produces the final ordered, paginated feed from scored candidates. The
//! full ordering is computed once per request and pages are plain slices of
//! it, which is what makes pagination consistent: concatenating pages at
//! offsets 0, limit, 2*limit, ... reproduces the whole sequence with no
//! duplicates or gaps.

use super::diversity::final_rank_cmp;
use crate::models::{FeedItem, ScoredCandidate};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub limit: usize,
    pub offset: usize,
    pub max_per_artist: usize,
    pub include_past: bool,
    /// Every n-th slot is reserved for an exploration candidate; 0 disables
    /// interleaving.
    pub explore_interval: usize,
    pub now: DateTime<Utc>,
}

pub struct FeedAssembler;

impl Default for FeedAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble one page. An offset past the end of the result set yields an
    /// empty page, not an error.
    pub fn assemble(
        &self,
        candidates: Vec<ScoredCandidate>,
        options: &AssembleOptions,
    ) -> Vec<FeedItem> {
        let ordered = self.order(candidates, options);

        ordered
            .iter()
            .skip(options.offset)
            .take(options.limit)
            .map(FeedItem::from)
            .collect()
    }

    /// Full deterministic ordering of the candidate set.
    ///
    /// 1. Past events are dropped unless requested.
    /// 2. Candidates sort by final score with the deterministic tie-break.
    /// 3. Exploration candidates are interleaved at reserved slots rather
    ///    than appended at the end.
    /// 4. The per-artist cap is enforced positionally: over-cap candidates
    ///    are deferred to a backfill tail (layered by artist rank, then
    ///    penalized score) instead of dropped, so sparse candidate sets can
    ///    still fill a page.
    fn order(
        &self,
        mut candidates: Vec<ScoredCandidate>,
        options: &AssembleOptions,
    ) -> Vec<ScoredCandidate> {
        if !options.include_past {
            candidates.retain(|c| !c.event.is_past(options.now));
        }

        candidates.sort_by(final_rank_cmp);

        let cap = options.max_per_artist.max(1);
        let (explore, regular): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|c| c.is_exploration);
        let mut explore: VecDeque<ScoredCandidate> = explore.into();
        let mut regular: VecDeque<ScoredCandidate> = regular.into();

        let mut artist_counts: HashMap<String, usize> = HashMap::new();
        let mut ordered: Vec<ScoredCandidate> = Vec::new();
        let mut backfill: Vec<ScoredCandidate> = Vec::new();
        let mut position = 1usize;

        while !regular.is_empty() || !explore.is_empty() {
            let take_exploration = options.explore_interval > 0
                && position % options.explore_interval == 0
                && !explore.is_empty();

            let candidate = if take_exploration {
                explore.pop_front()
            } else if !regular.is_empty() {
                regular.pop_front()
            } else {
                explore.pop_front()
            };
            let Some(candidate) = candidate else { break };

            let count = artist_counts
                .entry(candidate.event.artist_key())
                .or_insert(0);
            if *count >= cap {
                backfill.push(candidate);
            } else {
                *count += 1;
                ordered.push(candidate);
                position += 1;
            }
        }

        // Backfill tail: rank layers first so a window of the tail stays as
        // artist-diverse as the candidate set allows.
        backfill.sort_by(|a, b| {
            a.artist_rank
                .cmp(&b.artist_rank)
                .then_with(|| final_rank_cmp(a, b))
        });
        ordered.extend(backfill);

        ordered
    }
}
