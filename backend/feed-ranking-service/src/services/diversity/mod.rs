//! Diversity control
//!
//! Caps per-artist repetition and selects exploration candidates. Candidates
//! beyond an artist's cap are penalized with an escalating penalty instead of
//! dropped, so a short feed can still backfill. All ordering decisions use
//! the deterministic tie-break (earlier date first, then id ascending).

use crate::config::DiversityConfig;
use crate::models::{ScoredCandidate, UserSignals};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

pub struct DiversityController {
    config: DiversityConfig,
}

impl DiversityController {
    pub fn new(config: DiversityConfig) -> Self {
        Self { config }
    }

    /// Assign per-artist ranks and escalating penalties beyond the cap.
    ///
    /// Ranks are computed from pre-boost base scores, so a paid promotion
    /// cannot change which of an artist's events counts as the best
    /// representative.
    pub fn apply(&self, candidates: &mut [ScoredCandidate], max_per_artist: usize) {
        let cap = max_per_artist.max(1);

        // BTreeMap keeps group iteration deterministic.
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            groups
                .entry(candidate.event.artist_key())
                .or_default()
                .push(idx);
        }

        let mut penalized = 0usize;
        for (_, mut indices) in groups {
            indices.sort_by(|&a, &b| base_rank_cmp(&candidates[a], &candidates[b]));

            for (pos, &idx) in indices.iter().enumerate() {
                let rank = (pos + 1) as u32;
                candidates[idx].artist_rank = rank;
                if rank as usize > cap {
                    candidates[idx].diversity_penalty =
                        self.config.penalty_step * (rank as usize - cap) as f64;
                    penalized += 1;
                }
            }
        }

        if penalized > 0 {
            debug!(
                penalized,
                max_per_artist = cap,
                "Applied diversity penalties"
            );
        }
    }

    /// Mark exploration candidates: events whose primary genre the user has
    /// barely any affinity for, but which carry nonzero popularity.
    ///
    /// This is a second, independent pass that rewards novelty instead of
    /// affinity; it is skipped for cold-start users, where everything is
    /// novel already.
    pub fn mark_exploration(&self, candidates: &mut [ScoredCandidate], signals: &UserSignals) {
        if signals.is_cold_start() {
            return;
        }

        let max_weight = signals.genre_profile.max_weight();
        if max_weight <= 0.0 {
            return;
        }

        let mut marked = 0usize;
        for candidate in candidates.iter_mut() {
            let Some(primary) = candidate.event.primary_genre() else {
                continue;
            };
            let relative_affinity =
                signals.genre_profile.affinity(&primary.trim().to_lowercase()) / max_weight;

            if relative_affinity < self.config.exploration_threshold
                && candidate.event.interested_count > 0
            {
                candidate.is_exploration = true;
                marked += 1;
            }
        }

        if marked > 0 {
            debug!(marked, "Marked exploration candidates");
        }
    }

    /// Every n-th slot of the assembled feed is reserved for exploration.
    /// Zero disables interleaving.
    pub fn explore_interval(&self) -> usize {
        if self.config.exploration_fraction <= 0.0 {
            return 0;
        }
        ((1.0 / self.config.exploration_fraction).round() as usize).max(2)
    }
}

/// Ordering within an artist group: best base score first, ties broken by
/// earlier event date, then id ascending.
pub fn base_rank_cmp(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.base_score
        .partial_cmp(&a.base_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.event.event_date.cmp(&b.event.event_date))
        .then_with(|| a.event.id.cmp(&b.event.id))
}

/// Final feed ordering: highest final score first, same tie-break.
pub fn final_rank_cmp(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.final_score()
        .partial_cmp(&a.final_score())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.event.event_date.cmp(&b.event.event_date))
        .then_with(|| a.event.id.cmp(&b.event.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventCandidate, UserGenreProfile};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn scored(artist: &str, base: f64, days_out: i64, interested: u32) -> ScoredCandidate {
        ScoredCandidate::new(
            EventCandidate {
                id: Uuid::new_v4(),
                artist_name: artist.to_string(),
                venue_name: "Venue".to_string(),
                venue_city: None,
                event_date: Utc::now() + Duration::days(days_out),
                genres: vec!["rock".to_string()],
                interested_count: interested,
                ticket_available: false,
            },
            base,
        )
    }

    #[test]
    fn test_penalties_escalate_beyond_cap() {
        let controller = DiversityController::new(DiversityConfig::default());
        let mut candidates = vec![
            scored("ArtistA", 90.0, 10, 0),
            scored("ArtistA", 80.0, 11, 0),
            scored("ArtistA", 70.0, 12, 0),
            scored("ArtistB", 60.0, 13, 0),
        ];

        controller.apply(&mut candidates, 1);

        assert_eq!(candidates[0].artist_rank, 1);
        assert_eq!(candidates[0].diversity_penalty, 0.0);
        assert_eq!(candidates[1].artist_rank, 2);
        assert_eq!(candidates[1].diversity_penalty, 15.0);
        assert_eq!(candidates[2].artist_rank, 3);
        assert_eq!(candidates[2].diversity_penalty, 30.0);
        // Other artists untouched.
        assert_eq!(candidates[3].artist_rank, 1);
        assert_eq!(candidates[3].diversity_penalty, 0.0);
    }

    #[test]
    fn test_rank_tie_break_prefers_earlier_date_then_id() {
        let controller = DiversityController::new(DiversityConfig::default());
        let mut later = scored("ArtistA", 50.0, 20, 0);
        let mut earlier = scored("ArtistA", 50.0, 5, 0);
        // Deterministic ids so the test cannot flake on generation order.
        earlier.event.id = Uuid::from_u128(1);
        later.event.id = Uuid::from_u128(2);

        let mut candidates = vec![later, earlier];
        controller.apply(&mut candidates, 1);

        // The earlier event wins rank 1 despite identical base scores.
        assert_eq!(candidates[1].artist_rank, 1);
        assert_eq!(candidates[0].artist_rank, 2);
    }

    #[test]
    fn test_exploration_marks_low_affinity_popular_events() {
        let controller = DiversityController::new(DiversityConfig::default());
        let mut signals = UserSignals {
            genre_profile: UserGenreProfile {
                user_id: Uuid::new_v4(),
                weights: [("rock".to_string(), 0.8)].into_iter().collect(),
                updated_at: None,
            },
            ..Default::default()
        };
        signals.genre_profile.weights.insert("jazz".to_string(), 0.02);

        let mut candidates = vec![scored("ArtistA", 50.0, 10, 5), scored("ArtistB", 20.0, 10, 5)];
        candidates[1].event.genres = vec!["jazz".to_string()];

        controller.mark_exploration(&mut candidates, &signals);

        assert!(!candidates[0].is_exploration); // rock: full affinity
        assert!(candidates[1].is_exploration); // jazz: 0.025 relative < 0.1
    }

    #[test]
    fn test_exploration_skipped_for_cold_start() {
        let controller = DiversityController::new(DiversityConfig::default());
        let mut candidates = vec![scored("ArtistA", 50.0, 10, 5)];

        controller.mark_exploration(&mut candidates, &UserSignals::default());

        assert!(!candidates[0].is_exploration);
    }

    #[test]
    fn test_explore_interval() {
        let controller = DiversityController::new(DiversityConfig::default());
        assert_eq!(controller.explore_interval(), 5); // fraction 0.2

        let disabled = DiversityController::new(DiversityConfig {
            exploration_fraction: 0.0,
            ..Default::default()
        });
        assert_eq!(disabled.explore_interval(), 0);
    }
}
