//! Base relevance scoring
//!
//! Converts each candidate plus the user's signal snapshot into a base score
//! in [0, 100]. Deterministic for identical inputs: the clock is an explicit
//! argument and no randomness is involved, which stable pagination depends
//! on.
//!
//! Score = genre_affinity * Wg + damped_familiarity * Wf
//!       + behavior_alignment * Wb + popularity_recency_prior * Wp
//!
//! Cold-start users (no signals at all) fall back to the prior alone,
//! rescaled to the full range, so the feed degrades to a popularity/recency
//! ordering instead of an empty or arbitrary one.

use crate::config::ScoringConfig;
use crate::models::{EventCandidate, ScoredCandidate, UserSignals};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Cap for the social-proof component of the prior; interest counts beyond
/// this saturate.
const SOCIAL_PROOF_CEILING: f64 = 100.0;

pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a batch of candidates for one user.
    pub fn score_candidates(
        &self,
        candidates: Vec<EventCandidate>,
        signals: &UserSignals,
        now: DateTime<Utc>,
    ) -> Vec<ScoredCandidate> {
        let cold_start = signals.is_cold_start();
        if cold_start {
            debug!("No user signals found, scoring with popularity/recency prior only");
        }

        candidates
            .into_iter()
            .map(|event| {
                let base = self.score(&event, signals, now);
                ScoredCandidate::new(event, base)
            })
            .collect()
    }

    /// Base relevance score for one candidate, in [0, 100].
    pub fn score(&self, event: &EventCandidate, signals: &UserSignals, now: DateTime<Utc>) -> f64 {
        let prior = popularity_recency_prior(event, now);

        if signals.is_cold_start() {
            return (prior * 100.0).clamp(0.0, 100.0);
        }

        let genre = self.genre_term(event, signals);
        let familiarity = self.familiarity_term(event, signals);
        let behavior = self.behavior_term(event, signals);

        let score = genre * self.config.genre_weight
            + familiarity * self.config.familiarity_weight
            + behavior * self.config.behavior_weight
            + prior * self.config.prior_weight;

        score.clamp(0.0, 100.0)
    }

    /// Mean affinity over the candidate's genre tags, normalized against the
    /// profile's strongest genre. In [0, 1].
    fn genre_term(&self, event: &EventCandidate, signals: &UserSignals) -> f64 {
        let profile = &signals.genre_profile;
        let max_weight = profile.max_weight();
        if event.genres.is_empty() || max_weight <= 0.0 {
            return 0.0;
        }

        let sum: f64 = event
            .genres
            .iter()
            .map(|g| profile.affinity(&g.trim().to_lowercase()))
            .sum();
        let mean = sum / event.genres.len() as f64;

        (mean / max_weight).clamp(0.0, 1.0)
    }

    /// Familiarity through the novelty damping curve, normalized so full
    /// familiarity maps to 1.0. In [0, 1].
    ///
    /// The raw curve is `f / (1 + d*f)`: monotonic but concave, so marginal
    /// familiarity contributes less as it approaches 1 and a single favorite
    /// artist cannot run away with the feed.
    fn familiarity_term(&self, event: &EventCandidate, signals: &UserSignals) -> f64 {
        let f = signals.familiarity.score_for(&event.artist_key());
        if f <= 0.0 {
            return 0.0;
        }

        let d = self.config.novelty_damping.max(0.0);
        // damp(f) / damp(1.0) keeps the term in [0, 1] for any damping factor.
        ((f / (1.0 + d * f)) * (1.0 + d)).clamp(0.0, 1.0)
    }

    /// Overlap between the candidate's genres and recent listening behavior,
    /// normalized against the strongest behavior signal. In [0, 1].
    fn behavior_term(&self, event: &EventCandidate, signals: &UserSignals) -> f64 {
        let behavior = &signals.behavior;
        let max_strength = behavior.max_strength();
        if event.genres.is_empty() || max_strength <= 0.0 {
            return 0.0;
        }

        let sum: f64 = event
            .genres
            .iter()
            .map(|g| behavior.strength(&g.trim().to_lowercase()))
            .sum();
        let mean = sum / event.genres.len() as f64;

        (mean / max_strength).clamp(0.0, 1.0)
    }
}

/// Genre-agnostic popularity/recency prior in [0, 1].
///
/// Blends date proximity (near-term events score higher), log-scaled
/// interest counts (so viral events cannot dominate) and a small ticket
/// availability bump.
pub fn popularity_recency_prior(event: &EventCandidate, now: DateTime<Utc>) -> f64 {
    let days_until = (event.event_date - now).num_days();

    let recency = if event.is_past(now) {
        0.1
    } else if days_until <= 14 {
        1.0
    } else if days_until <= 30 {
        0.6
    } else if days_until <= 60 {
        0.35
    } else if days_until <= 180 {
        0.2
    } else {
        0.05
    };

    let social = ((1.0 + event.interested_count as f64).ln()
        / (1.0 + SOCIAL_PROOF_CEILING).ln())
    .clamp(0.0, 1.0);

    let ticket = if event.ticket_available { 0.05 } else { 0.0 };

    (0.55 * recency + 0.4 * social + ticket).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtistFamiliarity, SongBehaviorSignal, UserGenreProfile};
    use chrono::Duration;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn event(artist: &str, genres: &[&str], days_out: i64, interested: u32) -> EventCandidate {
        EventCandidate {
            id: Uuid::new_v4(),
            artist_name: artist.to_string(),
            venue_name: "Venue".to_string(),
            venue_city: None,
            event_date: Utc::now() + Duration::days(days_out),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            interested_count: interested,
            ticket_available: false,
        }
    }

    fn signals(genres: &[(&str, f64)], artists: &[(&str, f64)]) -> UserSignals {
        let user_id = Uuid::new_v4();
        UserSignals {
            genre_profile: UserGenreProfile {
                user_id,
                weights: genres
                    .iter()
                    .map(|(g, w)| (g.to_string(), *w))
                    .collect::<HashMap<_, _>>(),
                updated_at: None,
            },
            familiarity: ArtistFamiliarity {
                user_id,
                scores: artists
                    .iter()
                    .map(|(a, s)| (a.to_string(), *s))
                    .collect::<HashMap<_, _>>(),
            },
            behavior: SongBehaviorSignal::default(),
        }
    }

    #[test]
    fn test_score_is_deterministic() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let signals = signals(&[("rock", 0.8)], &[("artista", 0.9)]);
        let e = event("ArtistA", &["rock"], 7, 10);
        let now = Utc::now();

        assert_eq!(engine.score(&e, &signals, now), engine.score(&e, &signals, now));
    }

    #[test]
    fn test_score_bounds() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let signals = signals(&[("rock", 5.0), ("jazz", 0.1)], &[("artista", 1.0)]);
        let now = Utc::now();

        for e in [
            event("ArtistA", &["rock"], 1, 100_000),
            event("Unknown", &[], 500, 0),
            event("ArtistA", &["polka"], -10, 0),
        ] {
            let score = engine.score(&e, &signals, now);
            assert!((0.0..=100.0).contains(&score), "score {} out of range", score);
        }
    }

    #[test]
    fn test_preferred_genre_outranks_unknown_genre() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let signals = signals(&[("rock", 0.8), ("jazz", 0.2)], &[]);
        let now = Utc::now();

        let rock = engine.score(&event("A", &["rock"], 7, 0), &signals, now);
        let jazz = engine.score(&event("B", &["jazz"], 7, 0), &signals, now);
        let polka = engine.score(&event("C", &["polka"], 7, 0), &signals, now);

        assert!(rock > jazz);
        assert!(jazz > polka);
    }

    #[test]
    fn test_novelty_damping_has_diminishing_returns() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let now = Utc::now();
        let e = |artist: &str| event(artist, &["rock"], 7, 0);

        let low = engine.score(&e("a"), &signals(&[("rock", 1.0)], &[("a", 0.3)]), now);
        let mid = engine.score(&e("a"), &signals(&[("rock", 1.0)], &[("a", 0.6)]), now);
        let high = engine.score(&e("a"), &signals(&[("rock", 1.0)], &[("a", 0.9)]), now);

        // Monotonic but concave: the second increment buys less than the first.
        assert!(mid > low && high > mid);
        assert!((mid - low) > (high - mid));
    }

    #[test]
    fn test_cold_start_uses_prior_full_range() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let empty = UserSignals::default();
        let now = Utc::now();

        let soon_popular = engine.score(&event("A", &["rock"], 3, 80), &empty, now);
        let far_unknown = engine.score(&event("B", &["rock"], 300, 0), &empty, now);

        assert!(soon_popular > far_unknown);
        // Prior-only scores use the full range, not just the prior weight.
        assert!(soon_popular > 50.0);
    }

    #[test]
    fn test_behavior_alignment_raises_score() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let now = Utc::now();
        let mut with_behavior = signals(&[("rock", 0.5)], &[]);
        with_behavior.behavior.genre_strength.insert("rock".to_string(), 2.0);
        let without = signals(&[("rock", 0.5)], &[]);

        let e = event("A", &["rock"], 7, 0);
        assert!(engine.score(&e, &with_behavior, now) > engine.score(&e, &without, now));
    }

    #[test]
    fn test_prior_recency_tiers() {
        let now = Utc::now();
        let soon = popularity_recency_prior(&event("A", &["rock"], 7, 0), now);
        let month = popularity_recency_prior(&event("A", &["rock"], 25, 0), now);
        let far = popularity_recency_prior(&event("A", &["rock"], 400, 0), now);

        assert!(soon > month);
        assert!(month > far);
    }
}
