//! Signal refresher
//!
//! Rebuilds a user's preference signals from raw interaction history with
//! time decay, then upserts them through the repository. Runs out-of-band
//! from feed requests, at most once per cooldown window per user.
//!
//! Weight formula per genre/artist:
//! `weight = SUM(interaction_weight * daily_decay^days_ago)`

use super::{ComputedSignals, InteractionEvent, InteractionKind, Result, SignalRepository};
use crate::config::RefreshConfig;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Signals were rebuilt and stored.
    Refreshed { genres: usize, artists: usize },
    /// A refresh ran recently; this attempt was skipped.
    CoolingDown,
}

/// Rebuilds user signals from interaction history.
///
/// Concurrent refreshes for the same user are safe to run redundantly: the
/// repository upsert is last-writer-wins and both writers computed from the
/// same (or fresher) history.
pub struct SignalRefresher {
    repo: Arc<dyn SignalRepository>,
    config: RefreshConfig,
    last_refresh: DashMap<Uuid, DateTime<Utc>>,
}

impl SignalRefresher {
    pub fn new(repo: Arc<dyn SignalRepository>, config: RefreshConfig) -> Self {
        Self {
            repo,
            config,
            last_refresh: DashMap::new(),
        }
    }

    /// Refresh a user's signals unless a refresh ran inside the cooldown
    /// window.
    pub async fn refresh(&self, user_id: Uuid) -> Result<RefreshOutcome> {
        let now = Utc::now();

        if let Some(previous) = self.last_refresh.get(&user_id) {
            let elapsed = now.signed_duration_since(*previous);
            if elapsed < Duration::seconds(self.config.cooldown_secs) {
                debug!(
                    user_id = %user_id,
                    elapsed_secs = elapsed.num_seconds(),
                    "Signal refresh skipped, inside cooldown window"
                );
                return Ok(RefreshOutcome::CoolingDown);
            }
        }

        let since = now - Duration::days(self.config.lookback_days);
        let events = self.repo.fetch_interactions(user_id, since).await?;

        let signals = build_signals(&events, now, &self.config);
        let genres = signals.genre_weights.len();
        let artists = signals.artist_familiarity.len();

        self.repo.upsert_signals(user_id, &signals).await?;
        self.last_refresh.insert(user_id, now);

        info!(
            user_id = %user_id,
            event_count = events.len(),
            genre_count = genres,
            artist_count = artists,
            "User signals refreshed"
        );

        Ok(RefreshOutcome::Refreshed { genres, artists })
    }
}

/// Aggregate raw interactions into preference signals. Pure function of its
/// inputs so it can be tested with a fixed clock.
pub fn build_signals(
    events: &[InteractionEvent],
    now: DateTime<Utc>,
    config: &RefreshConfig,
) -> ComputedSignals {
    let mut genre_weights: HashMap<String, f64> = HashMap::new();
    let mut artist_weights: HashMap<String, f64> = HashMap::new();
    let mut behavior_strength: HashMap<String, f64> = HashMap::new();

    for event in events {
        let days_ago = (now - event.occurred_at).num_days().max(0) as f64;
        if days_ago > config.lookback_days as f64 {
            continue;
        }

        let decayed = event.kind.weight() * config.daily_decay.powf(days_ago);

        let artist_key = event.artist_name.trim().to_lowercase();
        if !artist_key.is_empty() {
            *artist_weights.entry(artist_key).or_insert(0.0) += decayed;
        }

        for genre in &event.genres {
            let genre_key = genre.trim().to_lowercase();
            if genre_key.is_empty() {
                continue;
            }
            *genre_weights.entry(genre_key.clone()).or_insert(0.0) += decayed;

            // Behavior signals track listening only, not follows/reviews.
            if event.kind == InteractionKind::Listen {
                *behavior_strength.entry(genre_key).or_insert(0.0) += decayed.max(0.0);
            }
        }
    }

    // Prune negative/noise weights, keep the strongest entries.
    let genre_weights = prune_and_truncate(genre_weights, config.min_weight, config.max_genres);
    let behavior_strength =
        prune_and_truncate(behavior_strength, config.min_weight, config.max_genres);

    // Familiarity saturates towards 1.0 with accumulated exposure.
    let artist_familiarity: HashMap<String, f64> = prune_and_truncate(
        artist_weights,
        config.min_weight,
        config.max_artists,
    )
    .into_iter()
    .map(|(artist, w)| (artist, (w / (w + config.familiarity_saturation)).clamp(0.0, 1.0)))
    .collect();

    ComputedSignals {
        genre_weights,
        artist_familiarity,
        behavior_strength,
    }
}

/// Drop entries below the floor and keep the top `max` by weight.
/// Ties are broken by key so truncation is deterministic.
fn prune_and_truncate(
    weights: HashMap<String, f64>,
    min_weight: f64,
    max: usize,
) -> HashMap<String, f64> {
    let mut entries: Vec<(String, f64)> = weights
        .into_iter()
        .filter(|(_, w)| *w >= min_weight)
        .collect();

    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries.truncate(max);

    entries.into_iter().collect()
}
