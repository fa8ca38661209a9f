//! Feed ranking pipeline
//!
//! Orchestrates one feed computation: fetch snapshots once, then run the
//! pure scoring -> diversity -> promotion -> assembly stages. No shared
//! mutable state is touched during a request, so concurrent requests for the
//! same or different users can run fully in parallel without locking.

use super::assembler::{AssembleOptions, FeedAssembler};
use super::diversity::DiversityController;
use super::promotions::PromotionBooster;
use super::scoring::ScoringEngine;
use super::signals::{CandidatePool, PromotionRegistry, Result, SignalStore};
use crate::config::{DiversityConfig, ScoringConfig};
use crate::models::{FeedItem, UserSignals};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Parameters of one feed request, already clamped to safe values by the
/// handler layer.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub user_id: Uuid,
    pub limit: usize,
    pub offset: usize,
    pub max_per_artist: usize,
    pub include_past: bool,
}

pub struct FeedService {
    signal_store: Arc<dyn SignalStore>,
    candidate_pool: Arc<dyn CandidatePool>,
    promotion_registry: Arc<dyn PromotionRegistry>,
    scoring: ScoringEngine,
    diversity: DiversityController,
    booster: PromotionBooster,
    assembler: FeedAssembler,
}

impl FeedService {
    pub fn new(
        signal_store: Arc<dyn SignalStore>,
        candidate_pool: Arc<dyn CandidatePool>,
        promotion_registry: Arc<dyn PromotionRegistry>,
        scoring_config: ScoringConfig,
        diversity_config: DiversityConfig,
    ) -> Self {
        Self {
            signal_store,
            candidate_pool,
            promotion_registry,
            scoring: ScoringEngine::new(scoring_config),
            diversity: DiversityController::new(diversity_config),
            booster: PromotionBooster::new(),
            assembler: FeedAssembler::new(),
        }
    }

    /// Compute one personalized feed page.
    pub async fn personalized_feed(&self, request: &FeedRequest) -> Result<Vec<FeedItem>> {
        self.ranked_feed(request, Utc::now()).await
    }

    /// Same as [`personalized_feed`] with an explicit clock, so callers (and
    /// tests) can pin the reference time and get byte-identical output for
    /// identical inputs.
    pub async fn ranked_feed(
        &self,
        request: &FeedRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<FeedItem>> {
        debug!(
            user_id = %request.user_id,
            limit = request.limit,
            offset = request.offset,
            max_per_artist = request.max_per_artist,
            include_past = request.include_past,
            "Computing personalized feed"
        );

        // Fetch all snapshots up front; everything after this point is pure.
        // A failed or slow signal fetch degrades to the cold-start prior
        // instead of failing the request; candidates are different, a feed
        // without them would be indistinguishable from "no events".
        let signals = match futures::try_join!(
            self.signal_store.genre_profile(request.user_id),
            self.signal_store.artist_familiarity(request.user_id),
            self.signal_store.behavior_signals(request.user_id),
        ) {
            Ok((genre_profile, familiarity, behavior)) => UserSignals {
                genre_profile,
                familiarity,
                behavior,
            },
            Err(e) => {
                warn!(
                    user_id = %request.user_id,
                    error = %e,
                    "Signal fetch failed, falling back to popularity/recency prior"
                );
                UserSignals::default()
            }
        };

        let candidates = self
            .candidate_pool
            .eligible_events(request.user_id, request.include_past)
            .await?;

        if candidates.is_empty() {
            info!(user_id = %request.user_id, "No eligible events for user");
            return Ok(vec![]);
        }

        let event_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let promotions = match self.promotion_registry.active_promotions(&event_ids).await {
            Ok(promotions) => promotions,
            Err(e) => {
                warn!(
                    user_id = %request.user_id,
                    error = %e,
                    "Promotion fetch failed, continuing without boosts"
                );
                vec![]
            }
        };

        let mut scored = self.scoring.score_candidates(candidates, &signals, now);
        self.diversity.apply(&mut scored, request.max_per_artist);
        self.diversity.mark_exploration(&mut scored, &signals);
        self.booster.apply(&mut scored, &promotions, now);

        let items = self.assembler.assemble(
            scored,
            &AssembleOptions {
                limit: request.limit,
                offset: request.offset,
                max_per_artist: request.max_per_artist,
                include_past: request.include_past,
                explore_interval: self.diversity.explore_interval(),
                now,
            },
        );

        info!(
            user_id = %request.user_id,
            cold_start = signals.is_cold_start(),
            item_count = items.len(),
            promoted = items.iter().filter(|i| i.is_promoted).count(),
            exploration = items.iter().filter(|i| i.is_exploration).count(),
            top_score = items.first().map(|i| i.relevance_score),
            "Feed computed"
        );

        Ok(items)
    }
}
