//! Promotion boosting
//!
//! Applies deterministic score boosts for paid promotions. Runs after the
//! diversity pass so artist-cap ranks are decided from pre-boost base scores
//! and an advertiser cannot buy extra slots for the same artist.

use crate::models::{PromotionRecord, ScoredCandidate};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

pub struct PromotionBooster;

impl Default for PromotionBooster {
    fn default() -> Self {
        Self::new()
    }
}

impl PromotionBooster {
    pub fn new() -> Self {
        Self
    }

    /// Apply boosts for live promotions. When an event carries several live
    /// promotions, the highest tier wins (ties broken by id so the outcome
    /// is stable). Candidates without promotion data are left untouched.
    pub fn apply(
        &self,
        candidates: &mut [ScoredCandidate],
        promotions: &[PromotionRecord],
        now: DateTime<Utc>,
    ) {
        let mut best: HashMap<Uuid, &PromotionRecord> = HashMap::new();
        for promo in promotions.iter().filter(|p| p.is_live(now)) {
            best.entry(promo.event_id)
                .and_modify(|current| {
                    if (promo.tier, promo.id) > (current.tier, current.id) {
                        *current = promo;
                    }
                })
                .or_insert(promo);
        }

        if best.is_empty() {
            return;
        }

        let mut boosted = 0usize;
        for candidate in candidates.iter_mut() {
            if let Some(promo) = best.get(&candidate.event.id) {
                candidate.promotion_boost = promo.tier.boost();
                candidate.is_promoted = true;
                candidate.promotion_tier = Some(promo.tier);
                candidate.active_promotion_id = Some(promo.id);
                boosted += 1;
            }
        }

        debug!(boosted, live_promotions = best.len(), "Applied promotion boosts");
    }
}
