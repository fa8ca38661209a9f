use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Upper bound for a final relevance score. Promotion boosts may push a
/// candidate past the affinity ceiling (100) but never past this value.
pub const MAX_SCORE: f64 = 125.0;

/// Immutable snapshot of an event for ranking purposes.
///
/// Sourced from the candidate pool once per request and never mutated by the
/// ranking pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCandidate {
    pub id: Uuid,
    pub artist_name: String,
    pub venue_name: String,
    pub venue_city: Option<String>,
    pub event_date: DateTime<Utc>,
    pub genres: Vec<String>,
    /// Number of users who marked themselves interested (social proof).
    pub interested_count: u32,
    pub ticket_available: bool,
}

impl EventCandidate {
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.event_date < now
    }

    /// First genre tag, used for exploration selection.
    pub fn primary_genre(&self) -> Option<&str> {
        self.genres.first().map(|g| g.as_str())
    }

    /// Normalized artist key for grouping and familiarity lookups.
    pub fn artist_key(&self) -> String {
        self.artist_name.trim().to_lowercase()
    }
}

/// Paid promotion tiers, ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionTier {
    Basic,
    Premium,
    Featured,
}

impl PromotionTier {
    /// Deterministic score boost per tier.
    pub fn boost(&self) -> f64 {
        match self {
            PromotionTier::Basic => 10.0,
            PromotionTier::Premium => 18.0,
            PromotionTier::Featured => 25.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionTier::Basic => "basic",
            PromotionTier::Premium => "premium",
            PromotionTier::Featured => "featured",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(PromotionTier::Basic),
            "premium" => Some(PromotionTier::Premium),
            "featured" => Some(PromotionTier::Featured),
            _ => None,
        }
    }
}

/// Promotion lifecycle: `pending_payment -> active -> (expired | cancelled)`.
/// The ranking engine only reads this state; transitions happen upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    PendingPayment,
    Active,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tier: PromotionTier,
    pub status: PromotionStatus,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PromotionRecord {
    /// Only active promotions inside their validity window are honored.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == PromotionStatus::Active && self.starts_at <= now && now <= self.expires_at
    }
}

/// Per-user genre affinity weights.
///
/// Weights are non-negative and relative (they do not sum to 1); confidence
/// decay for stale interactions is applied when the profile is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserGenreProfile {
    pub user_id: Uuid,
    pub weights: HashMap<String, f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserGenreProfile {
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn affinity(&self, genre: &str) -> f64 {
        self.weights.get(genre).copied().unwrap_or(0.0)
    }

    pub fn max_weight(&self) -> f64 {
        self.weights.values().fold(0.0_f64, |acc, w| acc.max(*w))
    }
}

/// Per-user artist exposure scores in [0, 1], keyed by normalized artist name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistFamiliarity {
    pub user_id: Uuid,
    pub scores: HashMap<String, f64>,
}

impl ArtistFamiliarity {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score_for(&self, artist_key: &str) -> f64 {
        self.scores.get(artist_key).copied().unwrap_or(0.0).clamp(0.0, 1.0)
    }
}

/// Genre-weighted recent listening/engagement strength.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongBehaviorSignal {
    pub user_id: Uuid,
    pub genre_strength: HashMap<String, f64>,
}

impl SongBehaviorSignal {
    pub fn is_empty(&self) -> bool {
        self.genre_strength.is_empty()
    }

    pub fn strength(&self, genre: &str) -> f64 {
        self.genre_strength.get(genre).copied().unwrap_or(0.0)
    }

    pub fn max_strength(&self) -> f64 {
        self.genre_strength
            .values()
            .fold(0.0_f64, |acc, s| acc.max(*s))
    }
}

/// Snapshot of all preference signals for one user, fetched once per request
/// and treated as immutable for the duration of the ranking pass.
#[derive(Debug, Clone, Default)]
pub struct UserSignals {
    pub genre_profile: UserGenreProfile,
    pub familiarity: ArtistFamiliarity,
    pub behavior: SongBehaviorSignal,
}

impl UserSignals {
    /// Cold start: no signals of any kind. Scoring falls back to the
    /// popularity/recency prior so the feed is never empty or arbitrary.
    pub fn is_cold_start(&self) -> bool {
        self.genre_profile.is_empty() && self.familiarity.is_empty() && self.behavior.is_empty()
    }
}

/// A candidate mid-pipeline, created fresh per request and discarded after
/// the response is assembled.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub event: EventCandidate,
    pub base_score: f64,
    pub diversity_penalty: f64,
    pub promotion_boost: f64,
    /// 1-based rank of this event among the same artist's candidates,
    /// computed from pre-boost base scores.
    pub artist_rank: u32,
    pub is_promoted: bool,
    pub promotion_tier: Option<PromotionTier>,
    pub active_promotion_id: Option<Uuid>,
    pub is_exploration: bool,
}

impl ScoredCandidate {
    pub fn new(event: EventCandidate, base_score: f64) -> Self {
        Self {
            event,
            base_score,
            diversity_penalty: 0.0,
            promotion_boost: 0.0,
            artist_rank: 1,
            is_promoted: false,
            promotion_tier: None,
            active_promotion_id: None,
            is_exploration: false,
        }
    }

    /// `clamp(base - penalty + boost, 0, MAX_SCORE)`
    pub fn final_score(&self) -> f64 {
        (self.base_score - self.diversity_penalty + self.promotion_boost).clamp(0.0, MAX_SCORE)
    }
}

/// Wire contract for one feed entry. Field names and types are part of the
/// client API and must not change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedItem {
    pub event_id: Uuid,
    pub artist_name: String,
    pub venue_name: String,
    pub event_date: DateTime<Utc>,
    pub relevance_score: f64,
    pub is_promoted: bool,
    pub promotion_tier: Option<String>,
    pub active_promotion_id: Option<Uuid>,
    pub is_exploration: bool,
}

impl From<&ScoredCandidate> for FeedItem {
    fn from(candidate: &ScoredCandidate) -> Self {
        Self {
            event_id: candidate.event.id,
            artist_name: candidate.event.artist_name.clone(),
            venue_name: candidate.event.venue_name.clone(),
            event_date: candidate.event.event_date,
            relevance_score: candidate.final_score(),
            is_promoted: candidate.is_promoted,
            promotion_tier: candidate.promotion_tier.map(|t| t.as_str().to_string()),
            active_promotion_id: candidate.active_promotion_id,
            is_exploration: candidate.is_exploration,
        }
    }
}

/// Feed page response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    pub limit: usize,
    pub offset: usize,
    pub total_count: usize,
}
