//! Upstream collaborator interfaces for the ranking pipeline
//!
//! The ranking engine is a pure function of the snapshots these traits
//! return; it never writes through them. The only writer is the
//! [`refresher::SignalRefresher`], which rebuilds a user's signals
//! out-of-band through [`SignalRepository`].

pub mod refresher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ArtistFamiliarity, EventCandidate, PromotionRecord, SongBehaviorSignal, UserGenreProfile,
};

pub use refresher::{RefreshOutcome, SignalRefresher};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("database error: {0}")]
    Database(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for UpstreamError {
    fn from(err: sqlx::Error) -> Self {
        UpstreamError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Read access to per-user aggregated preference signals.
///
/// Every method returns empty defaults for a cold-start user; a valid user id
/// never produces an error here, only infrastructure failures do.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn genre_profile(&self, user_id: Uuid) -> Result<UserGenreProfile>;
    async fn artist_familiarity(&self, user_id: Uuid) -> Result<ArtistFamiliarity>;
    async fn behavior_signals(&self, user_id: Uuid) -> Result<SongBehaviorSignal>;
}

/// Eligible events for a user, already filtered for blocks/exclusions.
///
/// Implementations return a superset several times the page size so the
/// diversity and exploration passes have real choices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidatePool: Send + Sync {
    async fn eligible_events(
        &self,
        user_id: Uuid,
        include_past: bool,
    ) -> Result<Vec<EventCandidate>>;
}

/// Currently-valid paid promotions for a set of events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromotionRegistry: Send + Sync {
    async fn active_promotions(&self, event_ids: &[Uuid]) -> Result<Vec<PromotionRecord>>;
}

/// Kinds of raw user interactions that feed signal building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Follow,
    Review,
    Interested,
    Listen,
    Skip,
}

impl InteractionKind {
    /// Relative weight of each interaction when aggregating preferences.
    pub fn weight(&self) -> f64 {
        match self {
            InteractionKind::Follow => 3.0,
            InteractionKind::Review => 2.5,
            InteractionKind::Interested => 2.0,
            InteractionKind::Listen => 1.0,
            InteractionKind::Skip => -0.5,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "follow" => Some(InteractionKind::Follow),
            "review" => Some(InteractionKind::Review),
            "interested" => Some(InteractionKind::Interested),
            "listen" => Some(InteractionKind::Listen),
            "skip" => Some(InteractionKind::Skip),
            _ => None,
        }
    }
}

/// One raw interaction event from the user's history.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub user_id: Uuid,
    pub artist_name: String,
    pub genres: Vec<String>,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

/// Freshly computed signals ready for an idempotent upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedSignals {
    pub genre_weights: HashMap<String, f64>,
    pub artist_familiarity: HashMap<String, f64>,
    pub behavior_strength: HashMap<String, f64>,
}

/// Raw interaction fetch + signal persistence, used only by the refresher.
///
/// `upsert_signals` must be last-writer-wins: signals are monotonically
/// freshened, never merged, so redundant concurrent refreshes are safe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn fetch_interactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InteractionEvent>>;

    async fn upsert_signals(&self, user_id: Uuid, signals: &ComputedSignals) -> Result<()>;
}
