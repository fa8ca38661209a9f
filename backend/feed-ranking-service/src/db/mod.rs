//! Postgres implementations of the upstream collaborator traits
//!
//! The storage layer is deliberately thin: fetch-by-filter queries mapped
//! into the typed snapshots the ranking pipeline consumes. All ranking logic
//! lives in `services`, never in SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    ArtistFamiliarity, EventCandidate, PromotionRecord, PromotionStatus, PromotionTier,
    SongBehaviorSignal, UserGenreProfile,
};
use crate::services::signals::{
    CandidatePool, ComputedSignals, InteractionEvent, InteractionKind, PromotionRegistry, Result,
    SignalRepository, SignalStore,
};

const PREFERENCE_TYPE_GENRE: &str = "genre";
const PREFERENCE_TYPE_ARTIST: &str = "artist";
const PREFERENCE_TYPE_BEHAVIOR: &str = "behavior_genre";

/// Reads aggregated preference signals from `music_preference_signals`.
pub struct PgSignalStore {
    pool: PgPool,
}

impl PgSignalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_weights(
        &self,
        user_id: Uuid,
        preference_type: &str,
    ) -> Result<(HashMap<String, f64>, Option<DateTime<Utc>>)> {
        let rows = sqlx::query(
            "SELECT preference_value, preference_score, updated_at \
             FROM music_preference_signals \
             WHERE user_id = $1 AND preference_type = $2",
        )
        .bind(user_id)
        .bind(preference_type)
        .fetch_all(&self.pool)
        .await?;

        let mut weights = HashMap::with_capacity(rows.len());
        let mut updated_at: Option<DateTime<Utc>> = None;
        for row in rows {
            let value: String = row.try_get("preference_value")?;
            let score: f64 = row.try_get("preference_score")?;
            let row_updated: DateTime<Utc> = row.try_get("updated_at")?;

            if score >= 0.0 {
                weights.insert(value, score);
            }
            updated_at = Some(updated_at.map_or(row_updated, |u: DateTime<Utc>| u.max(row_updated)));
        }

        Ok((weights, updated_at))
    }
}

#[async_trait]
impl SignalStore for PgSignalStore {
    async fn genre_profile(&self, user_id: Uuid) -> Result<UserGenreProfile> {
        let (weights, updated_at) = self.fetch_weights(user_id, PREFERENCE_TYPE_GENRE).await?;
        Ok(UserGenreProfile {
            user_id,
            weights,
            updated_at,
        })
    }

    async fn artist_familiarity(&self, user_id: Uuid) -> Result<ArtistFamiliarity> {
        let (weights, _) = self.fetch_weights(user_id, PREFERENCE_TYPE_ARTIST).await?;
        let scores = weights
            .into_iter()
            .map(|(artist, score)| (artist, score.clamp(0.0, 1.0)))
            .collect();
        Ok(ArtistFamiliarity { user_id, scores })
    }

    async fn behavior_signals(&self, user_id: Uuid) -> Result<SongBehaviorSignal> {
        let (weights, _) = self.fetch_weights(user_id, PREFERENCE_TYPE_BEHAVIOR).await?;
        Ok(SongBehaviorSignal {
            user_id,
            genre_strength: weights,
        })
    }
}

/// Reads eligible events from the `events` table.
pub struct PgCandidatePool {
    pool: PgPool,
    pool_size: i64,
}

impl PgCandidatePool {
    pub fn new(pool: PgPool, pool_size: usize) -> Self {
        Self {
            pool,
            pool_size: pool_size as i64,
        }
    }
}

#[async_trait]
impl CandidatePool for PgCandidatePool {
    async fn eligible_events(
        &self,
        _user_id: Uuid,
        include_past: bool,
    ) -> Result<Vec<EventCandidate>> {
        let rows = sqlx::query(
            "SELECT id, artist_name, venue_name, venue_city, event_date, genres, \
                    interested_count, ticket_available \
             FROM events \
             WHERE ($1 OR event_date >= NOW()) \
             ORDER BY event_date ASC \
             LIMIT $2",
        )
        .bind(include_past)
        .bind(self.pool_size)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            candidates.push(EventCandidate {
                id: row.try_get("id")?,
                artist_name: row.try_get("artist_name")?,
                venue_name: row.try_get("venue_name")?,
                venue_city: row.try_get("venue_city")?,
                event_date: row.try_get("event_date")?,
                genres: row.try_get::<Vec<String>, _>("genres").unwrap_or_default(),
                interested_count: row.try_get::<i32, _>("interested_count").unwrap_or(0).max(0)
                    as u32,
                ticket_available: row.try_get("ticket_available").unwrap_or(false),
            });
        }

        Ok(candidates)
    }
}

/// Reads currently-valid promotions from `event_promotions`.
pub struct PgPromotionRegistry {
    pool: PgPool,
}

impl PgPromotionRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromotionRegistry for PgPromotionRegistry {
    async fn active_promotions(&self, event_ids: &[Uuid]) -> Result<Vec<PromotionRecord>> {
        if event_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            "SELECT id, event_id, promotion_tier, starts_at, expires_at \
             FROM event_promotions \
             WHERE event_id = ANY($1) \
               AND promotion_status = 'active' \
               AND starts_at <= NOW() \
               AND expires_at >= NOW()",
        )
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut promotions = Vec::with_capacity(rows.len());
        for row in rows {
            let tier_raw: String = row.try_get("promotion_tier")?;
            let Some(tier) = PromotionTier::parse(&tier_raw) else {
                warn!(tier = %tier_raw, "Skipping promotion with unknown tier");
                continue;
            };

            promotions.push(PromotionRecord {
                id: row.try_get("id")?,
                event_id: row.try_get("event_id")?,
                tier,
                status: PromotionStatus::Active,
                starts_at: row.try_get("starts_at")?,
                expires_at: row.try_get("expires_at")?,
            });
        }

        Ok(promotions)
    }
}

/// Raw interaction history + signal persistence for the refresher.
pub struct PgSignalRepository {
    pool: PgPool,
}

impl PgSignalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for PgSignalRepository {
    async fn fetch_interactions(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<InteractionEvent>> {
        let rows = sqlx::query(
            "SELECT artist_name, genres, interaction_kind, occurred_at \
             FROM user_interactions \
             WHERE user_id = $1 AND occurred_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_raw: String = row.try_get("interaction_kind")?;
            let Some(kind) = InteractionKind::parse(&kind_raw) else {
                continue;
            };

            events.push(InteractionEvent {
                user_id,
                artist_name: row.try_get("artist_name")?,
                genres: row.try_get::<Vec<String>, _>("genres").unwrap_or_default(),
                kind,
                occurred_at: row.try_get("occurred_at")?,
            });
        }

        Ok(events)
    }

    /// Last-writer-wins replacement of the user's computed signals. Running
    /// this concurrently for the same user is safe: both writers replace the
    /// full signal set inside a transaction.
    async fn upsert_signals(&self, user_id: Uuid, signals: &ComputedSignals) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM music_preference_signals WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let groups = [
            (PREFERENCE_TYPE_GENRE, &signals.genre_weights),
            (PREFERENCE_TYPE_ARTIST, &signals.artist_familiarity),
            (PREFERENCE_TYPE_BEHAVIOR, &signals.behavior_strength),
        ];

        for (preference_type, weights) in groups {
            for (value, score) in weights {
                sqlx::query(
                    "INSERT INTO music_preference_signals \
                     (user_id, preference_type, preference_value, preference_score, updated_at) \
                     VALUES ($1, $2, $3, $4, NOW())",
                )
                .bind(user_id)
                .bind(preference_type)
                .bind(value)
                .bind(score)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
