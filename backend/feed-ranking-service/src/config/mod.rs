use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub paging: PagingConfig,
    pub scoring: ScoringConfig,
    pub diversity: DiversityConfig,
    pub refresh: RefreshConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub env: String,
    pub port: u16,
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_max_per_artist: usize,
    /// How many candidates to pull from the pool per request. Kept several
    /// times larger than a page so diversity and exploration have real
    /// choices to work with.
    pub candidate_pool_size: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 100,
            default_max_per_artist: 3,
            candidate_pool_size: 400,
        }
    }
}

/// Weights for the base relevance score. The four terms sum to the affinity
/// ceiling (100); promotion boosts may exceed it up to MAX_SCORE.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub genre_weight: f64,
    pub familiarity_weight: f64,
    pub behavior_weight: f64,
    pub prior_weight: f64,
    /// Damping factor for the novelty curve `f / (1 + damping * f)`.
    pub novelty_damping: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            genre_weight: 40.0,
            familiarity_weight: 30.0,
            behavior_weight: 20.0,
            prior_weight: 10.0,
            novelty_damping: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityConfig {
    /// Penalty added per rank beyond the per-artist cap.
    pub penalty_step: f64,
    /// Fraction of page slots reserved for exploration candidates.
    pub exploration_fraction: f64,
    /// Relative affinity below which a genre counts as novel for the user.
    pub exploration_threshold: f64,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            penalty_step: 15.0,
            exploration_fraction: 0.2,
            exploration_threshold: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub lookback_days: i64,
    /// Exponential decay applied per day of signal age (0.97 = 3% per day).
    pub daily_decay: f64,
    /// Weights below this are pruned from the rebuilt profile.
    pub min_weight: f64,
    pub max_genres: usize,
    pub max_artists: usize,
    /// Saturation constant mapping accumulated artist weight into [0, 1).
    pub familiarity_saturation: f64,
    /// Minimum seconds between refreshes for the same user.
    pub cooldown_secs: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            daily_decay: 0.97,
            min_weight: 0.05,
            max_genres: 50,
            max_artists: 100,
            familiarity_saturation: 5.0,
            cooldown_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20.0,
            refill_per_sec: 10.0,
        }
    }
}

impl Config {
    pub fn from_env() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        Ok(Config {
            service: ServiceConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: env::var("APP_PORT")
                    .unwrap_or_else(|_| "8014".to_string())
                    .parse()?,
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "feed-ranking-service".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            paging: PagingConfig {
                default_limit: parse_or("FEED_DEFAULT_LIMIT", 50),
                max_limit: parse_or("FEED_MAX_LIMIT", 100),
                default_max_per_artist: parse_or("FEED_DEFAULT_MAX_PER_ARTIST", 3),
                candidate_pool_size: parse_or("FEED_CANDIDATE_POOL_SIZE", 400),
            },
            scoring: ScoringConfig {
                genre_weight: parse_or("SCORING_GENRE_WEIGHT", 40.0),
                familiarity_weight: parse_or("SCORING_FAMILIARITY_WEIGHT", 30.0),
                behavior_weight: parse_or("SCORING_BEHAVIOR_WEIGHT", 20.0),
                prior_weight: parse_or("SCORING_PRIOR_WEIGHT", 10.0),
                novelty_damping: parse_or("SCORING_NOVELTY_DAMPING", 0.5),
            },
            diversity: DiversityConfig {
                penalty_step: parse_or("DIVERSITY_PENALTY_STEP", 15.0),
                exploration_fraction: parse_or("DIVERSITY_EXPLORATION_FRACTION", 0.2),
                exploration_threshold: parse_or("DIVERSITY_EXPLORATION_THRESHOLD", 0.1),
            },
            refresh: RefreshConfig {
                lookback_days: parse_or("SIGNAL_LOOKBACK_DAYS", 90),
                daily_decay: parse_or("SIGNAL_DAILY_DECAY", 0.97),
                min_weight: parse_or("SIGNAL_MIN_WEIGHT", 0.05),
                max_genres: parse_or("SIGNAL_MAX_GENRES", 50),
                max_artists: parse_or("SIGNAL_MAX_ARTISTS", 100),
                familiarity_saturation: parse_or("SIGNAL_FAMILIARITY_SATURATION", 5.0),
                cooldown_secs: parse_or("SIGNAL_REFRESH_COOLDOWN_SECS", 1800),
            },
            rate_limit: RateLimitConfig {
                capacity: parse_or("RATE_LIMIT_CAPACITY", 20.0),
                refill_per_sec: parse_or("RATE_LIMIT_REFILL_PER_SEC", 10.0),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
