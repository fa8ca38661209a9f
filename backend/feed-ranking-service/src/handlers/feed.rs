use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::config::PagingConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::TokenBucket;
use crate::models::FeedResponse;
use crate::services::{FeedRequest, FeedService};

/// Query parameters for the feed endpoints.
///
/// Values arrive as raw strings and are parsed leniently: negative or
/// non-numeric input clamps to defaults instead of erroring, per the client
/// contract.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQueryParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub include_past: Option<String>,
    pub max_per_artist: Option<String>,
}

impl FeedQueryParams {
    pub fn limit(&self, paging: &PagingConfig) -> usize {
        self.limit
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(|v| (v as usize).min(paging.max_limit))
            .unwrap_or(paging.default_limit)
    }

    pub fn offset(&self) -> usize {
        self.offset
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .map(|v| v as usize)
            .unwrap_or(0)
    }

    pub fn include_past(&self) -> bool {
        matches!(self.include_past.as_deref(), Some("true") | Some("1"))
    }

    pub fn max_per_artist(&self, paging: &PagingConfig) -> usize {
        self.max_per_artist
            .as_deref()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .unwrap_or(paging.default_max_per_artist)
    }
}

pub struct FeedHandlerState {
    pub feed: Arc<FeedService>,
    pub limiter: TokenBucket,
    pub paging: PagingConfig,
}

/// `GetPersonalizedFeed(user_id, limit, offset, include_past)`
#[get("/feed/{user_id}")]
pub async fn get_personalized_feed(
    path: web::Path<Uuid>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    serve_feed(path.into_inner(), &query, &state, "feed", None).await
}

/// `GetPersonalizedFeedWithDiversity(user_id, limit, offset, max_per_artist, include_past)`
#[get("/feed/{user_id}/diverse")]
pub async fn get_personalized_feed_with_diversity(
    path: web::Path<Uuid>,
    query: web::Query<FeedQueryParams>,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    let max_per_artist = query.max_per_artist(&state.paging);
    serve_feed(path.into_inner(), &query, &state, "feed_diverse", Some(max_per_artist)).await
}

async fn serve_feed(
    user_id: Uuid,
    query: &FeedQueryParams,
    state: &web::Data<FeedHandlerState>,
    endpoint: &str,
    max_per_artist: Option<usize>,
) -> Result<HttpResponse> {
    if !state.limiter.try_acquire().await {
        metrics::record_feed_request(endpoint, "rate_limited");
        return Err(AppError::RateLimited(
            "feed request rate exceeded, retry shortly".to_string(),
        ));
    }

    let request = FeedRequest {
        user_id,
        limit: query.limit(&state.paging),
        offset: query.offset(),
        max_per_artist: max_per_artist.unwrap_or(state.paging.default_max_per_artist),
        include_past: query.include_past(),
    };

    debug!(
        user_id = %request.user_id,
        endpoint,
        limit = request.limit,
        offset = request.offset,
        "Feed request received"
    );

    let started = Instant::now();
    let items = match state.feed.personalized_feed(&request).await {
        Ok(items) => items,
        Err(e) => {
            metrics::record_feed_request(endpoint, "error");
            return Err(e.into());
        }
    };

    metrics::record_feed_duration(endpoint, started.elapsed());
    metrics::record_items_returned(endpoint, items.len());
    metrics::record_feed_request(endpoint, "ok");

    let total_count = items.len();
    Ok(HttpResponse::Ok().json(FeedResponse {
        items,
        limit: request.limit,
        offset: request.offset,
        total_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        limit: Option<&str>,
        offset: Option<&str>,
        max_per_artist: Option<&str>,
    ) -> FeedQueryParams {
        FeedQueryParams {
            limit: limit.map(String::from),
            offset: offset.map(String::from),
            include_past: None,
            max_per_artist: max_per_artist.map(String::from),
        }
    }

    #[test]
    fn test_valid_params_pass_through() {
        let paging = PagingConfig::default();
        let p = params(Some("25"), Some("50"), Some("2"));
        assert_eq!(p.limit(&paging), 25);
        assert_eq!(p.offset(), 50);
        assert_eq!(p.max_per_artist(&paging), 2);
    }

    #[test]
    fn test_invalid_params_clamp_to_defaults() {
        let paging = PagingConfig::default();

        for bad in ["-5", "abc", "", "1.5"] {
            let p = params(Some(bad), Some(bad), Some(bad));
            assert_eq!(p.limit(&paging), paging.default_limit, "limit for {:?}", bad);
            assert_eq!(p.offset(), 0, "offset for {:?}", bad);
            assert_eq!(
                p.max_per_artist(&paging),
                paging.default_max_per_artist,
                "max_per_artist for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_limit_capped_at_max() {
        let paging = PagingConfig::default();
        let p = params(Some("100000"), None, None);
        assert_eq!(p.limit(&paging), paging.max_limit);
    }

    #[test]
    fn test_missing_params_use_defaults() {
        let paging = PagingConfig::default();
        let p = FeedQueryParams::default();
        assert_eq!(p.limit(&paging), paging.default_limit);
        assert_eq!(p.offset(), 0);
        assert!(!p.include_past());
        assert_eq!(p.max_per_artist(&paging), paging.default_max_per_artist);
    }

    #[test]
    fn test_include_past_parsing() {
        let mut p = FeedQueryParams::default();
        p.include_past = Some("true".to_string());
        assert!(p.include_past());
        p.include_past = Some("1".to_string());
        assert!(p.include_past());
        p.include_past = Some("yes".to_string());
        assert!(!p.include_past());
    }
}
