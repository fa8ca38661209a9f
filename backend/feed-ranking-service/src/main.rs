mod openapi;

use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_swagger_ui::SwaggerUi;

use feed_ranking::config::Config;
use feed_ranking::db::{
    PgCandidatePool, PgPromotionRegistry, PgSignalRepository, PgSignalStore,
};
use feed_ranking::handlers::{
    get_personalized_feed, get_personalized_feed_with_diversity, health, metrics_endpoint,
    refresh_signals, FeedHandlerState, SignalsHandlerState,
};
use feed_ranking::middleware::{TokenBucket, TokenBucketConfig};
use feed_ranking::services::{FeedService, SignalRefresher};

async fn openapi_json(
    doc: web::Data<utoipa::openapi::OpenApi>,
) -> actix_web::Result<actix_web::HttpResponse> {
    let body = serde_json::to_string(&*doc).map_err(|e| {
        tracing::error!("OpenAPI serialization failed: {}", e);
        actix_web::error::ErrorInternalServerError("OpenAPI serialization error")
    })?;

    Ok(actix_web::HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Structured JSON logging with env-filter control
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting feed-ranking-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Environment: {}", config.service.env);

    // Database pool
    let pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database connection failed: {}", e);
            eprintln!("ERROR: Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    // Upstream collaborators
    let signal_store = Arc::new(PgSignalStore::new(pool.clone()));
    let candidate_pool = Arc::new(PgCandidatePool::new(
        pool.clone(),
        config.paging.candidate_pool_size,
    ));
    let promotion_registry = Arc::new(PgPromotionRegistry::new(pool.clone()));
    let signal_repository = Arc::new(PgSignalRepository::new(pool));

    // Ranking pipeline
    let feed_service = Arc::new(FeedService::new(
        signal_store,
        candidate_pool,
        promotion_registry,
        config.scoring.clone(),
        config.diversity.clone(),
    ));

    let refresher = Arc::new(SignalRefresher::new(
        signal_repository,
        config.refresh.clone(),
    ));

    let limiter = TokenBucket::new(TokenBucketConfig::from(&config.rate_limit));

    let feed_state = web::Data::new(FeedHandlerState {
        feed: feed_service,
        limiter,
        paging: config.paging.clone(),
    });
    let signals_state = web::Data::new(SignalsHandlerState { refresher });
    let openapi_doc = web::Data::new(openapi::doc());

    let port = config.service.port;
    tracing::info!("HTTP server listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(feed_state.clone())
            .app_data(signals_state.clone())
            .app_data(openapi_doc.clone())
            .service(health)
            .service(metrics_endpoint)
            .service(
                web::scope("/api/v1")
                    .service(get_personalized_feed_with_diversity)
                    .service(get_personalized_feed)
                    .service(refresh_signals),
            )
            .route("/api-docs/openapi.json", web::get().to(openapi_json))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url(
                    "/api-docs/openapi.json",
                    openapi::doc(),
                ),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
