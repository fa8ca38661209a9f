pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export ranking pipeline components
pub use services::{
    DiversityController, FeedAssembler, FeedRequest, FeedService, PromotionBooster,
    ScoringEngine, SignalRefresher,
};
