mod feed;
#[path = "health.rs"]
mod health_handlers;
mod signals;

pub use feed::{
    get_personalized_feed, get_personalized_feed_with_diversity, FeedHandlerState, FeedQueryParams,
};
pub use health_handlers::{health, metrics_endpoint};
pub use signals::{refresh_signals, SignalsHandlerState};
