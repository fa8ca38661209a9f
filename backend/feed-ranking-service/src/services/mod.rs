pub mod assembler;
pub mod diversity;
pub mod pipeline;
pub mod promotions;
pub mod scoring;
pub mod signals;

pub use assembler::{AssembleOptions, FeedAssembler};
pub use diversity::DiversityController;
pub use pipeline::{FeedRequest, FeedService};
pub use promotions::PromotionBooster;
pub use scoring::ScoringEngine;
pub use signals::{RefreshOutcome, SignalRefresher};
