use actix_web::{post, web, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::metrics;
use crate::services::{RefreshOutcome, SignalRefresher};

pub struct SignalsHandlerState {
    pub refresher: Arc<SignalRefresher>,
}

/// Trigger an out-of-band rebuild of a user's preference signals.
///
/// Throttled by the refresher's cooldown window; a request inside the window
/// is a successful no-op rather than an error, since the stored signals are
/// already fresh.
#[post("/signals/{user_id}/refresh")]
pub async fn refresh_signals(
    path: web::Path<Uuid>,
    state: web::Data<SignalsHandlerState>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();

    let outcome = match state.refresher.refresh(user_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics::record_signal_refresh("error");
            return Err(e.into());
        }
    };

    match outcome {
        RefreshOutcome::Refreshed { genres, artists } => {
            metrics::record_signal_refresh("refreshed");
            info!(user_id = %user_id, genres, artists, "Signal refresh completed");
            Ok(HttpResponse::Accepted().json(json!({
                "status": "refreshed",
                "genres": genres,
                "artists": artists,
            })))
        }
        RefreshOutcome::CoolingDown => {
            metrics::record_signal_refresh("cooldown");
            Ok(HttpResponse::Ok().json(json!({
                "status": "skipped",
                "reason": "cooldown",
            })))
        }
    }
}
