use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::services::billing::{self, OverdueSweepResult};
use crate::state::{db_pool, AppState};

const INTERNAL_KEY_HEADER: &str = "x-internal-api-key";

/// Endpoints for external schedulers (cron, Cloud Scheduler). They carry no
/// user session; a shared key in the request header authorizes them.
pub fn router() -> Router<AppState> {
    Router::new().route("/jobs/overdue-sweep", post(overdue_sweep))
}

fn require_internal_key(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let expected = state.config.internal_api_key.as_deref().ok_or_else(|| {
        AppError::Dependency(
            "Internal API key is not configured. Set INTERNAL_API_KEY.".to_string(),
        )
    })?;

    let provided = headers
        .get(INTERNAL_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() || provided != expected {
        return Err(AppError::Unauthorized("Invalid internal API key.".to_string()));
    }
    Ok(())
}

async fn overdue_sweep(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<OverdueSweepResult>> {
    require_internal_key(&state, &headers)?;
    let pool = db_pool(&state)?;
    let today = Utc::now().date_naive();
    Ok(Json(billing::run_overdue_sweep(pool, today).await?))
}
