use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::{Lease, Role};
use crate::repository::leases::{self, LeaseFilter};
use crate::schemas::{clamp_limit_in_range, validate_input, LeasePath, LeasesQuery, RenewLeaseInput};
use crate::services::lifecycle;
use crate::state::{db_pool, AppState};

const VIEW_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Caretaker];
const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];

pub fn router(state: &AppState) -> Router<AppState> {
    let view = Router::new()
        .route("/leases", get(list_leases))
        .route("/leases/{lease_id}", get(get_lease))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, VIEW_ROLES),
            roles::authorize,
        ));

    let manage = Router::new()
        .route("/leases/{lease_id}/terminate", post(terminate_lease))
        .route("/leases/{lease_id}/renew", post(renew_lease))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, MANAGE_ROLES),
            roles::authorize,
        ));

    view.merge(manage)
}

async fn list_leases(
    State(state): State<AppState>,
    Query(query): Query<LeasesQuery>,
) -> AppResult<Json<Vec<Lease>>> {
    let pool = db_pool(&state)?;
    let filter = LeaseFilter {
        tenant_id: query.tenant_id,
        unit_id: query.unit_id,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(leases::list(pool, &filter, limit).await?))
}

async fn get_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
) -> AppResult<Json<Lease>> {
    let pool = db_pool(&state)?;
    Ok(Json(leases::get(pool, path.lease_id).await?))
}

async fn terminate_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
) -> AppResult<Json<lifecycle::LeaseOutcome>> {
    let pool = db_pool(&state)?;
    let today = Utc::now().date_naive();
    Ok(Json(
        lifecycle::terminate_lease(pool, path.lease_id, today).await?,
    ))
}

async fn renew_lease(
    State(state): State<AppState>,
    Path(path): Path<LeasePath>,
    Json(input): Json<RenewLeaseInput>,
) -> AppResult<Json<lifecycle::LeaseOutcome>> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let today = Utc::now().date_naive();
    Ok(Json(
        lifecycle::renew_lease(pool, path.lease_id, &input, today).await?,
    ))
}
