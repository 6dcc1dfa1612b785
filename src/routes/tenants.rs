use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::{Role, Tenant};
use crate::repository::tenants::{self, TenantFilter};
use crate::schemas::{clamp_limit_in_range, validate_input, MoveInInput, TenantPath, TenantsQuery};
use crate::services::lifecycle;
use crate::state::{db_pool, AppState};

const VIEW_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Caretaker];
const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];

pub fn router(state: &AppState) -> Router<AppState> {
    let view = Router::new()
        .route("/tenants", get(list_tenants))
        .route("/tenants/{tenant_id}", get(get_tenant))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, VIEW_ROLES),
            roles::authorize,
        ));

    let manage = Router::new()
        .route("/tenants/move-in", post(move_in))
        .route("/tenants/{tenant_id}/vacate", post(vacate))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, MANAGE_ROLES),
            roles::authorize,
        ));

    view.merge(manage)
}

async fn list_tenants(
    State(state): State<AppState>,
    Query(query): Query<TenantsQuery>,
) -> AppResult<Json<Vec<Tenant>>> {
    let pool = db_pool(&state)?;
    let filter = TenantFilter {
        unit_id: query.unit_id,
        property_id: query.property_id,
        include_moved_out: query.include_moved_out,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(tenants::list(pool, &filter, limit).await?))
}

async fn get_tenant(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
) -> AppResult<Json<Tenant>> {
    let pool = db_pool(&state)?;
    Ok(Json(tenants::get(pool, path.tenant_id).await?))
}

async fn move_in(
    State(state): State<AppState>,
    Json(input): Json<MoveInInput>,
) -> AppResult<(StatusCode, Json<lifecycle::MoveInOutcome>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let today = Utc::now().date_naive();
    let outcome = lifecycle::move_in(pool, &input, today).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn vacate(
    State(state): State<AppState>,
    Path(path): Path<TenantPath>,
) -> AppResult<Json<lifecycle::VacateOutcome>> {
    let pool = db_pool(&state)?;
    let today = Utc::now().date_naive();
    Ok(Json(lifecycle::vacate(pool, path.tenant_id, today).await?))
}
