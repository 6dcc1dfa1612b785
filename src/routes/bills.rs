use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::{MonthlyBill, Role};
use crate::repository::bills::{self, BillFilter};
use crate::schemas::{clamp_limit_in_range, validate_input, BillPath, BillsQuery, CreateBillInput};
use crate::services::billing;
use crate::state::{db_pool, AppState};

const VIEW_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Caretaker];
const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];

pub fn router(state: &AppState) -> Router<AppState> {
    let view = Router::new()
        .route("/bills", get(list_bills))
        .route("/bills/{bill_id}", get(get_bill))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, VIEW_ROLES),
            roles::authorize,
        ));

    let manage = Router::new()
        .route("/bills", post(create_bill))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, MANAGE_ROLES),
            roles::authorize,
        ));

    view.merge(manage)
}

async fn list_bills(
    State(state): State<AppState>,
    Query(query): Query<BillsQuery>,
) -> AppResult<Json<Vec<MonthlyBill>>> {
    let pool = db_pool(&state)?;
    let filter = BillFilter {
        tenant_id: query.tenant_id,
        unit_id: query.unit_id,
        property_id: query.property_id,
        status: query.status,
        year: query.year,
        month: query.month,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(bills::list(pool, &filter, limit).await?))
}

async fn get_bill(
    State(state): State<AppState>,
    Path(path): Path<BillPath>,
) -> AppResult<Json<MonthlyBill>> {
    let pool = db_pool(&state)?;
    Ok(Json(bills::get(pool, path.bill_id).await?))
}

async fn create_bill(
    State(state): State<AppState>,
    Json(input): Json<CreateBillInput>,
) -> AppResult<(StatusCode, Json<MonthlyBill>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let bill = billing::upsert_monthly_bill(pool, &state.config, &input).await?;
    Ok((StatusCode::CREATED, Json(bill)))
}
