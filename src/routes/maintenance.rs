use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::{MaintenanceRequest, Role};
use crate::repository::maintenance::{self, MaintenanceFilter};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreateMaintenanceInput, MaintenancePath,
    MaintenanceQuery, UpdateMaintenanceInput,
};
use crate::state::{db_pool, AppState};

const WORK_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Caretaker, Role::Technical];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/maintenance", get(list_requests).post(create_request))
        .route("/maintenance/{request_id}", get(get_request).patch(update_request))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, WORK_ROLES),
            roles::authorize,
        ))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(query): Query<MaintenanceQuery>,
) -> AppResult<Json<Vec<MaintenanceRequest>>> {
    let pool = db_pool(&state)?;
    let filter = MaintenanceFilter {
        unit_id: query.unit_id,
        tenant_id: None,
        status: query.status,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(maintenance::list(pool, &filter, limit).await?))
}

async fn get_request(
    State(state): State<AppState>,
    Path(path): Path<MaintenancePath>,
) -> AppResult<Json<MaintenanceRequest>> {
    let pool = db_pool(&state)?;
    Ok(Json(maintenance::get(pool, path.request_id).await?))
}

async fn create_request(
    State(state): State<AppState>,
    Json(input): Json<CreateMaintenanceInput>,
) -> AppResult<(StatusCode, Json<MaintenanceRequest>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let request = maintenance::insert(
        pool,
        input.unit_id,
        None,
        &input.title,
        input.description.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn update_request(
    State(state): State<AppState>,
    Path(path): Path<MaintenancePath>,
    Json(input): Json<UpdateMaintenanceInput>,
) -> AppResult<Json<MaintenanceRequest>> {
    let pool = db_pool(&state)?;
    Ok(Json(
        maintenance::update(pool, path.request_id, &input).await?,
    ))
}
