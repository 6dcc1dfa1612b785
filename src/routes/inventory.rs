use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::{InventoryItem, Role};
use crate::repository::inventory::{self, InventoryFilter};
use crate::schemas::{
    clamp_limit_in_range, validate_input, AdjustInventoryInput, CreateInventoryItemInput,
    InventoryPath, InventoryQuery,
};
use crate::state::{db_pool, AppState};

const STORE_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Storekeeper];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/inventory", get(list_items).post(create_item))
        .route("/inventory/{item_id}", get(get_item))
        .route("/inventory/{item_id}/adjust", post(adjust_item))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, STORE_ROLES),
            roles::authorize,
        ))
}

async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> AppResult<Json<Vec<InventoryItem>>> {
    let pool = db_pool(&state)?;
    let filter = InventoryFilter {
        property_id: query.property_id,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(inventory::list(pool, &filter, limit).await?))
}

async fn get_item(
    State(state): State<AppState>,
    Path(path): Path<InventoryPath>,
) -> AppResult<Json<InventoryItem>> {
    let pool = db_pool(&state)?;
    Ok(Json(inventory::get(pool, path.item_id).await?))
}

async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateInventoryItemInput>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let item = inventory::insert(pool, &input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn adjust_item(
    State(state): State<AppState>,
    Path(path): Path<InventoryPath>,
    Json(input): Json<AdjustInventoryInput>,
) -> AppResult<Json<InventoryItem>> {
    let pool = db_pool(&state)?;
    Ok(Json(
        inventory::adjust_quantity(pool, path.item_id, input.delta).await?,
    ))
}
