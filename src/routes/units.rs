use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::middleware::roles::{self, RoleGate};
use crate::models::{Role, Unit, UnitStatus};
use crate::repository::units::{self, UnitFilter};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreateUnitInput, SetUnitStatusInput, UnitPath,
    UnitsQuery, UpdateUnitInput,
};
use crate::services::lifecycle;
use crate::state::{db_pool, AppState};

const VIEW_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Caretaker];
const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];

pub fn router(state: &AppState) -> Router<AppState> {
    let view = Router::new()
        .route("/units", get(list_units))
        .route("/units/{unit_id}", get(get_unit))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, VIEW_ROLES),
            roles::authorize,
        ));

    let manage = Router::new()
        .route("/units", post(create_unit))
        .route("/units/{unit_id}", patch(update_unit))
        .route("/units/{unit_id}/status", post(set_unit_status))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, MANAGE_ROLES),
            roles::authorize,
        ));

    view.merge(manage)
}

async fn list_units(
    State(state): State<AppState>,
    Query(query): Query<UnitsQuery>,
) -> AppResult<Json<Vec<Unit>>> {
    let pool = db_pool(&state)?;
    let filter = UnitFilter {
        property_id: query.property_id,
        status: query.status,
        include_deleted: false,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(units::list(pool, &filter, limit).await?))
}

async fn get_unit(
    State(state): State<AppState>,
    Path(path): Path<UnitPath>,
) -> AppResult<Json<Unit>> {
    let pool = db_pool(&state)?;
    Ok(Json(units::get(pool, path.unit_id).await?))
}

async fn create_unit(
    State(state): State<AppState>,
    Json(input): Json<CreateUnitInput>,
) -> AppResult<(StatusCode, Json<Unit>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let unit = units::insert(pool, &input).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn update_unit(
    State(state): State<AppState>,
    Path(path): Path<UnitPath>,
    Json(input): Json<UpdateUnitInput>,
) -> AppResult<Json<Unit>> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    Ok(Json(units::update(pool, path.unit_id, &input).await?))
}

/// Manual status override. Only the MAINTENANCE flag can be set or cleared
/// by hand; occupancy states are derived from leases.
async fn set_unit_status(
    State(state): State<AppState>,
    Path(path): Path<UnitPath>,
    Json(input): Json<SetUnitStatusInput>,
) -> AppResult<Json<Unit>> {
    let pool = db_pool(&state)?;

    let mut tx = pool.begin().await.map_err(crate::repository::map_db_error)?;
    let unit = match input.status {
        UnitStatus::Maintenance => {
            units::set_status_tx(&mut tx, path.unit_id, UnitStatus::Maintenance).await?
        }
        UnitStatus::Vacant => {
            // Clearing the flag re-derives the true occupancy state.
            let current = units::get_for_update_tx(&mut tx, path.unit_id).await?;
            if current.status == UnitStatus::Maintenance {
                units::set_status_tx(&mut tx, path.unit_id, UnitStatus::Vacant).await?;
            }
            lifecycle::sync_unit_status(&mut tx, path.unit_id).await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "Only MAINTENANCE can be set manually; occupancy is derived from leases."
                    .to_string(),
            ));
        }
    };
    tx.commit().await.map_err(crate::repository::map_db_error)?;

    Ok(Json(unit))
}
