use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::{Property, Role, Unit};
use crate::repository::properties;
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreatePropertyInput, PropertiesQuery, PropertyPath,
    UpdatePropertyInput,
};
use crate::services::lifecycle;
use crate::state::{db_pool, AppState};

const VIEW_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Caretaker];
const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];

pub fn router(state: &AppState) -> Router<AppState> {
    let view = Router::new()
        .route("/properties", get(list_properties))
        .route("/properties/{property_id}", get(get_property))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, VIEW_ROLES),
            roles::authorize,
        ));

    let manage = Router::new()
        .route("/properties", post(create_property))
        .route("/properties/{property_id}", patch(update_property))
        .route("/properties/{property_id}/archive", post(archive_property))
        .route("/properties/{property_id}/restore", post(restore_property))
        .route("/properties/{property_id}/sync-units", post(sync_units))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, MANAGE_ROLES),
            roles::authorize,
        ));

    view.merge(manage)
}

async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertiesQuery>,
) -> AppResult<Json<Vec<Property>>> {
    let pool = db_pool(&state)?;
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    let items = properties::list(pool, query.include_archived, limit).await?;
    Ok(Json(items))
}

async fn get_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
) -> AppResult<Json<Property>> {
    let pool = db_pool(&state)?;
    Ok(Json(properties::get(pool, path.property_id).await?))
}

async fn create_property(
    State(state): State<AppState>,
    Json(input): Json<CreatePropertyInput>,
) -> AppResult<(StatusCode, Json<Property>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let property = properties::insert(pool, &input).await?;
    Ok((StatusCode::CREATED, Json(property)))
}

async fn update_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
    Json(input): Json<UpdatePropertyInput>,
) -> AppResult<Json<Property>> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    Ok(Json(
        properties::update(pool, path.property_id, &input).await?,
    ))
}

async fn archive_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
) -> AppResult<Json<lifecycle::ArchiveOutcome>> {
    let pool = db_pool(&state)?;
    let outcome = lifecycle::archive_property(pool, path.property_id).await?;
    Ok(Json(outcome))
}

async fn restore_property(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
) -> AppResult<Json<lifecycle::RestoreOutcome>> {
    let pool = db_pool(&state)?;
    let outcome = lifecycle::restore_property(pool, path.property_id).await?;
    Ok(Json(outcome))
}

async fn sync_units(
    State(state): State<AppState>,
    Path(path): Path<PropertyPath>,
) -> AppResult<Json<Vec<Unit>>> {
    let pool = db_pool(&state)?;
    Ok(Json(
        lifecycle::sync_property_units(pool, path.property_id).await?,
    ))
}
