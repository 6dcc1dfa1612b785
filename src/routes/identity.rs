use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::middleware::roles::{self, RoleGate};
use crate::models::Role;
use crate::repository::users;
use crate::state::{db_pool, AppState};

const ALL_ROLES: &[Role] = &[
    Role::Admin,
    Role::Manager,
    Role::Caretaker,
    Role::Technical,
    Role::Storekeeper,
    Role::Tenant,
];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().route("/me", get(me)).route_layer(
        axum::middleware::from_fn_with_state(RoleGate::new(state, ALL_ROLES), roles::authorize),
    )
}

async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Value>> {
    let pool = db_pool(&state)?;
    let record = users::get(pool, user.id).await?;
    Ok(Json(json!({
        "id": record.id,
        "email": record.email,
        "full_name": record.full_name,
        "phone": record.phone,
        "role": record.role,
        "is_active": record.is_active,
    })))
}
