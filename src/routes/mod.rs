use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod bills;
pub mod health;
pub mod identity;
pub mod inventory;
pub mod jobs;
pub mod leases;
pub mod maintenance;
pub mod payments;
pub mod portal;
pub mod properties;
pub mod tenants;
pub mod units;

pub fn v1_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(identity::router(state))
        .merge(properties::router(state))
        .merge(units::router(state))
        .merge(tenants::router(state))
        .merge(leases::router(state))
        .merge(bills::router(state))
        .merge(payments::router(state))
        .merge(maintenance::router(state))
        .merge(inventory::router(state))
        .merge(portal::router(state))
        .merge(jobs::router())
}
