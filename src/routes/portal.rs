use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::middleware::roles::{self, RoleGate};
use crate::models::{MaintenanceRequest, MonthlyBill, Payment, Role, Tenant};
use crate::repository::bills::BillFilter;
use crate::repository::maintenance::MaintenanceFilter;
use crate::repository::payments::PaymentFilter;
use crate::repository::{bills, maintenance, payments, tenants};
use crate::schemas::{
    clamp_limit_in_range, validate_input, BillsQuery, CreateTenantMaintenanceInput,
    MaintenanceQuery, PaymentsQuery,
};
use crate::state::{db_pool, AppState};

const PORTAL_ROLES: &[Role] = &[Role::Tenant];

/// Self-service routes for tenant accounts. Everything is scoped to the
/// caller's own tenancy; a tenant with no active tenancy gets 404s.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/portal/bills", get(my_bills))
        .route("/portal/payments", get(my_payments))
        .route("/portal/maintenance", get(my_requests).post(create_request))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, PORTAL_ROLES),
            roles::authorize,
        ))
}

async fn current_tenancy(state: &AppState, user: AuthUser) -> AppResult<Tenant> {
    let pool = db_pool(state)?;
    tenants::find_current_by_user(pool, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active tenancy for this account.".to_string()))
}

async fn my_bills(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<BillsQuery>,
) -> AppResult<Json<Vec<MonthlyBill>>> {
    let tenant = current_tenancy(&state, user).await?;
    let pool = db_pool(&state)?;
    let filter = BillFilter {
        tenant_id: Some(tenant.id),
        status: query.status,
        year: query.year,
        month: query.month,
        ..BillFilter::default()
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(bills::list(pool, &filter, limit).await?))
}

async fn my_payments(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PaymentsQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let tenant = current_tenancy(&state, user).await?;
    let pool = db_pool(&state)?;
    let filter = PaymentFilter {
        tenant_id: Some(tenant.id),
        status: query.status,
        verification_status: query.verification_status,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(payments::list(pool, &filter, limit).await?))
}

async fn my_requests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MaintenanceQuery>,
) -> AppResult<Json<Vec<MaintenanceRequest>>> {
    let tenant = current_tenancy(&state, user).await?;
    let pool = db_pool(&state)?;
    let filter = MaintenanceFilter {
        unit_id: None,
        tenant_id: Some(tenant.id),
        status: query.status,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(maintenance::list(pool, &filter, limit).await?))
}

async fn create_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CreateTenantMaintenanceInput>,
) -> AppResult<(StatusCode, Json<MaintenanceRequest>)> {
    validate_input(&input)?;
    let tenant = current_tenancy(&state, user).await?;
    let pool = db_pool(&state)?;
    let request = maintenance::insert(
        pool,
        tenant.unit_id,
        Some(tenant.id),
        &input.title,
        input.description.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(request)))
}
