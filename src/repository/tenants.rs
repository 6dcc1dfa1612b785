use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::Tenant;

const TENANT_COLUMNS: &str = "id, user_id, unit_id, rent_amount, deposit_amount, \
     lease_start_date, lease_end_date, move_out_date, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct TenantFilter {
    pub unit_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub include_moved_out: bool,
}

fn build_list_query(filter: &TenantFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE 1=1"
    ));
    if let Some(unit_id) = filter.unit_id {
        query.push(" AND unit_id = ").push_bind(unit_id);
    }
    if let Some(property_id) = filter.property_id {
        query
            .push(" AND unit_id IN (SELECT id FROM units WHERE property_id = ")
            .push_bind(property_id)
            .push(")");
    }
    if !filter.include_moved_out {
        query.push(" AND move_out_date IS NULL");
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
    query
}

pub async fn list(pool: &PgPool, filter: &TenantFilter, limit: i64) -> AppResult<Vec<Tenant>> {
    build_list_query(filter, limit)
        .build_query_as::<Tenant>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, tenant_id: Uuid) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
    ))
    .bind(tenant_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

pub async fn get_tx(conn: &mut PgConnection, tenant_id: Uuid) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1 FOR UPDATE"
    ))
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

/// The tenant record currently attached to a portal user, if any.
pub async fn find_current_by_user(pool: &PgPool, user_id: Uuid) -> AppResult<Option<Tenant>> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants \
         WHERE user_id = $1 AND move_out_date IS NULL \
         ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    unit_id: Uuid,
    rent_amount: f64,
    deposit_amount: f64,
    lease_start_date: NaiveDate,
    lease_end_date: NaiveDate,
) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "INSERT INTO tenants \
            (user_id, unit_id, rent_amount, deposit_amount, lease_start_date, lease_end_date) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {TENANT_COLUMNS}"
    ))
    .bind(user_id)
    .bind(unit_id)
    .bind(rent_amount)
    .bind(deposit_amount)
    .bind(lease_start_date)
    .bind(lease_end_date)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}

/// Keep the tenant row's mirror of its current lease in step after a renewal
/// or termination.
pub async fn sync_lease_mirror_tx(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    rent_amount: f64,
    lease_start_date: NaiveDate,
    lease_end_date: NaiveDate,
) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "UPDATE tenants SET rent_amount = $2, lease_start_date = $3, lease_end_date = $4, \
            updated_at = now() \
         WHERE id = $1 RETURNING {TENANT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(rent_amount)
    .bind(lease_start_date)
    .bind(lease_end_date)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

pub async fn set_move_out_tx(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    move_out_date: Option<NaiveDate>,
) -> AppResult<Tenant> {
    sqlx::query_as::<_, Tenant>(&format!(
        "UPDATE tenants SET move_out_date = $2, updated_at = now() \
         WHERE id = $1 RETURNING {TENANT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(move_out_date)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

/// Every tenancy a portal user has held, for deciding whether the account is
/// still in use.
pub async fn list_for_user_tx(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Tenant>> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn list_for_property_tx(
    conn: &mut PgConnection,
    property_id: Uuid,
) -> AppResult<Vec<Tenant>> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {TENANT_COLUMNS} FROM tenants \
         WHERE unit_id IN (SELECT id FROM units WHERE property_id = $1)"
    ))
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_hides_moved_out_by_default() {
        let query = build_list_query(&TenantFilter::default(), 100);
        assert!(query.sql().contains("move_out_date IS NULL"));

        let include = TenantFilter {
            include_moved_out: true,
            ..TenantFilter::default()
        };
        let query = build_list_query(&include, 100);
        assert!(!query.sql().contains("move_out_date IS NULL"));
    }

    #[test]
    fn property_filter_joins_through_units() {
        let filter = TenantFilter {
            property_id: Some(Uuid::new_v4()),
            ..TenantFilter::default()
        };
        let query = build_list_query(&filter, 100);
        assert!(query
            .sql()
            .contains("unit_id IN (SELECT id FROM units WHERE property_id = "));
    }
}
