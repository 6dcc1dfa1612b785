use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::{Lease, LeaseSnapshot, LeaseStatus};

const LEASE_COLUMNS: &str =
    "id, tenant_id, unit_id, status, start_date, end_date, rent_amount, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct LeaseFilter {
    pub tenant_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

fn build_list_query(filter: &LeaseFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query =
        QueryBuilder::<Postgres>::new(format!("SELECT {LEASE_COLUMNS} FROM leases WHERE 1=1"));
    if let Some(tenant_id) = filter.tenant_id {
        query.push(" AND tenant_id = ").push_bind(tenant_id);
    }
    if let Some(unit_id) = filter.unit_id {
        query.push(" AND unit_id = ").push_bind(unit_id);
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
    query
}

pub async fn list(pool: &PgPool, filter: &LeaseFilter, limit: i64) -> AppResult<Vec<Lease>> {
    build_list_query(filter, limit)
        .build_query_as::<Lease>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, lease_id: Uuid) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>(&format!("SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1"))
        .bind(lease_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

pub async fn get_for_update_tx(conn: &mut PgConnection, lease_id: Uuid) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>(&format!(
        "SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1 FOR UPDATE"
    ))
    .bind(lease_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

pub async fn insert_tx(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    unit_id: Uuid,
    status: LeaseStatus,
    start_date: NaiveDate,
    end_date: NaiveDate,
    rent_amount: f64,
) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>(&format!(
        "INSERT INTO leases (tenant_id, unit_id, status, start_date, end_date, rent_amount) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {LEASE_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(unit_id)
    .bind(status)
    .bind(start_date)
    .bind(end_date)
    .bind(rent_amount)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn set_status_tx(
    conn: &mut PgConnection,
    lease_id: Uuid,
    status: LeaseStatus,
    end_date: Option<NaiveDate>,
) -> AppResult<Lease> {
    sqlx::query_as::<_, Lease>(&format!(
        "UPDATE leases SET status = $2, end_date = COALESCE($3, end_date), updated_at = now() \
         WHERE id = $1 RETURNING {LEASE_COLUMNS}"
    ))
    .bind(lease_id)
    .bind(status)
    .bind(end_date)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Lease not found.".to_string()))
}

/// Close every open lease a tenant holds. Returns the number of leases
/// transitioned.
pub async fn terminate_open_for_tenant_tx(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    end_date: NaiveDate,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE leases SET status = 'TERMINATED', end_date = $2, updated_at = now() \
         WHERE tenant_id = $1 AND status IN ('PENDING', 'ACTIVE')",
    )
    .bind(tenant_id)
    .bind(end_date)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

/// The facts unit-status derivation needs, for every open lease on a unit.
pub async fn open_snapshots_for_unit_tx(
    conn: &mut PgConnection,
    unit_id: Uuid,
) -> AppResult<Vec<LeaseSnapshot>> {
    let rows: Vec<(LeaseStatus, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT status, created_at FROM leases \
         WHERE unit_id = $1 AND status IN ('PENDING', 'ACTIVE')",
    )
    .bind(unit_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)?;

    Ok(rows
        .into_iter()
        .map(|(status, created_at)| LeaseSnapshot { status, created_at })
        .collect())
}

/// Reactivate, per tenant under the property, the most recently terminated
/// lease. Tenants who genuinely moved out stay closed; DISTINCT ON keeps the
/// partial unique index on open leases happy when a tenant has several
/// terminated leases behind them.
pub async fn reactivate_latest_for_property_tx(
    conn: &mut PgConnection,
    property_id: Uuid,
) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE leases SET status = 'ACTIVE', updated_at = now() \
         WHERE id IN ( \
             SELECT DISTINCT ON (tenant_id) id FROM leases \
             WHERE status = 'TERMINATED' \
               AND unit_id IN (SELECT id FROM units WHERE property_id = $1) \
               AND tenant_id IN (SELECT id FROM tenants WHERE move_out_date IS NULL) \
             ORDER BY tenant_id, created_at DESC \
         )",
    )
    .bind(property_id)
    .execute(&mut *conn)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clauses_follow_field_order() {
        let filter = LeaseFilter {
            tenant_id: Some(Uuid::new_v4()),
            unit_id: Some(Uuid::new_v4()),
        };
        let query = build_list_query(&filter, 100);
        let sql = query.sql();
        let tenant_pos = sql.find("tenant_id = ").expect("tenant clause");
        let unit_pos = sql.find("unit_id = ").expect("unit clause");
        assert!(tenant_pos < unit_pos);
    }

    #[test]
    fn empty_filter_lists_everything() {
        let query = build_list_query(&LeaseFilter::default(), 25);
        let sql = query.sql();
        assert!(!sql.contains("tenant_id = "));
        assert!(!sql.contains("unit_id = "));
        assert!(sql.contains("ORDER BY created_at DESC"));
    }
}
