use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::{BillStatus, MonthlyBill};

const BILL_COLUMNS: &str = "id, tenant_id, unit_id, year, month, rent_amount, water_amount, \
     garbage_amount, total_amount, due_date, status, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct BillFilter {
    pub tenant_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub status: Option<BillStatus>,
    pub year: Option<i32>,
    pub month: Option<i32>,
}

fn build_list_query(filter: &BillFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BILL_COLUMNS} FROM monthly_bills WHERE 1=1"
    ));
    if let Some(tenant_id) = filter.tenant_id {
        query.push(" AND tenant_id = ").push_bind(tenant_id);
    }
    if let Some(unit_id) = filter.unit_id {
        query.push(" AND unit_id = ").push_bind(unit_id);
    }
    if let Some(property_id) = filter.property_id {
        query
            .push(" AND unit_id IN (SELECT id FROM units WHERE property_id = ")
            .push_bind(property_id)
            .push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(year) = filter.year {
        query.push(" AND year = ").push_bind(year);
    }
    if let Some(month) = filter.month {
        query.push(" AND month = ").push_bind(month);
    }
    query
        .push(" ORDER BY year DESC, month DESC, created_at DESC LIMIT ")
        .push_bind(limit);
    query
}

pub async fn list(pool: &PgPool, filter: &BillFilter, limit: i64) -> AppResult<Vec<MonthlyBill>> {
    build_list_query(filter, limit)
        .build_query_as::<MonthlyBill>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, bill_id: Uuid) -> AppResult<MonthlyBill> {
    sqlx::query_as::<_, MonthlyBill>(&format!(
        "SELECT {BILL_COLUMNS} FROM monthly_bills WHERE id = $1"
    ))
    .bind(bill_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Bill not found.".to_string()))
}

pub async fn get_tx(conn: &mut PgConnection, bill_id: Uuid) -> AppResult<MonthlyBill> {
    sqlx::query_as::<_, MonthlyBill>(&format!(
        "SELECT {BILL_COLUMNS} FROM monthly_bills WHERE id = $1 FOR UPDATE"
    ))
    .bind(bill_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Bill not found.".to_string()))
}

/// Create or replace the bill for (tenant, year, month). A second posting for
/// the same period overwrites the component amounts and recomputes the total
/// rather than producing a duplicate bill.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &PgPool,
    tenant_id: Uuid,
    unit_id: Uuid,
    year: i32,
    month: i32,
    rent_amount: f64,
    water_amount: f64,
    garbage_amount: f64,
    total_amount: f64,
    due_date: NaiveDate,
) -> AppResult<MonthlyBill> {
    sqlx::query_as::<_, MonthlyBill>(&format!(
        "INSERT INTO monthly_bills \
            (tenant_id, unit_id, year, month, rent_amount, water_amount, garbage_amount, \
             total_amount, due_date) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (tenant_id, year, month) DO UPDATE SET \
            rent_amount = EXCLUDED.rent_amount, \
            water_amount = EXCLUDED.water_amount, \
            garbage_amount = EXCLUDED.garbage_amount, \
            total_amount = EXCLUDED.total_amount, \
            due_date = EXCLUDED.due_date, \
            updated_at = now() \
         RETURNING {BILL_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(unit_id)
    .bind(year)
    .bind(month)
    .bind(rent_amount)
    .bind(water_amount)
    .bind(garbage_amount)
    .bind(total_amount)
    .bind(due_date)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn set_status_tx(
    conn: &mut PgConnection,
    bill_id: Uuid,
    status: BillStatus,
) -> AppResult<MonthlyBill> {
    sqlx::query_as::<_, MonthlyBill>(&format!(
        "UPDATE monthly_bills SET status = $2, updated_at = now() \
         WHERE id = $1 RETURNING {BILL_COLUMNS}"
    ))
    .bind(bill_id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Bill not found.".to_string()))
}

/// Flip every pending bill whose due date has passed to OVERDUE. PAID bills
/// are never touched.
pub async fn mark_overdue(pool: &PgPool, today: NaiveDate) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE monthly_bills SET status = 'OVERDUE', updated_at = now() \
         WHERE status = 'PENDING' AND due_date < $1",
    )
    .bind(today)
    .execute(pool)
    .await
    .map_err(map_db_error)?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clauses_follow_field_order() {
        let filter = BillFilter {
            tenant_id: Some(Uuid::new_v4()),
            status: Some(BillStatus::Overdue),
            year: Some(2025),
            month: Some(6),
            ..BillFilter::default()
        };
        let query = build_list_query(&filter, 100);
        let sql = query.sql();

        let tenant_pos = sql.find("tenant_id = ").expect("tenant clause");
        let status_pos = sql.find("status = ").expect("status clause");
        let year_pos = sql.find("year = ").expect("year clause");
        let month_pos = sql.find("month = ").expect("month clause");
        assert!(tenant_pos < status_pos);
        assert!(status_pos < year_pos);
        assert!(year_pos < month_pos);
    }

    #[test]
    fn property_filter_joins_through_units() {
        let filter = BillFilter {
            property_id: Some(Uuid::new_v4()),
            ..BillFilter::default()
        };
        let query = build_list_query(&filter, 100);
        assert!(query
            .sql()
            .contains("unit_id IN (SELECT id FROM units WHERE property_id = "));
    }
}
