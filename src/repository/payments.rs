use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::{Payment, PaymentStatus, VerificationStatus};

const PAYMENT_COLUMNS: &str = "id, tenant_id, unit_id, bill_id, amount, method, reference, \
     status, verification_status, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct PaymentFilter {
    pub tenant_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    pub verification_status: Option<VerificationStatus>,
}

fn build_list_query(filter: &PaymentFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE 1=1"
    ));
    if let Some(tenant_id) = filter.tenant_id {
        query.push(" AND tenant_id = ").push_bind(tenant_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if let Some(verification_status) = filter.verification_status {
        query
            .push(" AND verification_status = ")
            .push_bind(verification_status);
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
    query
}

pub async fn list(pool: &PgPool, filter: &PaymentFilter, limit: i64) -> AppResult<Vec<Payment>> {
    build_list_query(filter, limit)
        .build_query_as::<Payment>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, payment_id: Uuid) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
    ))
    .bind(payment_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

pub async fn get_for_update_tx(conn: &mut PgConnection, payment_id: Uuid) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(payment_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

/// Gateway webhooks resolve payments by the unique gateway reference.
pub async fn find_by_reference_tx(
    conn: &mut PgConnection,
    reference: &str,
) -> AppResult<Option<Payment>> {
    sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1 FOR UPDATE"
    ))
    .bind(reference)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_tx(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    unit_id: Uuid,
    bill_id: Uuid,
    amount: f64,
    method: &str,
    reference: &str,
) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "INSERT INTO payments (tenant_id, unit_id, bill_id, amount, method, reference) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(tenant_id)
    .bind(unit_id)
    .bind(bill_id)
    .bind(amount)
    .bind(method)
    .bind(reference)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn set_review_tx(
    conn: &mut PgConnection,
    payment_id: Uuid,
    status: PaymentStatus,
    verification_status: VerificationStatus,
) -> AppResult<Payment> {
    sqlx::query_as::<_, Payment>(&format!(
        "UPDATE payments SET status = $2, verification_status = $3, updated_at = now() \
         WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
    ))
    .bind(payment_id)
    .bind(status)
    .bind(verification_status)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Payment not found.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clauses_follow_field_order() {
        let filter = PaymentFilter {
            tenant_id: Some(Uuid::new_v4()),
            status: Some(PaymentStatus::Completed),
            verification_status: Some(VerificationStatus::Approved),
        };
        let query = build_list_query(&filter, 100);
        let sql = query.sql();

        let tenant_pos = sql.find("tenant_id = ").expect("tenant clause");
        let status_pos = sql.find(" status = ").expect("status clause");
        let verification_pos = sql
            .find("verification_status = ")
            .expect("verification clause");
        assert!(tenant_pos < status_pos);
        assert!(status_pos < verification_pos);
    }

    #[test]
    fn empty_filter_orders_newest_first() {
        let query = build_list_query(&PaymentFilter::default(), 10);
        assert!(query.sql().contains("ORDER BY created_at DESC"));
    }
}
