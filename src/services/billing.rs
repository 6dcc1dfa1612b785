use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::{bill_total, BillStatus, MonthlyBill, Payment, PaymentStatus, VerificationStatus};
use crate::repository::{bills, map_db_error, payments, tenants};
use crate::schemas::{CreateBillInput, CreatePaymentInput};

#[derive(Debug, Serialize)]
pub struct OverdueSweepResult {
    pub bills_marked: u64,
}

/// Post (or re-post) the bill for a tenant's billing period. The bill is
/// keyed by (tenant, year, month): posting the same period twice replaces
/// the component amounts instead of duplicating the bill.
pub async fn upsert_monthly_bill(
    pool: &PgPool,
    config: &AppConfig,
    input: &CreateBillInput,
) -> AppResult<MonthlyBill> {
    let tenant = tenants::get(pool, input.tenant_id).await?;
    if tenant.move_out_date.is_some() {
        return Err(AppError::Conflict(
            "Tenant has moved out and cannot be billed.".to_string(),
        ));
    }

    let rent_amount = input.rent_amount.unwrap_or(tenant.rent_amount);
    if rent_amount < 0.0 {
        return Err(AppError::BadRequest(
            "Bill amounts must not be negative.".to_string(),
        ));
    }
    let total_amount = bill_total(rent_amount, input.water_amount, input.garbage_amount);

    let due_date = match input.due_date {
        Some(date) => date,
        None => NaiveDate::from_ymd_opt(input.year, input.month as u32, config.bill_due_day)
            .ok_or_else(|| AppError::BadRequest("Invalid billing period.".to_string()))?,
    };

    let bill = bills::upsert(
        pool,
        tenant.id,
        tenant.unit_id,
        input.year,
        input.month,
        rent_amount,
        input.water_amount,
        input.garbage_amount,
        total_amount,
        due_date,
    )
    .await?;

    info!(
        bill_id = %bill.id,
        tenant_id = %tenant.id,
        year = bill.year,
        month = bill.month,
        total_amount = bill.total_amount,
        "Monthly bill posted"
    );
    Ok(bill)
}

/// Flip every PENDING bill past its due date to OVERDUE. Triggered by an
/// external scheduler through the internal jobs endpoint.
pub async fn run_overdue_sweep(pool: &PgPool, today: NaiveDate) -> AppResult<OverdueSweepResult> {
    let bills_marked = bills::mark_overdue(pool, today).await?;
    info!(bills_marked, %today, "Overdue sweep finished");
    Ok(OverdueSweepResult { bills_marked })
}

/// Record a manual payment against a bill. It lands AWAITING_VERIFICATION
/// until a manager reviews it or the gateway confirms the charge.
pub async fn create_payment(pool: &PgPool, input: &CreatePaymentInput) -> AppResult<Payment> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let tenant = tenants::get_tx(&mut tx, input.tenant_id).await?;
    let bill = bills::get_tx(&mut tx, input.bill_id).await?;
    if bill.tenant_id != tenant.id {
        return Err(AppError::BadRequest(
            "Bill does not belong to the given tenant.".to_string(),
        ));
    }
    if bill.status == BillStatus::Paid {
        return Err(AppError::Conflict("Bill is already paid.".to_string()));
    }

    let reference = match &input.reference {
        Some(reference) => reference.clone(),
        None => format!("PAY-{}", Uuid::new_v4().simple()),
    };

    let payment = payments::insert_tx(
        &mut tx,
        tenant.id,
        tenant.unit_id,
        bill.id,
        input.amount,
        &input.method,
        &reference,
    )
    .await?;

    tx.commit().await.map_err(map_db_error)?;

    info!(
        payment_id = %payment.id,
        bill_id = %bill.id,
        amount = payment.amount,
        method = %payment.method,
        "Payment recorded, awaiting verification"
    );
    Ok(payment)
}

/// Resolve a payment that is awaiting verification. Approval completes the
/// payment and marks its bill PAID; decline fails it and leaves the bill
/// untouched. A payment can be reviewed exactly once.
pub async fn review_payment(pool: &PgPool, payment_id: Uuid, approved: bool) -> AppResult<Payment> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let payment = payments::get_for_update_tx(&mut tx, payment_id).await?;
    if payment.verification_status != VerificationStatus::Pending {
        return Err(AppError::Conflict(
            "Payment has already been reviewed.".to_string(),
        ));
    }

    let payment = if approved {
        let payment = payments::set_review_tx(
            &mut tx,
            payment_id,
            PaymentStatus::Completed,
            VerificationStatus::Approved,
        )
        .await?;
        if let Some(bill_id) = payment.bill_id {
            bills::set_status_tx(&mut tx, bill_id, BillStatus::Paid).await?;
        }
        payment
    } else {
        payments::set_review_tx(
            &mut tx,
            payment_id,
            PaymentStatus::Failed,
            VerificationStatus::Declined,
        )
        .await?
    };

    tx.commit().await.map_err(map_db_error)?;

    info!(%payment_id, approved, "Payment reviewed");
    Ok(payment)
}
