use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{BillStatus, MaintenanceStatus, PaymentStatus, UnitStatus, VerificationStatus};

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::BadRequest(format!("Validation failed: {errors}")))
}

pub fn clamp_limit_in_range(limit: Option<i64>, min: i64, max: i64) -> i64 {
    limit.unwrap_or(max.min(100)).clamp(min, max)
}

fn default_zero() -> f64 {
    0.0
}

// ── Paths ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PropertyPath {
    pub property_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UnitPath {
    pub unit_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TenantPath {
    pub tenant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LeasePath {
    pub lease_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BillPath {
    pub bill_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PaymentPath {
    pub payment_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MaintenancePath {
    pub request_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InventoryPath {
    pub item_id: Uuid,
}

// ── Properties & units ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePropertyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePropertyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertiesQuery {
    #[serde(default)]
    pub include_archived: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUnitInput {
    pub property_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub unit_number: String,
    #[validate(range(min = 0.0))]
    pub rent_amount: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUnitInput {
    #[validate(length(min = 1, max = 64))]
    pub unit_number: Option<String>,
    #[validate(range(min = 0.0))]
    pub rent_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetUnitStatusInput {
    pub status: UnitStatus,
}

#[derive(Debug, Deserialize)]
pub struct UnitsQuery {
    pub property_id: Option<Uuid>,
    pub status: Option<UnitStatus>,
    pub limit: Option<i64>,
}

// ── Tenant lifecycle ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MoveInInput {
    pub unit_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(range(min = 0.0))]
    pub rent_amount: f64,
    #[validate(range(min = 0.0))]
    #[serde(default = "default_zero")]
    pub deposit_amount: f64,
    pub lease_start_date: NaiveDate,
    pub lease_end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct TenantsQuery {
    pub unit_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    #[serde(default)]
    pub include_moved_out: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RenewLeaseInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(range(min = 0.0))]
    pub rent_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct LeasesQuery {
    pub tenant_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub limit: Option<i64>,
}

// ── Billing & payments ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBillInput {
    pub tenant_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: i32,
    #[validate(range(min = 0.0))]
    pub rent_amount: Option<f64>,
    #[validate(range(min = 0.0))]
    #[serde(default = "default_zero")]
    pub water_amount: f64,
    #[validate(range(min = 0.0))]
    #[serde(default = "default_zero")]
    pub garbage_amount: f64,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct BillsQuery {
    pub tenant_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub status: Option<BillStatus>,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentInput {
    pub tenant_id: Uuid,
    /// The bill this payment settles. Explicit and mandatory: payments are
    /// never matched to bills by amount after the fact.
    pub bill_id: Uuid,
    #[validate(range(min = 0.01))]
    pub amount: f64,
    #[validate(length(min = 1, max = 64))]
    pub method: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPaymentInput {
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsQuery {
    pub tenant_id: Option<Uuid>,
    pub status: Option<PaymentStatus>,
    pub verification_status: Option<VerificationStatus>,
    pub limit: Option<i64>,
}

// ── Maintenance & inventory ────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMaintenanceInput {
    pub unit_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMaintenanceInput {
    pub status: Option<MaintenanceStatus>,
    pub assigned_user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceQuery {
    pub unit_id: Option<Uuid>,
    pub status: Option<MaintenanceStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInventoryItemInput {
    pub property_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    #[validate(range(min = 0.0))]
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustInventoryInput {
    /// Positive to receive stock, negative to issue it.
    pub delta: i32,
}

#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub property_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantMaintenanceInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(None, 1, 1000), 100);
        assert_eq!(clamp_limit_in_range(Some(0), 1, 1000), 1);
        assert_eq!(clamp_limit_in_range(Some(5000), 1, 1000), 1000);
        assert_eq!(clamp_limit_in_range(Some(50), 1, 1000), 50);
    }

    #[test]
    fn rejects_negative_rates() {
        let input = CreateBillInput {
            tenant_id: Uuid::new_v4(),
            year: 2025,
            month: 6,
            rent_amount: Some(-1.0),
            water_amount: 0.0,
            garbage_amount: 0.0,
            due_date: None,
        };
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn rejects_invalid_email_on_move_in() {
        let input = MoveInInput {
            unit_id: Uuid::new_v4(),
            full_name: "Jane Tenant".to_string(),
            email: "not-an-email".to_string(),
            phone: None,
            rent_amount: 25000.0,
            deposit_amount: 25000.0,
            lease_start_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"),
            lease_end_date: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
        };
        assert!(validate_input(&input).is_err());
    }
}
