use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Caretaker,
    Technical,
    Storekeeper,
    Tenant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Caretaker => "CARETAKER",
            Self::Technical => "TECHNICAL",
            Self::Storekeeper => "STOREKEEPER",
            Self::Tenant => "TENANT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "unit_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Vacant,
    Reserved,
    Occupied,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lease_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaseStatus {
    Pending,
    Active,
    Expired,
    Terminated,
}

impl LeaseStatus {
    /// TERMINATED and EXPIRED are terminal: no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Terminated)
    }

    /// A lease that still claims its unit (counts toward occupancy).
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    pub fn can_transition_to(self, next: LeaseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Terminated)
                | (Self::Active, Self::Expired)
                | (Self::Active, Self::Terminated)
        )
    }

    /// Status of a freshly created lease: ACTIVE once its start date has
    /// arrived, PENDING while it is still in the future.
    pub fn initial_for_start(start_date: NaiveDate, today: NaiveDate) -> Self {
        if start_date <= today {
            Self::Active
        } else {
            Self::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bill_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Pending,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    AwaitingVerification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "maintenance_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceStatus {
    Open,
    InProgress,
    Resolved,
}

/// The lease facts unit-status derivation needs.
#[derive(Debug, Clone, Copy)]
pub struct LeaseSnapshot {
    pub status: LeaseStatus,
    pub created_at: DateTime<Utc>,
}

/// Compute the status a unit should hold given its current status and its
/// open leases.
///
/// MAINTENANCE is a manual flag and always wins. Otherwise the best open
/// lease decides: ACTIVE means OCCUPIED, PENDING means RESERVED, none means
/// VACANT. When several open leases exist (should not happen under correct
/// orchestration) ACTIVE beats PENDING and newer beats older.
pub fn derive_unit_status(current: UnitStatus, leases: &[LeaseSnapshot]) -> UnitStatus {
    if current == UnitStatus::Maintenance {
        return UnitStatus::Maintenance;
    }

    let best = leases
        .iter()
        .filter(|lease| lease.status.is_open())
        .max_by_key(|lease| {
            let rank = match lease.status {
                LeaseStatus::Active => 1,
                _ => 0,
            };
            (rank, lease.created_at)
        });

    match best.map(|lease| lease.status) {
        Some(LeaseStatus::Active) => UnitStatus::Occupied,
        Some(LeaseStatus::Pending) => UnitStatus::Reserved,
        _ => UnitStatus::Vacant,
    }
}

/// A monthly bill total is always the sum of its components.
pub fn bill_total(rent_amount: f64, water_amount: f64, garbage_amount: f64) -> f64 {
    round2(rent_amount + water_amount + garbage_amount)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AppUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: Uuid,
    pub property_id: Uuid,
    pub unit_number: String,
    pub status: UnitStatus,
    pub rent_amount: f64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub unit_id: Uuid,
    pub rent_amount: f64,
    pub deposit_amount: f64,
    pub lease_start_date: NaiveDate,
    pub lease_end_date: NaiveDate,
    pub move_out_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lease {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub status: LeaseStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub rent_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonthlyBill {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub rent_amount: f64,
    pub water_amount: f64,
    pub garbage_amount: f64,
    pub total_amount: f64,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub bill_id: Option<Uuid>,
    pub amount: f64,
    pub method: String,
    pub reference: String,
    pub status: PaymentStatus,
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MaintenanceRequest {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: MaintenanceStatus,
    pub assigned_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_cost: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn snapshot(status: LeaseStatus, created_secs: i64) -> LeaseSnapshot {
        LeaseSnapshot {
            status,
            created_at: Utc.timestamp_opt(created_secs, 0).single().expect("ts"),
        }
    }

    #[test]
    fn terminal_states_accept_no_transition() {
        for next in [
            LeaseStatus::Pending,
            LeaseStatus::Active,
            LeaseStatus::Expired,
            LeaseStatus::Terminated,
        ] {
            assert!(!LeaseStatus::Expired.can_transition_to(next));
            assert!(!LeaseStatus::Terminated.can_transition_to(next));
        }
    }

    #[test]
    fn transition_matrix_admits_exactly_the_allowed_pairs() {
        use LeaseStatus::*;
        let all = [Pending, Active, Expired, Terminated];
        let allowed = [
            (Pending, Active),
            (Pending, Terminated),
            (Active, Expired),
            (Active, Terminated),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from:?} -> {to:?}"
                );
            }
        }
    }

    #[test]
    fn pending_lease_can_be_cancelled_before_start() {
        assert!(LeaseStatus::Pending.can_transition_to(LeaseStatus::Terminated));
        assert!(LeaseStatus::Pending.can_transition_to(LeaseStatus::Active));
        assert!(LeaseStatus::Active.can_transition_to(LeaseStatus::Terminated));
        assert!(LeaseStatus::Active.can_transition_to(LeaseStatus::Expired));
    }

    #[test]
    fn new_lease_is_active_once_started() {
        let today = date("2025-06-15");
        assert_eq!(
            LeaseStatus::initial_for_start(date("2025-06-15"), today),
            LeaseStatus::Active
        );
        assert_eq!(
            LeaseStatus::initial_for_start(date("2025-01-01"), today),
            LeaseStatus::Active
        );
        assert_eq!(
            LeaseStatus::initial_for_start(date("2025-07-01"), today),
            LeaseStatus::Pending
        );
    }

    #[test]
    fn derives_vacant_without_open_leases() {
        assert_eq!(
            derive_unit_status(UnitStatus::Occupied, &[]),
            UnitStatus::Vacant
        );
        let closed = [
            snapshot(LeaseStatus::Expired, 10),
            snapshot(LeaseStatus::Terminated, 20),
        ];
        assert_eq!(
            derive_unit_status(UnitStatus::Reserved, &closed),
            UnitStatus::Vacant
        );
    }

    #[test]
    fn derives_occupied_and_reserved_from_best_lease() {
        let active = [snapshot(LeaseStatus::Active, 10)];
        assert_eq!(
            derive_unit_status(UnitStatus::Vacant, &active),
            UnitStatus::Occupied
        );

        let pending = [snapshot(LeaseStatus::Pending, 10)];
        assert_eq!(
            derive_unit_status(UnitStatus::Vacant, &pending),
            UnitStatus::Reserved
        );
    }

    #[test]
    fn maintenance_flag_wins_over_derivation() {
        let active = [snapshot(LeaseStatus::Active, 10)];
        assert_eq!(
            derive_unit_status(UnitStatus::Maintenance, &active),
            UnitStatus::Maintenance
        );
        assert_eq!(
            derive_unit_status(UnitStatus::Maintenance, &[]),
            UnitStatus::Maintenance
        );
    }

    #[test]
    fn tie_break_prefers_active_then_newest() {
        // An older ACTIVE lease beats a newer PENDING one.
        let mixed = [
            snapshot(LeaseStatus::Active, 10),
            snapshot(LeaseStatus::Pending, 99),
        ];
        assert_eq!(
            derive_unit_status(UnitStatus::Vacant, &mixed),
            UnitStatus::Occupied
        );

        // Among same-status leases the most recently created decides.
        let pendings = [
            snapshot(LeaseStatus::Pending, 10),
            snapshot(LeaseStatus::Pending, 99),
        ];
        assert_eq!(
            derive_unit_status(UnitStatus::Vacant, &pendings),
            UnitStatus::Reserved
        );
    }

    #[test]
    fn bill_total_sums_components() {
        assert_eq!(bill_total(25000.0, 500.0, 300.0), 25800.0);
        assert_eq!(bill_total(0.0, 0.0, 0.0), 0.0);
        assert_eq!(bill_total(10.005, 0.0, 0.0), 10.01);
    }
}
