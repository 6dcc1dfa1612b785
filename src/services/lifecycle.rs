use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{derive_unit_status, Lease, LeaseStatus, Property, Role, Tenant, Unit, UnitStatus};
use crate::repository::{leases, map_db_error, properties, tenants, units, users};
use crate::schemas::{MoveInInput, RenewLeaseInput};

const TEMP_PASSWORD_LEN: usize = 12;

#[derive(Debug, Serialize)]
pub struct MoveInOutcome {
    pub tenant: Tenant,
    pub lease: Lease,
    pub unit: Unit,
    /// Present only when a portal account was created for a new email.
    pub temporary_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VacateOutcome {
    pub tenant: Tenant,
    pub unit: Unit,
    pub leases_terminated: u64,
}

#[derive(Debug, Serialize)]
pub struct LeaseOutcome {
    pub lease: Lease,
    pub unit: Unit,
}

#[derive(Debug, Serialize)]
pub struct ArchiveOutcome {
    pub property: Property,
}

#[derive(Debug, Serialize)]
pub struct RestoreOutcome {
    pub property: Property,
    pub units_restored: u64,
    pub leases_reactivated: u64,
}

/// Recompute and persist a unit's status from its open leases. Every
/// lifecycle mutation ends by calling this inside its own transaction.
pub async fn sync_unit_status(conn: &mut PgConnection, unit_id: Uuid) -> AppResult<Unit> {
    let unit = units::get_for_update_tx(conn, unit_id).await?;
    let snapshots = leases::open_snapshots_for_unit_tx(conn, unit_id).await?;
    let next = derive_unit_status(unit.status, &snapshots);
    if next == unit.status {
        return Ok(unit);
    }
    units::set_status_tx(conn, unit_id, next).await
}

fn generate_temp_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| {
            tracing::error!(%error, "Password hashing failed");
            AppError::Internal("Password hashing failed.".to_string())
        })
}

/// Move a tenant into a unit: find-or-create the portal user, create the
/// tenant record and its lease, and bring the unit status in step. All of it
/// commits or none of it does.
pub async fn move_in(pool: &PgPool, input: &MoveInInput, today: NaiveDate) -> AppResult<MoveInOutcome> {
    if input.lease_start_date >= input.lease_end_date {
        return Err(AppError::BadRequest(
            "Lease start date must be before the end date.".to_string(),
        ));
    }

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let unit = units::get_for_update_tx(&mut tx, input.unit_id).await?;
    if unit.deleted_at.is_some() {
        return Err(AppError::NotFound("Unit not found.".to_string()));
    }
    if unit.status == UnitStatus::Occupied {
        return Err(AppError::Conflict("Unit is already occupied.".to_string()));
    }

    let mut temporary_password = None;
    let user = match users::find_by_email_tx(&mut tx, &input.email).await? {
        Some(existing) if existing.role == Role::Tenant => {
            if existing.is_active {
                existing
            } else {
                users::set_active_tx(&mut tx, existing.id, true).await?
            }
        }
        Some(_) => {
            return Err(AppError::Conflict(
                "Email already belongs to a staff account.".to_string(),
            ));
        }
        None => {
            let password = generate_temp_password();
            let password_hash = hash_password(&password)?;
            let created = users::insert_tx(
                &mut tx,
                &input.email,
                &input.full_name,
                input.phone.as_deref(),
                &password_hash,
                Role::Tenant,
            )
            .await?;
            temporary_password = Some(password);
            created
        }
    };

    let tenant = tenants::insert_tx(
        &mut tx,
        user.id,
        unit.id,
        input.rent_amount,
        input.deposit_amount,
        input.lease_start_date,
        input.lease_end_date,
    )
    .await?;

    let status = LeaseStatus::initial_for_start(input.lease_start_date, today);
    let lease = leases::insert_tx(
        &mut tx,
        tenant.id,
        unit.id,
        status,
        input.lease_start_date,
        input.lease_end_date,
        input.rent_amount,
    )
    .await?;

    let unit = sync_unit_status(&mut tx, unit.id).await?;

    tx.commit().await.map_err(map_db_error)?;

    info!(
        tenant_id = %tenant.id,
        unit_id = %unit.id,
        lease_status = ?lease.status,
        new_account = temporary_password.is_some(),
        "Tenant moved in"
    );

    Ok(MoveInOutcome {
        tenant,
        lease,
        unit,
        temporary_password,
    })
}

/// Whether a user still holds a live tenancy besides the one being vacated.
fn retains_live_tenancy(tenancies: &[Tenant], vacated_tenant_id: Uuid) -> bool {
    tenancies
        .iter()
        .any(|tenant| tenant.id != vacated_tenant_id && tenant.move_out_date.is_none())
}

/// Move a tenant out: mirror the end date on the tenant record, terminate
/// their open leases, deactivate the portal account, and free the unit.
/// The unit goes VACANT unconditionally (single tenancy per unit; a manual
/// MAINTENANCE flag does not survive a move-out). Safe to repeat.
pub async fn vacate(pool: &PgPool, tenant_id: Uuid, today: NaiveDate) -> AppResult<VacateOutcome> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let tenant = tenants::get_tx(&mut tx, tenant_id).await?;
    let leases_terminated = leases::terminate_open_for_tenant_tx(&mut tx, tenant_id, today).await?;

    let tenant = if tenant.move_out_date.is_none() {
        tenants::sync_lease_mirror_tx(
            &mut tx,
            tenant_id,
            tenant.rent_amount,
            tenant.lease_start_date,
            today,
        )
        .await?;
        tenants::set_move_out_tx(&mut tx, tenant_id, Some(today)).await?
    } else {
        tenant
    };

    // Accounts are reused across tenancies (move-in matches by email), so the
    // portal login only closes when no other live tenancy remains on it.
    let sibling_tenancies = tenants::list_for_user_tx(&mut tx, tenant.user_id).await?;
    if !retains_live_tenancy(&sibling_tenancies, tenant.id) {
        users::set_active_tx(&mut tx, tenant.user_id, false).await?;
    }
    let unit = units::set_status_tx(&mut tx, tenant.unit_id, UnitStatus::Vacant).await?;

    tx.commit().await.map_err(map_db_error)?;

    info!(%tenant_id, unit_id = %unit.id, leases_terminated, "Tenant vacated");

    Ok(VacateOutcome {
        tenant,
        unit,
        leases_terminated,
    })
}

/// Terminate one lease early. The planned end date is overwritten with the
/// actual one.
pub async fn terminate_lease(
    pool: &PgPool,
    lease_id: Uuid,
    today: NaiveDate,
) -> AppResult<LeaseOutcome> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let lease = leases::get_for_update_tx(&mut tx, lease_id).await?;
    if lease.status.is_terminal() {
        return Err(AppError::Conflict("Lease is already closed.".to_string()));
    }

    let lease = leases::set_status_tx(&mut tx, lease_id, LeaseStatus::Terminated, Some(today)).await?;
    tenants::sync_lease_mirror_tx(
        &mut tx,
        lease.tenant_id,
        lease.rent_amount,
        lease.start_date,
        today,
    )
    .await?;
    let unit = sync_unit_status(&mut tx, lease.unit_id).await?;

    tx.commit().await.map_err(map_db_error)?;

    info!(%lease_id, unit_id = %unit.id, "Lease terminated");

    Ok(LeaseOutcome { lease, unit })
}

/// How a renewal closes the lease it replaces. An ACTIVE lease ran its
/// course and expires; a PENDING one never started and is terminated. A
/// closed lease cannot be renewed.
fn renewal_closing_status(status: LeaseStatus) -> Option<LeaseStatus> {
    if status.can_transition_to(LeaseStatus::Expired) {
        Some(LeaseStatus::Expired)
    } else if status.can_transition_to(LeaseStatus::Terminated) {
        Some(LeaseStatus::Terminated)
    } else {
        None
    }
}

/// Renew a lease: the current one is closed with today's date and a
/// successor is created PENDING, awaiting an explicit signing step. The unit
/// moves to RESERVED.
pub async fn renew_lease(
    pool: &PgPool,
    lease_id: Uuid,
    input: &RenewLeaseInput,
    today: NaiveDate,
) -> AppResult<LeaseOutcome> {
    if input.start_date >= input.end_date {
        return Err(AppError::BadRequest(
            "Lease start date must be before the end date.".to_string(),
        ));
    }

    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let old = leases::get_for_update_tx(&mut tx, lease_id).await?;
    let Some(closing_status) = renewal_closing_status(old.status) else {
        return Err(AppError::Conflict("Lease is already closed.".to_string()));
    };

    // Close the old lease before inserting its successor so the tenant never
    // holds two open leases, even transiently.
    leases::set_status_tx(&mut tx, lease_id, closing_status, Some(today)).await?;

    let rent_amount = input.rent_amount.unwrap_or(old.rent_amount);
    let lease = leases::insert_tx(
        &mut tx,
        old.tenant_id,
        old.unit_id,
        LeaseStatus::Pending,
        input.start_date,
        input.end_date,
        rent_amount,
    )
    .await?;

    tenants::sync_lease_mirror_tx(
        &mut tx,
        old.tenant_id,
        rent_amount,
        input.start_date,
        input.end_date,
    )
    .await?;
    let unit = sync_unit_status(&mut tx, old.unit_id).await?;

    tx.commit().await.map_err(map_db_error)?;

    info!(
        old_lease_id = %lease_id,
        new_lease_id = %lease.id,
        unit_id = %unit.id,
        "Lease renewed"
    );

    Ok(LeaseOutcome { lease, unit })
}

/// Soft-delete a property. Its units, leases, and tenants are left untouched
/// and simply drop out of the default list filters, so an archive is fully
/// reversible. The asymmetry with restore is deliberate: the property was
/// paused, not emptied.
pub async fn archive_property(pool: &PgPool, property_id: Uuid) -> AppResult<ArchiveOutcome> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let current = properties::get_tx(&mut tx, property_id).await?;
    if current.deleted_at.is_some() {
        return Err(AppError::Conflict(
            "Property is already archived.".to_string(),
        ));
    }
    let property = properties::set_archived_tx(&mut tx, property_id, true).await?;

    tx.commit().await.map_err(map_db_error)?;

    info!(%property_id, "Property archived");

    Ok(ArchiveOutcome { property })
}

/// Undo an archive: restore the property and its units, reactivate each
/// tenant's most recent terminated lease, re-enable their accounts, and put
/// every unit with a live tenancy back to OCCUPIED.
pub async fn restore_property(pool: &PgPool, property_id: Uuid) -> AppResult<RestoreOutcome> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    let current = properties::get_tx(&mut tx, property_id).await?;
    if current.deleted_at.is_none() {
        return Err(AppError::Conflict("Property is not archived.".to_string()));
    }
    let property = properties::set_archived_tx(&mut tx, property_id, false).await?;
    let units_restored = units::restore_for_property_tx(&mut tx, property_id).await?;

    let leases_reactivated =
        leases::reactivate_latest_for_property_tx(&mut tx, property_id).await?;

    let mut occupied_units = std::collections::HashSet::new();
    for tenant in tenants::list_for_property_tx(&mut tx, property_id).await? {
        if tenant.move_out_date.is_none() {
            users::set_active_tx(&mut tx, tenant.user_id, true).await?;
            occupied_units.insert(tenant.unit_id);
        }
    }
    for unit in units::list_for_property_tx(&mut tx, property_id).await? {
        if occupied_units.contains(&unit.id) {
            units::set_status_tx(&mut tx, unit.id, UnitStatus::Occupied).await?;
        } else {
            sync_unit_status(&mut tx, unit.id).await?;
        }
    }

    tx.commit().await.map_err(map_db_error)?;

    info!(%property_id, units_restored, leases_reactivated, "Property restored");

    Ok(RestoreOutcome {
        property,
        units_restored,
        leases_reactivated,
    })
}

/// Recompute the status of every unit under a property. Exposed as a repair
/// endpoint for drift introduced by manual data edits.
pub async fn sync_property_units(pool: &PgPool, property_id: Uuid) -> AppResult<Vec<Unit>> {
    let mut tx = pool.begin().await.map_err(map_db_error)?;

    properties::get_tx(&mut tx, property_id).await?;
    let mut synced = Vec::new();
    for unit in units::list_for_property_tx(&mut tx, property_id).await? {
        synced.push(sync_unit_status(&mut tx, unit.id).await?);
    }

    tx.commit().await.map_err(map_db_error)?;
    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn temp_passwords_are_alphanumeric() {
        let password = generate_temp_password();
        assert_eq!(password.len(), 12);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn temp_passwords_differ() {
        assert_ne!(generate_temp_password(), generate_temp_password());
    }

    #[test]
    fn renewal_expires_active_and_terminates_pending() {
        assert_eq!(
            renewal_closing_status(LeaseStatus::Active),
            Some(LeaseStatus::Expired)
        );
        assert_eq!(
            renewal_closing_status(LeaseStatus::Pending),
            Some(LeaseStatus::Terminated)
        );
        assert_eq!(renewal_closing_status(LeaseStatus::Expired), None);
        assert_eq!(renewal_closing_status(LeaseStatus::Terminated), None);
    }

    fn tenancy(user_id: Uuid, move_out_date: Option<&str>) -> Tenant {
        let now = Utc::now();
        let date = |value: &str| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
        };
        Tenant {
            id: Uuid::new_v4(),
            user_id,
            unit_id: Uuid::new_v4(),
            rent_amount: 25000.0,
            deposit_amount: 25000.0,
            lease_start_date: date("2025-01-01"),
            lease_end_date: date("2025-12-31"),
            move_out_date: move_out_date.map(date),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn vacating_sole_tenancy_frees_the_account() {
        let user_id = Uuid::new_v4();
        let vacated = tenancy(user_id, None);
        assert!(!retains_live_tenancy(&[vacated.clone()], vacated.id));

        let moved_out = tenancy(user_id, Some("2024-06-30"));
        assert!(!retains_live_tenancy(
            &[vacated.clone(), moved_out],
            vacated.id
        ));
    }

    #[test]
    fn vacating_an_old_tenancy_keeps_the_account_open() {
        let user_id = Uuid::new_v4();
        let old = tenancy(user_id, Some("2024-06-30"));
        let current = tenancy(user_id, None);
        assert!(retains_live_tenancy(&[old.clone(), current], old.id));
    }
}
