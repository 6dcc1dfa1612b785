use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::{Unit, UnitStatus};
use crate::schemas::{CreateUnitInput, UpdateUnitInput};

const UNIT_COLUMNS: &str =
    "id, property_id, unit_number, status, rent_amount, deleted_at, created_at, updated_at";

/// Typed list filter. Clauses are pushed in field order so the generated SQL
/// is deterministic for a given filter.
#[derive(Debug, Default, Clone)]
pub struct UnitFilter {
    pub property_id: Option<Uuid>,
    pub status: Option<UnitStatus>,
    pub include_deleted: bool,
}

fn build_list_query(filter: &UnitFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {UNIT_COLUMNS} FROM units WHERE 1=1"
    ));
    if let Some(property_id) = filter.property_id {
        query.push(" AND property_id = ").push_bind(property_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    if !filter.include_deleted {
        // Units under an archived property disappear from listings too.
        query.push(
            " AND deleted_at IS NULL \
             AND property_id IN (SELECT id FROM properties WHERE deleted_at IS NULL)",
        );
    }
    query
        .push(" ORDER BY unit_number ASC, created_at DESC LIMIT ")
        .push_bind(limit);
    query
}

pub async fn list(pool: &PgPool, filter: &UnitFilter, limit: i64) -> AppResult<Vec<Unit>> {
    build_list_query(filter, limit)
        .build_query_as::<Unit>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, unit_id: Uuid) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>(&format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = $1"))
        .bind(unit_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

/// Row-locked read used inside lifecycle transactions so two concurrent
/// move-ins cannot both see the unit as vacant.
pub async fn get_for_update_tx(conn: &mut PgConnection, unit_id: Uuid) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>(&format!(
        "SELECT {UNIT_COLUMNS} FROM units WHERE id = $1 FOR UPDATE"
    ))
    .bind(unit_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

pub async fn insert(pool: &PgPool, input: &CreateUnitInput) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>(&format!(
        "INSERT INTO units (property_id, unit_number, rent_amount) \
         VALUES ($1, $2, $3) RETURNING {UNIT_COLUMNS}"
    ))
    .bind(input.property_id)
    .bind(&input.unit_number)
    .bind(input.rent_amount)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn update(pool: &PgPool, unit_id: Uuid, input: &UpdateUnitInput) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>(&format!(
        "UPDATE units SET \
            unit_number = COALESCE($2, unit_number), \
            rent_amount = COALESCE($3, rent_amount), \
            updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {UNIT_COLUMNS}"
    ))
    .bind(unit_id)
    .bind(&input.unit_number)
    .bind(input.rent_amount)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

pub async fn set_status_tx(
    conn: &mut PgConnection,
    unit_id: Uuid,
    status: UnitStatus,
) -> AppResult<Unit> {
    sqlx::query_as::<_, Unit>(&format!(
        "UPDATE units SET status = $2, updated_at = now() \
         WHERE id = $1 RETURNING {UNIT_COLUMNS}"
    ))
    .bind(unit_id)
    .bind(status)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Unit not found.".to_string()))
}

pub async fn list_for_property_tx(
    conn: &mut PgConnection,
    property_id: Uuid,
) -> AppResult<Vec<Unit>> {
    sqlx::query_as::<_, Unit>(&format!(
        "SELECT {UNIT_COLUMNS} FROM units WHERE property_id = $1"
    ))
    .bind(property_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_db_error)
}

/// Clear soft-delete marks left on a property's units. Archiving never sets
/// them itself, but restore sweeps regardless so a manually hidden unit
/// comes back with its property.
pub async fn restore_for_property_tx(conn: &mut PgConnection, property_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE units SET deleted_at = NULL, updated_at = now() \
         WHERE property_id = $1 AND deleted_at IS NOT NULL",
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
        let filter = UnitFilter {
            property_id: Some(Uuid::new_v4()),
            status: Some(UnitStatus::Vacant),
            include_deleted: false,
        };
        let query = build_list_query(&filter, 100);
        let sql = query.sql();

        let property_pos = sql.find("property_id = ").expect("property clause");
        let status_pos = sql.find("status = ").expect("status clause");
        assert!(property_pos < status_pos);
        assert!(sql.contains("deleted_at IS NULL"));
        assert!(sql.ends_with("$3"));
    }

    #[test]
    fn empty_filter_only_hides_deleted() {
        let query = build_list_query(&UnitFilter::default(), 50);
        let sql = query.sql();
        assert!(!sql.contains("property_id = "));
        assert!(!sql.contains("status = "));
        assert!(sql.contains("deleted_at IS NULL"));
        assert!(sql.contains("SELECT id FROM properties WHERE deleted_at IS NULL"));
    }
}
