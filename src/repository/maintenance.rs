use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::{MaintenanceRequest, MaintenanceStatus};
use crate::schemas::UpdateMaintenanceInput;

const REQUEST_COLUMNS: &str = "id, unit_id, tenant_id, title, description, status, \
     assigned_user_id, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct MaintenanceFilter {
    pub unit_id: Option<Uuid>,
    pub tenant_id: Option<Uuid>,
    pub status: Option<MaintenanceStatus>,
}

fn build_list_query(filter: &MaintenanceFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {REQUEST_COLUMNS} FROM maintenance_requests WHERE 1=1"
    ));
    if let Some(unit_id) = filter.unit_id {
        query.push(" AND unit_id = ").push_bind(unit_id);
    }
    if let Some(tenant_id) = filter.tenant_id {
        query.push(" AND tenant_id = ").push_bind(tenant_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status);
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
    query
}

pub async fn list(
    pool: &PgPool,
    filter: &MaintenanceFilter,
    limit: i64,
) -> AppResult<Vec<MaintenanceRequest>> {
    build_list_query(filter, limit)
        .build_query_as::<MaintenanceRequest>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, request_id: Uuid) -> AppResult<MaintenanceRequest> {
    sqlx::query_as::<_, MaintenanceRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM maintenance_requests WHERE id = $1"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Maintenance request not found.".to_string()))
}

pub async fn insert(
    pool: &PgPool,
    unit_id: Uuid,
    tenant_id: Option<Uuid>,
    title: &str,
    description: Option<&str>,
) -> AppResult<MaintenanceRequest> {
    sqlx::query_as::<_, MaintenanceRequest>(&format!(
        "INSERT INTO maintenance_requests (unit_id, tenant_id, title, description) \
         VALUES ($1, $2, $3, $4) RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(unit_id)
    .bind(tenant_id)
    .bind(title)
    .bind(description)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn update(
    pool: &PgPool,
    request_id: Uuid,
    input: &UpdateMaintenanceInput,
) -> AppResult<MaintenanceRequest> {
    sqlx::query_as::<_, MaintenanceRequest>(&format!(
        "UPDATE maintenance_requests SET \
            status = COALESCE($2, status), \
            assigned_user_id = COALESCE($3, assigned_user_id), \
            updated_at = now() \
         WHERE id = $1 RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(request_id)
    .bind(input.status)
    .bind(input.assigned_user_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Maintenance request not found.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clauses_follow_field_order() {
        let filter = MaintenanceFilter {
            unit_id: Some(Uuid::new_v4()),
            tenant_id: Some(Uuid::new_v4()),
            status: Some(MaintenanceStatus::Open),
        };
        let query = build_list_query(&filter, 100);
        let sql = query.sql();

        let unit_pos = sql.find("unit_id = ").expect("unit clause");
        let tenant_pos = sql.find("tenant_id = ").expect("tenant clause");
        let status_pos = sql.find("status = ").expect("status clause");
        assert!(unit_pos < tenant_pos);
        assert!(tenant_pos < status_pos);
    }
}
