use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::Property;
use crate::schemas::{CreatePropertyInput, UpdatePropertyInput};

fn build_list_query(include_archived: bool, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT id, name, address, city, deleted_at, created_at, updated_at \
         FROM properties WHERE 1=1",
    );
    if !include_archived {
        query.push(" AND deleted_at IS NULL");
    }
    query.push(" ORDER BY created_at DESC LIMIT ").push_bind(limit);
    query
}

pub async fn list(pool: &PgPool, include_archived: bool, limit: i64) -> AppResult<Vec<Property>> {
    build_list_query(include_archived, limit)
        .build_query_as::<Property>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, property_id: Uuid) -> AppResult<Property> {
    sqlx::query_as::<_, Property>(
        "SELECT id, name, address, city, deleted_at, created_at, updated_at \
         FROM properties WHERE id = $1",
    )
    .bind(property_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

pub async fn get_tx(conn: &mut PgConnection, property_id: Uuid) -> AppResult<Property> {
    sqlx::query_as::<_, Property>(
        "SELECT id, name, address, city, deleted_at, created_at, updated_at \
         FROM properties WHERE id = $1 FOR UPDATE",
    )
    .bind(property_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

pub async fn insert(pool: &PgPool, input: &CreatePropertyInput) -> AppResult<Property> {
    sqlx::query_as::<_, Property>(
        "INSERT INTO properties (name, address, city) VALUES ($1, $2, $3) \
         RETURNING id, name, address, city, deleted_at, created_at, updated_at",
    )
    .bind(&input.name)
    .bind(&input.address)
    .bind(&input.city)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

pub async fn update(
    pool: &PgPool,
    property_id: Uuid,
    input: &UpdatePropertyInput,
) -> AppResult<Property> {
    sqlx::query_as::<_, Property>(
        "UPDATE properties SET \
            name = COALESCE($2, name), \
            address = COALESCE($3, address), \
            city = COALESCE($4, city), \
            updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING id, name, address, city, deleted_at, created_at, updated_at",
    )
    .bind(property_id)
    .bind(&input.name)
    .bind(&input.address)
    .bind(&input.city)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

pub async fn set_archived_tx(
    conn: &mut PgConnection,
    property_id: Uuid,
    archived: bool,
) -> AppResult<Property> {
    let sql = if archived {
        "UPDATE properties SET deleted_at = now(), updated_at = now() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING id, name, address, city, deleted_at, created_at, updated_at"
    } else {
        "UPDATE properties SET deleted_at = NULL, updated_at = now() \
         WHERE id = $1 AND deleted_at IS NOT NULL \
         RETURNING id, name, address, city, deleted_at, created_at, updated_at"
    };
    sqlx::query_as::<_, Property>(sql)
        .bind(property_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("Property not found.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_hides_archived_by_default() {
        let query = build_list_query(false, 100);
        assert!(query.sql().contains("deleted_at IS NULL"));

        let query = build_list_query(true, 100);
        assert!(!query.sql().contains("deleted_at IS NULL"));
    }
}
