use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::InventoryItem;
use crate::schemas::CreateInventoryItemInput;

const ITEM_COLUMNS: &str = "id, property_id, name, quantity, unit_cost, created_at, updated_at";

#[derive(Debug, Default, Clone)]
pub struct InventoryFilter {
    pub property_id: Option<Uuid>,
}

fn build_list_query(filter: &InventoryFilter, limit: i64) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::<Postgres>::new(format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE 1=1"
    ));
    if let Some(property_id) = filter.property_id {
        query.push(" AND property_id = ").push_bind(property_id);
    }
    query.push(" ORDER BY name ASC LIMIT ").push_bind(limit);
    query
}

pub async fn list(
    pool: &PgPool,
    filter: &InventoryFilter,
    limit: i64,
) -> AppResult<Vec<InventoryItem>> {
    build_list_query(filter, limit)
        .build_query_as::<InventoryItem>()
        .fetch_all(pool)
        .await
        .map_err(map_db_error)
}

pub async fn get(pool: &PgPool, item_id: Uuid) -> AppResult<InventoryItem> {
    sqlx::query_as::<_, InventoryItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1"
    ))
    .bind(item_id)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("Inventory item not found.".to_string()))
}

pub async fn insert(pool: &PgPool, input: &CreateInventoryItemInput) -> AppResult<InventoryItem> {
    sqlx::query_as::<_, InventoryItem>(&format!(
        "INSERT INTO inventory_items (property_id, name, quantity, unit_cost) \
         VALUES ($1, $2, $3, $4) RETURNING {ITEM_COLUMNS}"
    ))
    .bind(input.property_id)
    .bind(&input.name)
    .bind(input.quantity)
    .bind(input.unit_cost)
    .fetch_one(pool)
    .await
    .map_err(map_db_error)
}

/// Apply a signed stock adjustment. The WHERE guard keeps quantity from ever
/// going negative; a rejected adjustment surfaces as BadRequest.
pub async fn adjust_quantity(
    pool: &PgPool,
    item_id: Uuid,
    delta: i32,
) -> AppResult<InventoryItem> {
    let adjusted = sqlx::query_as::<_, InventoryItem>(&format!(
        "UPDATE inventory_items SET quantity = quantity + $2, updated_at = now() \
         WHERE id = $1 AND quantity + $2 >= 0 RETURNING {ITEM_COLUMNS}"
    ))
    .bind(item_id)
    .bind(delta)
    .fetch_optional(pool)
    .await
    .map_err(map_db_error)?;

    match adjusted {
        Some(item) => Ok(item),
        None => {
            // Distinguish a missing item from an over-issue.
            get(pool, item_id).await?;
            Err(AppError::BadRequest(
                "Adjustment would make the stock quantity negative.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_scopes_to_property() {
        let filter = InventoryFilter {
            property_id: Some(Uuid::new_v4()),
        };
        let query = build_list_query(&filter, 100);
        assert!(query.sql().contains("property_id = "));

        let query = build_list_query(&InventoryFilter::default(), 100);
        assert!(!query.sql().contains("property_id = "));
    }
}
