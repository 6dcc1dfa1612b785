use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::map_db_error;
use crate::error::{AppError, AppResult};
use crate::models::{AppUser, Role};

const USER_COLUMNS: &str =
    "id, email, full_name, phone, password_hash, role, is_active, created_at, updated_at";

pub async fn get(pool: &PgPool, user_id: Uuid) -> AppResult<AppUser> {
    sqlx::query_as::<_, AppUser>(&format!("SELECT {USER_COLUMNS} FROM app_users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

pub async fn find_by_email_tx(
    conn: &mut PgConnection,
    email: &str,
) -> AppResult<Option<AppUser>> {
    sqlx::query_as::<_, AppUser>(&format!(
        "SELECT {USER_COLUMNS} FROM app_users WHERE lower(email) = lower($1)"
    ))
    .bind(email)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn insert_tx(
    conn: &mut PgConnection,
    email: &str,
    full_name: &str,
    phone: Option<&str>,
    password_hash: &str,
    role: Role,
) -> AppResult<AppUser> {
    sqlx::query_as::<_, AppUser>(&format!(
        "INSERT INTO app_users (email, full_name, phone, password_hash, role) \
         VALUES (lower($1), $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(full_name)
    .bind(phone)
    .bind(password_hash)
    .bind(role)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_db_error)
}

pub async fn set_active_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    is_active: bool,
) -> AppResult<AppUser> {
    sqlx::query_as::<_, AppUser>(&format!(
        "UPDATE app_users SET is_active = $2, updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(is_active)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_db_error)?
    .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}
