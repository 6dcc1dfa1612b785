pub mod bills;
pub mod inventory;
pub mod leases;
pub mod maintenance;
pub mod payments;
pub mod properties;
pub mod tenants;
pub mod units;
pub mod users;

use crate::error::AppError;

pub(crate) fn map_db_error(error: sqlx::Error) -> AppError {
    let message = error.to_string();
    tracing::error!(db_error = %message, "Database query failed");

    if message.contains("23505")
        || message
            .to_ascii_lowercase()
            .contains("duplicate key value violates unique constraint")
    {
        return AppError::Conflict("Duplicate value violates a unique constraint.".to_string());
    }
    AppError::Dependency("Database operation failed.".to_string())
}
