use sqlx::SqlitePool;

use crate::error::AppError;

/// Minutes before a pending order is swept; absent means the sweep is off.
pub const AUTO_CANCEL_MINUTES: &str = "autoCancelOrderAfter";

pub async fn get_setting(pool: &SqlitePool, name: &str) -> Result<Option<String>, AppError> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

pub async fn set_setting(pool: &SqlitePool, name: &str, value: &str) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO settings (name, value) VALUES (?, ?) \
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
    )
    .bind(name)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
