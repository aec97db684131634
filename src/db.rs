use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::AppError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id BLOB PRIMARY KEY,
    customer_id BLOB NOT NULL,
    status TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    total_amount INTEGER NOT NULL,
    shipper_id BLOB,
    chef_id BLOB,
    cancelled_reason TEXT,
    dropoff_lat REAL,
    dropoff_lng REAL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deliveries (
    id BLOB PRIMARY KEY,
    staff_id BLOB NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS delivery_orders (
    id BLOB PRIMARY KEY,
    delivery_id BLOB NOT NULL REFERENCES deliveries(id),
    order_id BLOB NOT NULL REFERENCES orders(id),
    status TEXT NOT NULL,
    step INTEGER NOT NULL DEFAULT 0,
    cancel_note TEXT,
    geo_lat REAL,
    geo_lng REAL
);

CREATE TABLE IF NOT EXISTS roles (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS staff (
    id BLOB PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    role_id BLOB NOT NULL REFERENCES roles(id)
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id BLOB NOT NULL REFERENCES roles(id),
    permission TEXT NOT NULL,
    PRIMARY KEY (role_id, permission)
);

CREATE TABLE IF NOT EXISTS settings (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
CREATE INDEX IF NOT EXISTS idx_delivery_orders_delivery ON delivery_orders(delivery_id);
"#;

pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; with more than one connection each
/// `sqlite::memory:` connection would see its own empty database.
pub async fn connect_in_memory() -> Result<SqlitePool, AppError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
