use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::auth::Permission;
use crate::error::AppError;
use crate::models::staff::Staff;

pub async fn fetch_staff(conn: &mut SqliteConnection, id: Uuid) -> Result<Staff, AppError> {
    sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("staff {id} not found")))
}

/// Effective permission set, through the staff member's role.
pub async fn staff_permissions(
    conn: &mut SqliteConnection,
    staff_id: Uuid,
) -> Result<Vec<Permission>, AppError> {
    let permissions = sqlx::query_scalar::<_, Permission>(
        "SELECT rp.permission FROM role_permissions rp \
         JOIN staff s ON s.role_id = rp.role_id \
         WHERE s.id = ?",
    )
    .bind(staff_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(permissions)
}

pub async fn create_role(
    pool: &SqlitePool,
    name: &str,
    permissions: &[Permission],
) -> Result<Uuid, AppError> {
    let mut tx = pool.begin().await?;
    let role_id = Uuid::new_v4();

    sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
        .bind(role_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

    for &permission in permissions {
        sqlx::query("INSERT INTO role_permissions (role_id, permission) VALUES (?, ?)")
            .bind(role_id)
            .bind(permission)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(role_id)
}

pub async fn create_staff(
    pool: &SqlitePool,
    username: &str,
    role_id: Uuid,
) -> Result<Staff, AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Validation("username cannot be empty".to_string()));
    }

    let staff = Staff {
        id: Uuid::new_v4(),
        username: username.to_string(),
        role_id,
    };

    sqlx::query("INSERT INTO staff (id, username, role_id) VALUES (?, ?, ?)")
        .bind(staff.id)
        .bind(&staff.username)
        .bind(staff.role_id)
        .execute(pool)
        .await?;

    Ok(staff)
}
