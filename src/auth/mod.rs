use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::store::staff;

/// The closed set of back-office permissions. Stored as snake_case text in
/// `role_permissions`; a row that does not decode into one of these is a
/// database error, not a silent pass.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Permission {
    ManageProducts,
    ManageMaterials,
    ManageImports,
    ManageStaff,
    ManageOrders,
    ManageDeliveries,
    CookOrders,
    ShipOrders,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ManageProducts => "manage_products",
            Permission::ManageMaterials => "manage_materials",
            Permission::ManageImports => "manage_imports",
            Permission::ManageStaff => "manage_staff",
            Permission::ManageOrders => "manage_orders",
            Permission::ManageDeliveries => "manage_deliveries",
            Permission::CookOrders => "cook_orders",
            Permission::ShipOrders => "ship_orders",
        }
    }
}

/// required − held, deduplicated, in enum order.
pub fn missing_permissions(required: &[Permission], held: &[Permission]) -> Vec<Permission> {
    let held: BTreeSet<Permission> = held.iter().copied().collect();

    required
        .iter()
        .copied()
        .filter(|p| !held.contains(p))
        .collect::<BTreeSet<Permission>>()
        .into_iter()
        .collect()
}

/// Fails with a not-found error when the staff row is missing, a forbidden
/// error when any required permission is not held, and passes silently
/// otherwise. The configured super account skips the check entirely while
/// the bypass flag is on.
pub async fn require_permissions(
    pool: &SqlitePool,
    config: &Config,
    staff_id: Uuid,
    required: &[Permission],
) -> Result<(), AppError> {
    let mut conn = pool.acquire().await?;
    let staff = staff::fetch_staff(&mut conn, staff_id).await?;

    if config.permission_bypass && config.super_account.as_deref() == Some(staff.username.as_str())
    {
        warn!(staff = %staff.username, "permission check bypassed for super account");
        return Ok(());
    }

    let held = staff::staff_permissions(&mut conn, staff_id).await?;
    let missing = missing_permissions(required, &held);
    if missing.is_empty() {
        return Ok(());
    }

    let message = if config.verbose_permission_errors {
        let names: Vec<&str> = missing.iter().map(|p| p.as_str()).collect();
        format!("missing permissions: {}", names.join(", "))
    } else {
        "you do not have permission to perform this action".to_string()
    };

    Err(AppError::Forbidden(message))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Permission, missing_permissions, require_permissions};
    use crate::config::Config;
    use crate::db;
    use crate::error::AppError;
    use crate::models::order::GeoPoint;
    use crate::store::staff::{create_role, create_staff};

    fn test_config() -> Config {
        Config {
            http_port: 0,
            log_level: "info".to_string(),
            database_url: "sqlite::memory:".to_string(),
            sweep_interval_secs: 60,
            event_buffer_size: 16,
            shop_location: GeoPoint {
                lat: 21.0278,
                lng: 105.8342,
            },
            permission_bypass: false,
            super_account: None,
            verbose_permission_errors: true,
        }
    }

    #[test]
    fn difference_is_empty_when_everything_is_held() {
        let held = [Permission::ManageOrders, Permission::ManageDeliveries];
        assert!(missing_permissions(&[Permission::ManageOrders], &held).is_empty());
        assert!(missing_permissions(&[], &held).is_empty());
    }

    #[test]
    fn difference_lists_only_what_is_missing() {
        let held = [Permission::CookOrders];
        let missing = missing_permissions(
            &[Permission::CookOrders, Permission::ShipOrders, Permission::ShipOrders],
            &held,
        );
        assert_eq!(missing, vec![Permission::ShipOrders]);
    }

    #[tokio::test]
    async fn unknown_staff_is_not_found_not_forbidden() {
        let pool = db::connect_in_memory().await.unwrap();
        let err = require_permissions(&pool, &test_config(), Uuid::new_v4(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_permission_is_forbidden_and_enumerated() {
        let pool = db::connect_in_memory().await.unwrap();
        let role = create_role(&pool, "kitchen", &[Permission::CookOrders])
            .await
            .unwrap();
        let staff = create_staff(&pool, "chef-anna", role).await.unwrap();

        let err = require_permissions(
            &pool,
            &test_config(),
            staff.id,
            &[Permission::CookOrders, Permission::ManageDeliveries],
        )
        .await
        .unwrap_err();

        match err {
            AppError::Forbidden(msg) => {
                assert!(msg.contains("manage_deliveries"));
                assert!(!msg.contains("cook_orders"));
            }
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terse_message_hides_the_names() {
        let pool = db::connect_in_memory().await.unwrap();
        let role = create_role(&pool, "kitchen", &[]).await.unwrap();
        let staff = create_staff(&pool, "chef-bo", role).await.unwrap();

        let config = Config {
            verbose_permission_errors: false,
            ..test_config()
        };
        let err = require_permissions(&pool, &config, staff.id, &[Permission::ShipOrders])
            .await
            .unwrap_err();

        match err {
            AppError::Forbidden(msg) => assert!(!msg.contains("ship_orders")),
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn super_account_bypasses_only_while_the_flag_is_on() {
        let pool = db::connect_in_memory().await.unwrap();
        let role = create_role(&pool, "empty", &[]).await.unwrap();
        let staff = create_staff(&pool, "root", role).await.unwrap();

        let bypassed = Config {
            permission_bypass: true,
            super_account: Some("root".to_string()),
            ..test_config()
        };
        require_permissions(&pool, &bypassed, staff.id, &[Permission::ManageStaff])
            .await
            .unwrap();

        let checked = Config {
            permission_bypass: false,
            super_account: Some("root".to_string()),
            ..test_config()
        };
        let err = require_permissions(&pool, &checked, staff.id, &[Permission::ManageStaff])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
