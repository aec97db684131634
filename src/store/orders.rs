use chrono::{Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{GeoPoint, Order, OrderStatus, PaymentStatus};

pub struct NewOrder {
    pub customer_id: Uuid,
    pub total_amount: i64,
    pub dropoff: Option<GeoPoint>,
}

pub async fn create_order(pool: &SqlitePool, new: NewOrder) -> Result<Order, AppError> {
    let order = Order {
        id: Uuid::new_v4(),
        customer_id: new.customer_id,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Unpaid,
        total_amount: new.total_amount,
        shipper_id: None,
        chef_id: None,
        cancelled_reason: None,
        dropoff_lat: new.dropoff.map(|p| p.lat),
        dropoff_lng: new.dropoff.map(|p| p.lng),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO orders \
         (id, customer_id, status, payment_status, total_amount, shipper_id, chef_id, \
          cancelled_reason, dropoff_lat, dropoff_lng, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order.id)
    .bind(order.customer_id)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.total_amount)
    .bind(order.shipper_id)
    .bind(order.chef_id)
    .bind(order.cancelled_reason.as_deref())
    .bind(order.dropoff_lat)
    .bind(order.dropoff_lng)
    .bind(order.created_at)
    .execute(pool)
    .await?;

    Ok(order)
}

pub async fn fetch_order(conn: &mut SqliteConnection, id: Uuid) -> Result<Order, AppError> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
}

pub async fn get_order(pool: &SqlitePool, id: Uuid) -> Result<Order, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_order(&mut conn, id).await
}

pub async fn list_orders(
    pool: &SqlitePool,
    status: Option<OrderStatus>,
) -> Result<Vec<Order>, AppError> {
    let orders = match status {
        Some(status) => {
            sqlx::query_as::<_, Order>(
                "SELECT * FROM orders WHERE status = ? ORDER BY created_at",
            )
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at")
                .fetch_all(pool)
                .await?
        }
    };

    Ok(orders)
}

/// A chef claims a pending order and starts preparing it.
pub async fn start_cooking(
    pool: &SqlitePool,
    order_id: Uuid,
    chef_id: Uuid,
) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;
    let order = fetch_order(&mut tx, order_id).await?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::Conflict(format!(
            "order {order_id} is {}, only a pending order can start cooking",
            order.status.as_str()
        )));
    }

    sqlx::query("UPDATE orders SET status = ?, chef_id = ? WHERE id = ?")
        .bind(OrderStatus::Cooking)
        .bind(chef_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Order {
        status: OrderStatus::Cooking,
        chef_id: Some(chef_id),
        ..order
    })
}

pub async fn finish_cooking(pool: &SqlitePool, order_id: Uuid) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;
    let order = fetch_order(&mut tx, order_id).await?;

    if order.status != OrderStatus::Cooking {
        return Err(AppError::Conflict(format!(
            "order {order_id} is {}, only a cooking order can be marked cooked",
            order.status.as_str()
        )));
    }

    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(OrderStatus::Cooked)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Order {
        status: OrderStatus::Cooked,
        ..order
    })
}

/// Direct staff cancellation. Allowed before the order leaves the shop;
/// orders out on a trip are cancelled through their delivery instead.
pub async fn cancel_order(
    pool: &SqlitePool,
    order_id: Uuid,
    reason: &str,
) -> Result<Order, AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::Validation(
            "a cancellation reason is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let order = fetch_order(&mut tx, order_id).await?;

    let cancellable = matches!(
        order.status,
        OrderStatus::Pending | OrderStatus::Cooking | OrderStatus::Cooked
    );
    if !cancellable {
        return Err(AppError::Conflict(format!(
            "order {order_id} is {} and can no longer be cancelled directly",
            order.status.as_str()
        )));
    }

    sqlx::query("UPDATE orders SET status = ?, cancelled_reason = ? WHERE id = ?")
        .bind(OrderStatus::Cancelled)
        .bind(reason)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Order {
        status: OrderStatus::Cancelled,
        cancelled_reason: Some(reason.to_string()),
        ..order
    })
}

pub async fn mark_paid(pool: &SqlitePool, order_id: Uuid) -> Result<Order, AppError> {
    let mut tx = pool.begin().await?;
    let order = fetch_order(&mut tx, order_id).await?;

    if order.payment_status != PaymentStatus::Unpaid {
        return Err(AppError::Conflict(format!(
            "order {order_id} is already paid"
        )));
    }

    sqlx::query("UPDATE orders SET payment_status = ? WHERE id = ?")
        .bind(PaymentStatus::Paid)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Order {
        payment_status: PaymentStatus::Paid,
        ..order
    })
}

/// Bulk-cancel every order still pending after the threshold. The WHERE
/// clause re-filters at write time, so an order a customer or chef moved
/// concurrently is simply excluded from the update.
pub async fn auto_cancel_stale(
    pool: &SqlitePool,
    threshold_minutes: i64,
) -> Result<u64, AppError> {
    let cutoff = Utc::now() - Duration::minutes(threshold_minutes);
    let reason =
        format!("automatically cancelled after {threshold_minutes} minutes without confirmation");

    let result = sqlx::query(
        "UPDATE orders SET status = ?, cancelled_reason = ? \
         WHERE status = ? AND created_at < ?",
    )
    .bind(OrderStatus::Cancelled)
    .bind(&reason)
    .bind(OrderStatus::Pending)
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
