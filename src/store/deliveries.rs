use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{
    Delivery, DeliveryOrder, DeliveryStatus, DeliveryWithOrders, LegStatus, transition_touches,
};
use crate::models::order::{GeoPoint, OrderStatus};
use crate::store::orders::fetch_order;
use crate::store::staff::fetch_staff;

/// Creates one shipping trip for a shipper: every named order moves to
/// shipping and gets the shipper assigned, plus one pending leg per order,
/// all inside a single transaction.
pub async fn create_delivery(
    pool: &SqlitePool,
    staff_id: Uuid,
    order_ids: &[Uuid],
) -> Result<DeliveryWithOrders, AppError> {
    if order_ids.is_empty() {
        return Err(AppError::Validation(
            "a delivery needs at least one order".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    fetch_staff(&mut tx, staff_id).await?;

    for &order_id in order_ids {
        let order = fetch_order(&mut tx, order_id).await?;

        if order.status != OrderStatus::Cooked {
            return Err(AppError::Conflict(format!(
                "order {order_id} is {}, only cooked orders can be shipped",
                order.status.as_str()
            )));
        }
        if order.shipper_id.is_some() {
            return Err(AppError::Conflict(format!(
                "order {order_id} is already claimed by a shipper"
            )));
        }

        sqlx::query("UPDATE orders SET status = ?, shipper_id = ? WHERE id = ?")
            .bind(OrderStatus::Shipping)
            .bind(staff_id)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
    }

    let now = Utc::now();
    let delivery = Delivery {
        id: Uuid::new_v4(),
        staff_id,
        status: DeliveryStatus::Shipping,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO deliveries (id, staff_id, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(delivery.id)
    .bind(delivery.staff_id)
    .bind(delivery.status)
    .bind(delivery.created_at)
    .bind(delivery.updated_at)
    .execute(&mut *tx)
    .await?;

    let mut legs = Vec::with_capacity(order_ids.len());
    for &order_id in order_ids {
        let leg = DeliveryOrder {
            id: Uuid::new_v4(),
            delivery_id: delivery.id,
            order_id,
            status: LegStatus::Pending,
            step: 0,
            cancel_note: None,
            geo_lat: None,
            geo_lng: None,
        };

        sqlx::query(
            "INSERT INTO delivery_orders \
             (id, delivery_id, order_id, status, step, cancel_note, geo_lat, geo_lng) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(leg.id)
        .bind(leg.delivery_id)
        .bind(leg.order_id)
        .bind(leg.status)
        .bind(leg.step)
        .bind(leg.cancel_note.as_deref())
        .bind(leg.geo_lat)
        .bind(leg.geo_lng)
        .execute(&mut *tx)
        .await?;

        legs.push(leg);
    }

    tx.commit().await?;

    Ok(DeliveryWithOrders {
        delivery,
        orders: legs,
    })
}

pub async fn fetch_delivery(conn: &mut SqliteConnection, id: Uuid) -> Result<Delivery, AppError> {
    sqlx::query_as::<_, Delivery>("SELECT * FROM deliveries WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))
}

pub async fn fetch_legs(
    conn: &mut SqliteConnection,
    delivery_id: Uuid,
) -> Result<Vec<DeliveryOrder>, AppError> {
    let legs = sqlx::query_as::<_, DeliveryOrder>(
        "SELECT * FROM delivery_orders WHERE delivery_id = ? ORDER BY rowid",
    )
    .bind(delivery_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(legs)
}

pub async fn get_delivery(pool: &SqlitePool, id: Uuid) -> Result<DeliveryWithOrders, AppError> {
    let mut conn = pool.acquire().await?;
    let delivery = fetch_delivery(&mut conn, id).await?;
    let orders = fetch_legs(&mut conn, id).await?;

    Ok(DeliveryWithOrders { delivery, orders })
}

/// Administrative status override. Terminal states are one-way; nothing
/// cascades to the legs or the orders here.
pub async fn update_delivery_status(
    pool: &SqlitePool,
    id: Uuid,
    status: DeliveryStatus,
) -> Result<DeliveryWithOrders, AppError> {
    let mut tx = pool.begin().await?;
    let mut delivery = fetch_delivery(&mut tx, id).await?;

    if delivery.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "delivery {id} is already {}",
            delivery.status.as_str()
        )));
    }

    delivery.status = status;
    delivery.updated_at = Utc::now();

    sqlx::query("UPDATE deliveries SET status = ?, updated_at = ? WHERE id = ?")
        .bind(delivery.status)
        .bind(delivery.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let orders = fetch_legs(&mut tx, id).await?;
    tx.commit().await?;

    Ok(DeliveryWithOrders { delivery, orders })
}

/// Force-closes the whole trip: every leg becomes completed no matter where
/// it was, and so does every contained order.
pub async fn complete_delivery(
    pool: &SqlitePool,
    id: Uuid,
) -> Result<DeliveryWithOrders, AppError> {
    finalize_delivery(pool, id, DeliveryStatus::Completed, None).await
}

/// Cancels the trip. Legs already completed stay completed, and their orders
/// finish as completed; every other leg and its order is cancelled.
pub async fn cancel_delivery(
    pool: &SqlitePool,
    id: Uuid,
    cancel_note: Option<&str>,
) -> Result<DeliveryWithOrders, AppError> {
    finalize_delivery(pool, id, DeliveryStatus::Cancelled, cancel_note).await
}

async fn finalize_delivery(
    pool: &SqlitePool,
    id: Uuid,
    target: DeliveryStatus,
    cancel_note: Option<&str>,
) -> Result<DeliveryWithOrders, AppError> {
    debug_assert!(target.is_terminal());

    let mut tx = pool.begin().await?;
    let mut delivery = fetch_delivery(&mut tx, id).await?;

    if delivery.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "delivery {id} is already {}",
            delivery.status.as_str()
        )));
    }

    let leg_target = match target {
        DeliveryStatus::Cancelled => LegStatus::Cancelled,
        _ => LegStatus::Completed,
    };
    let note = cancel_note.unwrap_or("delivery cancelled");

    let legs = fetch_legs(&mut tx, id).await?;
    for leg in &legs {
        let final_status = if transition_touches(target, leg.status) {
            match leg_target {
                LegStatus::Cancelled => {
                    sqlx::query(
                        "UPDATE delivery_orders SET status = ?, cancel_note = ? WHERE id = ?",
                    )
                    .bind(LegStatus::Cancelled)
                    .bind(note)
                    .bind(leg.id)
                    .execute(&mut *tx)
                    .await?;
                }
                _ => {
                    sqlx::query("UPDATE delivery_orders SET status = ? WHERE id = ?")
                        .bind(LegStatus::Completed)
                        .bind(leg.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
            leg_target
        } else {
            leg.status
        };

        // Orders reconcile at finalisation: a delivered leg completes its
        // order, a cancelled leg cancels it. A completed order is never
        // pulled back, which the WHERE clause enforces at write time.
        match final_status {
            LegStatus::Completed => {
                sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status <> ?")
                    .bind(OrderStatus::Completed)
                    .bind(leg.order_id)
                    .bind(OrderStatus::Cancelled)
                    .execute(&mut *tx)
                    .await?;
            }
            LegStatus::Cancelled => {
                sqlx::query(
                    "UPDATE orders SET status = ?, cancelled_reason = ? \
                     WHERE id = ? AND status <> ?",
                )
                .bind(OrderStatus::Cancelled)
                .bind(note)
                .bind(leg.order_id)
                .bind(OrderStatus::Completed)
                .execute(&mut *tx)
                .await?;
            }
            LegStatus::Pending | LegStatus::Shipping => {}
        }
    }

    delivery.status = target;
    delivery.updated_at = Utc::now();

    sqlx::query("UPDATE deliveries SET status = ?, updated_at = ? WHERE id = ?")
        .bind(delivery.status)
        .bind(delivery.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let orders = fetch_legs(&mut tx, id).await?;
    tx.commit().await?;

    Ok(DeliveryWithOrders { delivery, orders })
}

pub async fn fetch_leg(conn: &mut SqliteConnection, id: Uuid) -> Result<DeliveryOrder, AppError> {
    sqlx::query_as::<_, DeliveryOrder>("SELECT * FROM delivery_orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("delivery order {id} not found")))
}

/// The shipper heads out for this stop. Touches this one leg row only.
pub async fn start_leg(
    pool: &SqlitePool,
    id: Uuid,
    geo: Option<GeoPoint>,
) -> Result<DeliveryOrder, AppError> {
    let mut tx = pool.begin().await?;
    let mut leg = fetch_leg(&mut tx, id).await?;

    if leg.status != LegStatus::Pending {
        return Err(AppError::Conflict(format!(
            "delivery order {id} is {}, only a pending leg can start",
            leg.status.as_str()
        )));
    }

    leg.status = LegStatus::Shipping;
    if let Some(p) = geo {
        leg.geo_lat = Some(p.lat);
        leg.geo_lng = Some(p.lng);
    }

    write_leg(&mut tx, &leg).await?;
    tx.commit().await?;

    Ok(leg)
}

/// Marks this stop delivered. Both the plain and the geolocation-aware
/// entry points land here; the coordinates are recorded when present.
pub async fn complete_leg(
    pool: &SqlitePool,
    id: Uuid,
    geo: Option<GeoPoint>,
) -> Result<DeliveryOrder, AppError> {
    let mut tx = pool.begin().await?;
    let mut leg = fetch_leg(&mut tx, id).await?;

    if leg.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "delivery order {id} is already {}",
            leg.status.as_str()
        )));
    }

    leg.status = LegStatus::Completed;
    if let Some(p) = geo {
        leg.geo_lat = Some(p.lat);
        leg.geo_lng = Some(p.lng);
    }

    write_leg(&mut tx, &leg).await?;
    tx.commit().await?;

    Ok(leg)
}

/// Cancels this stop with a mandatory reason (customer unreachable, wrong
/// address, ...). The parent delivery is finalised separately.
pub async fn cancel_leg(
    pool: &SqlitePool,
    id: Uuid,
    cancel_note: &str,
    geo: Option<GeoPoint>,
) -> Result<DeliveryOrder, AppError> {
    if cancel_note.trim().is_empty() {
        return Err(AppError::Validation(
            "a cancellation note is required".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;
    let mut leg = fetch_leg(&mut tx, id).await?;

    if leg.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "delivery order {id} is already {}",
            leg.status.as_str()
        )));
    }

    leg.status = LegStatus::Cancelled;
    leg.cancel_note = Some(cancel_note.to_string());
    if let Some(p) = geo {
        leg.geo_lat = Some(p.lat);
        leg.geo_lng = Some(p.lng);
    }

    write_leg(&mut tx, &leg).await?;
    tx.commit().await?;

    Ok(leg)
}

async fn write_leg(conn: &mut SqliteConnection, leg: &DeliveryOrder) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE delivery_orders \
         SET status = ?, step = ?, cancel_note = ?, geo_lat = ?, geo_lng = ? \
         WHERE id = ?",
    )
    .bind(leg.status)
    .bind(leg.step)
    .bind(leg.cancel_note.as_deref())
    .bind(leg.geo_lat)
    .bind(leg.geo_lng)
    .bind(leg.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
