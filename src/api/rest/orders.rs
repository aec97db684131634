use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::staff_id;
use crate::auth::{Permission, require_permissions};
use crate::error::AppError;
use crate::models::event::StatusEvent;
use crate::models::order::{GeoPoint, Order, OrderStatus};
use crate::state::AppState;
use crate::store::orders::{self, NewOrder};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/pay", post(pay_order))
        .route("/orders/:id/cook", post(start_cooking))
        .route("/orders/:id/cooked", post(finish_cooking))
        .route("/orders/:id/cancel", post(cancel_order))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub total_amount: i64,
    pub dropoff: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.total_amount <= 0 {
        return Err(AppError::Validation(
            "total_amount must be positive".to_string(),
        ));
    }

    let order = orders::create_order(
        &state.pool,
        NewOrder {
            customer_id: payload.customer_id,
            total_amount: payload.total_amount,
            dropoff: payload.dropoff,
        },
    )
    .await?;

    state.emit(StatusEvent::Order {
        id: order.id,
        status: order.status,
    });

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(orders::get_order(&state.pool, id).await?))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(orders::list_orders(&state.pool, query.status).await?))
}

async fn pay_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(orders::mark_paid(&state.pool, id).await?))
}

/// The caller is the chef taking the order.
async fn start_cooking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Order>, AppError> {
    let chef = staff_id(&headers)?;
    require_permissions(&state.pool, &state.config, chef, &[Permission::CookOrders]).await?;

    let order = orders::start_cooking(&state.pool, id, chef).await?;
    state.emit(StatusEvent::Order {
        id: order.id,
        status: order.status,
    });

    Ok(Json(order))
}

async fn finish_cooking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Order>, AppError> {
    let chef = staff_id(&headers)?;
    require_permissions(&state.pool, &state.config, chef, &[Permission::CookOrders]).await?;

    let order = orders::finish_cooking(&state.pool, id).await?;
    state.emit(StatusEvent::Order {
        id: order.id,
        status: order.status,
    });

    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CancelOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let staff = staff_id(&headers)?;
    require_permissions(&state.pool, &state.config, staff, &[Permission::ManageOrders]).await?;

    let order = orders::cancel_order(&state.pool, id, &payload.reason).await?;
    state.emit(StatusEvent::Order {
        id: order.id,
        status: order.status,
    });

    Ok(Json(order))
}
