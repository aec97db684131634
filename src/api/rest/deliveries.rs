use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::staff_id;
use crate::auth::{Permission, require_permissions};
use crate::engine::routing::{RoutePlan, plan_route};
use crate::error::AppError;
use crate::models::delivery::{DeliveryOrder, DeliveryStatus, DeliveryWithOrders};
use crate::models::event::StatusEvent;
use crate::models::order::GeoPoint;
use crate::state::AppState;
use crate::store::{deliveries, orders};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/deliveries/:id/complete", post(complete_delivery))
        .route("/deliveries/:id/cancel", post(cancel_delivery))
        .route("/deliveries/:id/route", get(route_plan))
        .route("/delivery-orders/:id/start", post(start_leg))
        .route("/delivery-orders/:id/complete", post(complete_leg))
        .route("/delivery-orders/:id/cancel", post(cancel_leg))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    /// The shipper who takes the trip.
    pub staff_id: Uuid,
    pub order_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
}

#[derive(Deserialize, Default)]
pub struct CancelDeliveryRequest {
    pub cancel_note: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LegPositionRequest {
    pub geo: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct CancelLegRequest {
    pub cancel_note: String,
    pub geo: Option<GeoPoint>,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<DeliveryWithOrders>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(
        &state.pool,
        &state.config,
        actor,
        &[Permission::ManageDeliveries],
    )
    .await?;

    let delivery =
        deliveries::create_delivery(&state.pool, payload.staff_id, &payload.order_ids).await?;

    state.metrics.deliveries_total.with_label_values(&["created"]).inc();
    state.emit(StatusEvent::Delivery {
        id: delivery.delivery.id,
        status: delivery.delivery.status,
    });

    Ok(Json(delivery))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryWithOrders>, AppError> {
    Ok(Json(deliveries::get_delivery(&state.pool, id).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<DeliveryWithOrders>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(
        &state.pool,
        &state.config,
        actor,
        &[Permission::ManageDeliveries],
    )
    .await?;

    let delivery = deliveries::update_delivery_status(&state.pool, id, payload.status).await?;
    state.emit(StatusEvent::Delivery {
        id: delivery.delivery.id,
        status: delivery.delivery.status,
    });

    Ok(Json(delivery))
}

async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<DeliveryWithOrders>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(
        &state.pool,
        &state.config,
        actor,
        &[Permission::ManageDeliveries],
    )
    .await?;

    let delivery = deliveries::complete_delivery(&state.pool, id).await?;

    state.metrics.deliveries_total.with_label_values(&["completed"]).inc();
    state.emit(StatusEvent::Delivery {
        id: delivery.delivery.id,
        status: delivery.delivery.status,
    });

    Ok(Json(delivery))
}

async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<CancelDeliveryRequest>>,
) -> Result<Json<DeliveryWithOrders>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(
        &state.pool,
        &state.config,
        actor,
        &[Permission::ManageDeliveries],
    )
    .await?;

    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let delivery =
        deliveries::cancel_delivery(&state.pool, id, payload.cancel_note.as_deref()).await?;

    state.metrics.deliveries_total.with_label_values(&["cancelled"]).inc();
    state.emit(StatusEvent::Delivery {
        id: delivery.delivery.id,
        status: delivery.delivery.status,
    });

    Ok(Json(delivery))
}

/// Visiting order for the trip's remaining stops, starting from the shop.
async fn route_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoutePlan>, AppError> {
    let detail = deliveries::get_delivery(&state.pool, id).await?;

    let mut conn = state.pool.acquire().await?;
    let mut stops = Vec::new();
    for leg in &detail.orders {
        if leg.status.is_terminal() {
            continue;
        }

        let order = orders::fetch_order(&mut conn, leg.order_id).await?;
        let point = order.dropoff().ok_or_else(|| {
            AppError::Upstream(format!(
                "order {} has no geocoded dropoff location",
                order.id
            ))
        })?;
        stops.push((order.id, point));
    }

    Ok(Json(plan_route(state.config.shop_location, &stops)))
}

async fn start_leg(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<LegPositionRequest>>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(&state.pool, &state.config, actor, &[Permission::ShipOrders]).await?;

    let geo = payload.map(|Json(p)| p.geo).unwrap_or_default();
    let leg = deliveries::start_leg(&state.pool, id, geo).await?;

    state.metrics.delivery_legs_total.with_label_values(&["started"]).inc();
    emit_leg(&state, &leg);

    Ok(Json(leg))
}

async fn complete_leg(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<LegPositionRequest>>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(&state.pool, &state.config, actor, &[Permission::ShipOrders]).await?;

    let geo = payload.map(|Json(p)| p.geo).unwrap_or_default();
    let leg = deliveries::complete_leg(&state.pool, id, geo).await?;

    state.metrics.delivery_legs_total.with_label_values(&["completed"]).inc();
    emit_leg(&state, &leg);

    Ok(Json(leg))
}

async fn cancel_leg(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CancelLegRequest>,
) -> Result<Json<DeliveryOrder>, AppError> {
    let actor = staff_id(&headers)?;
    require_permissions(&state.pool, &state.config, actor, &[Permission::ShipOrders]).await?;

    let leg = deliveries::cancel_leg(&state.pool, id, &payload.cancel_note, payload.geo).await?;

    state.metrics.delivery_legs_total.with_label_values(&["cancelled"]).inc();
    emit_leg(&state, &leg);

    Ok(Json(leg))
}

fn emit_leg(state: &AppState, leg: &DeliveryOrder) {
    state.emit(StatusEvent::DeliveryOrder {
        id: leg.id,
        delivery_id: leg.delivery_id,
        status: leg.status,
    });
}
