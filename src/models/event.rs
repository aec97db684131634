use serde::Serialize;
use uuid::Uuid;

use crate::models::delivery::{DeliveryStatus, LegStatus};
use crate::models::order::OrderStatus;

/// Broadcast to websocket subscribers whenever an entity changes status.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum StatusEvent {
    Order { id: Uuid, status: OrderStatus },
    Delivery { id: Uuid, status: DeliveryStatus },
    DeliveryOrder { id: Uuid, delivery_id: Uuid, status: LegStatus },
}
