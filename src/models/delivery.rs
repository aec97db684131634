use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Shipping,
    Completed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Shipping => "shipping",
            DeliveryStatus::Completed => "completed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LegStatus {
    Pending,
    Shipping,
    Completed,
    Cancelled,
}

impl LegStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LegStatus::Completed | LegStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LegStatus::Pending => "pending",
            LegStatus::Shipping => "shipping",
            LegStatus::Completed => "completed",
            LegStatus::Cancelled => "cancelled",
        }
    }
}

/// Which legs a delivery-level transition touches. Completion force-closes
/// every leg; cancellation leaves already-completed legs as they are. Both
/// finalisation paths go through this one predicate.
pub fn transition_touches(target: DeliveryStatus, leg: LegStatus) -> bool {
    match target {
        DeliveryStatus::Completed => true,
        DeliveryStatus::Cancelled => leg != LegStatus::Completed,
        DeliveryStatus::Shipping => false,
    }
}

/// One shipping trip: a batch of orders assigned to a single shipper.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Delivery {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The per-order leg of a delivery. `step` indexes into the route plan
/// computed by the external routing provider. The geo columns hold the
/// shipper's last reported position, when the client sends one.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryOrder {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub status: LegStatus,
    pub step: i64,
    pub cancel_note: Option<String>,
    pub geo_lat: Option<f64>,
    pub geo_lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryWithOrders {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub orders: Vec<DeliveryOrder>,
}
