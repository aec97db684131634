use serde::Serialize;
use uuid::Uuid;

use crate::geo::distance_km;
use crate::models::order::GeoPoint;

#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    /// Order ids in visiting sequence.
    pub stops: Vec<Uuid>,
    pub total_km: f64,
}

/// Greedy nearest-neighbour ordering of the remaining stops, starting from
/// `origin`. Good enough as a local fallback; the external routing provider
/// owns the real turn-by-turn plan.
pub fn plan_route(origin: GeoPoint, stops: &[(Uuid, GeoPoint)]) -> RoutePlan {
    let mut remaining: Vec<(Uuid, GeoPoint)> = stops.to_vec();
    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current = origin;
    let mut total_km = 0.0;

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_km = f64::INFINITY;
        for (i, (_, point)) in remaining.iter().enumerate() {
            let km = distance_km(current, *point);
            if km < best_km {
                best = i;
                best_km = km;
            }
        }

        let (id, point) = remaining.swap_remove(best);
        ordered.push(id);
        total_km += best_km;
        current = point;
    }

    RoutePlan {
        stops: ordered,
        total_km,
    }
}
