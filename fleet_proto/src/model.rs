use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a fleet vehicle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub String);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VehicleId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier for a battery-swap station.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId(pub String);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier for a customer order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier for a swappable battery pack.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatteryId(pub String);

impl fmt::Display for BatteryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BatteryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A WGS-84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both components are real numbers (neither NaN nor infinite).
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Reference from a vehicle to the work it is currently serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentRef {
    Order(OrderId),
    SwapSchedule(String),
}

/// One vehicle as shown on the live map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: VehicleId,
    pub position: LatLon,
    /// Product-specific status string, carried verbatim.
    pub status: String,
    /// Charge percentage of the mounted battery, clamped to 0..=100.
    pub battery_percent: f64,
    pub online_status: String,
    pub assignment: Option<AssignmentRef>,
}

/// One battery-swap station and its slot occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationState {
    pub id: StationId,
    pub name: String,
    pub address: String,
    pub position: LatLon,
    pub total_slots: u32,
    /// Batteries currently occupying slots, in feed order.
    pub occupied: Vec<BatteryId>,
    /// Occupied batteries at or above the ready threshold.
    pub ready_batteries: u32,
    /// Occupied batteries still below the ready threshold.
    pub charging_batteries: u32,
    /// The feed reported more occupied slots than `total_slots`.
    pub over_capacity: bool,
}

impl StationState {
    /// Slots left after occupancy; zero when the feed over-reports.
    pub fn free_slots(&self) -> u32 {
        self.total_slots.saturating_sub(self.occupied.len() as u32)
    }
}

/// Detail record for one battery pack, kept for joins and detail panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    pub id: BatteryId,
    pub capacity: f64,
    /// Charge percentage as reported by the pack.
    pub charge: f64,
    pub total_charged: f64,
    pub cycle: f64,
    pub location: String,
    pub location_id: String,
}

/// One scheduled battery swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapSchedule {
    pub id: String,
    pub ev_id: VehicleId,
    pub battery_station: StationId,
    pub slot: String,
    pub waiting_time: f64,
    pub travel_time: f64,
    pub scheduled_time: String,
    pub status: String,
}

/// One customer order across the four lifecycle lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub id: OrderId,
    pub status: String,
    pub assigned_vehicle: Option<VehicleId>,
    pub origin: LatLon,
    pub destination: LatLon,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// Route geometry attached to an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Route {
    /// Pre-computed path delivered as an encoded polyline string.
    Encoded(String),
    /// Straight origin-to-destination pair when no polyline was provided.
    Direct { origin: LatLon, destination: LatLon },
}

/// Work currently assigned to a vehicle, with its permitted route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub vehicle: VehicleId,
    pub route: Route,
    /// Corridor half-width in meters. Always positive; the sanitizer
    /// substitutes the configured default for absent or non-positive values.
    pub deviation_radius_m: f64,
}

/// Normalized view of one update cycle.
///
/// Built fresh for every applied frame and never mutated in place; the
/// engine diffs consecutive snapshots to decide what the overlay layer must
/// touch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub vehicles: HashMap<VehicleId, VehicleState>,
    pub stations: HashMap<StationId, StationState>,
    /// Keyed by the owning vehicle; one active route per vehicle.
    pub assignments: HashMap<VehicleId, Assignment>,
    pub batteries: HashMap<BatteryId, BatteryState>,
    pub orders: HashMap<OrderId, OrderState>,
    pub swap_schedules: Vec<SwapSchedule>,
    /// Feed-reported capture time, verbatim.
    pub captured_at: Option<String>,
}

impl FleetSnapshot {
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
            && self.stations.is_empty()
            && self.assignments.is_empty()
            && self.batteries.is_empty()
            && self.orders.is_empty()
            && self.swap_schedules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_slots_clamp_at_zero() {
        let station = StationState {
            id: "BS1".into(),
            name: String::new(),
            address: String::new(),
            position: LatLon::new(-6.2, 106.8),
            total_slots: 2,
            occupied: vec!["b1".into(), "b2".into(), "b3".into()],
            ready_batteries: 1,
            charging_batteries: 2,
            over_capacity: true,
        };
        assert_eq!(station.free_slots(), 0);
    }

    #[test]
    fn latlon_finiteness() {
        assert!(LatLon::new(0.0, 0.0).is_finite());
        assert!(!LatLon::new(f64::NAN, 106.8).is_finite());
        assert!(!LatLon::new(-6.2, f64::INFINITY).is_finite());
    }

    #[test]
    fn snapshot_default_is_empty() {
        assert!(FleetSnapshot::default().is_empty());
    }
}
