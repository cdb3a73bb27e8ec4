//! Total coercion of untrusted feed payloads.
//!
//! Every downstream entity field passes through [`coerce_string`],
//! [`coerce_number`], or [`coerce_array`], so one malformed backend field
//! degrades to its default instead of aborting the snapshot. The only hard
//! requirement on a frame is that its root is a JSON object.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::model::{
    Assignment, AssignmentRef, BatteryId, BatteryState, FleetSnapshot, LatLon, OrderId, OrderState,
    Route, StationId, StationState, SwapSchedule, VehicleId, VehicleState,
};

/// Knobs the sanitizer takes from engine configuration.
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Corridor half-width for assignments that carry none of their own.
    pub default_deviation_radius_m: f64,
    /// Charge percentage at or above which a slotted battery counts as
    /// swap-ready rather than charging.
    pub battery_ready_threshold: f64,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            default_deviation_radius_m: 2000.0,
            battery_ready_threshold: 80.0,
        }
    }
}

/// Why a frame could not be normalized at all.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload root is {0}, expected a JSON object")]
    NotAnObject(&'static str),
}

/// Entities discarded while normalizing one payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub dropped_vehicles: u32,
    pub dropped_stations: u32,
}

/// A normalized snapshot plus what was discarded to produce it.
#[derive(Debug, Clone, Default)]
pub struct SanitizedFrame {
    pub snapshot: FleetSnapshot,
    pub report: SanitizeReport,
}

/// `default` for `null`, absent, or empty-string input; otherwise the
/// value's string form. Non-string scalars stringify without quotes; arrays
/// and objects stringify as their JSON text.
pub fn coerce_string(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(text)) if text.is_empty() => default.to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    }
}

/// `default` for `null`/absent input or when conversion yields no number.
/// `0` is a valid value, never treated as absent.
pub fn coerce_number(value: Option<&Value>, default: f64) -> f64 {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Number(number)) => number.as_f64().unwrap_or(default),
        Some(Value::String(text)) => match text.trim().parse::<f64>() {
            Ok(parsed) if !parsed.is_nan() => parsed,
            _ => default,
        },
        Some(Value::Bool(true)) => 1.0,
        Some(Value::Bool(false)) => 0.0,
        _ => default,
    }
}

/// The array's elements, or empty for any non-array input.
pub fn coerce_array(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// Normalize one raw payload into a [`FleetSnapshot`].
///
/// Only the root shape can fail; every field below it degrades through the
/// coercions. Vehicles and stations without finite coordinates are dropped
/// and counted in the report rather than carried as undrawable entities.
pub fn snapshot_from_value(
    payload: &Value,
    options: &SanitizeOptions,
) -> Result<SanitizedFrame, PayloadError> {
    let root = payload
        .as_object()
        .ok_or_else(|| PayloadError::NotAnObject(value_kind(payload)))?;

    let mut report = SanitizeReport::default();

    let batteries: HashMap<BatteryId, BatteryState> = coerce_array(root.get("batteries"))
        .iter()
        .map(sanitize_battery)
        .map(|battery| (battery.id.clone(), battery))
        .collect();

    let mut vehicles = HashMap::new();
    for (index, item) in coerce_array(root.get("fleet_ev_motorbikes"))
        .iter()
        .enumerate()
    {
        match sanitize_vehicle(item, index, &batteries) {
            Some(vehicle) => {
                vehicles.insert(vehicle.id.clone(), vehicle);
            }
            None => report.dropped_vehicles += 1,
        }
    }

    let mut stations = HashMap::new();
    for (index, item) in coerce_array(root.get("battery_swap_station"))
        .iter()
        .enumerate()
    {
        match sanitize_station(item, index, &batteries, options) {
            Some(station) => {
                stations.insert(station.id.clone(), station);
            }
            None => report.dropped_stations += 1,
        }
    }

    let swap_schedules: Vec<SwapSchedule> = coerce_array(root.get("swap_schedules"))
        .iter()
        .map(sanitize_swap_schedule)
        .collect();

    let mut orders = HashMap::new();
    let merged = [
        "order_search_driver",
        "order_active",
        "order_done",
        "order_failed",
    ]
    .into_iter()
    .flat_map(|list| coerce_array(root.get(list)).iter());
    for (index, item) in merged.enumerate() {
        let order = sanitize_order(item, index);
        orders.insert(order.id.clone(), order);
    }

    let assignments = derive_assignments(root, &orders, options);

    let snapshot = FleetSnapshot {
        vehicles,
        stations,
        assignments,
        batteries,
        orders,
        swap_schedules,
        captured_at: optional_string(root.get("time_now")),
    };

    Ok(SanitizedFrame { snapshot, report })
}

fn sanitize_battery(item: &Value) -> BatteryState {
    BatteryState {
        id: BatteryId(coerce_string(item.get("id"), "")),
        capacity: coerce_number(item.get("capacity"), 0.0),
        charge: coerce_number(item.get("battery_now"), 0.0),
        total_charged: coerce_number(item.get("battery_total_charged"), 0.0),
        cycle: coerce_number(item.get("cycle"), 0.0),
        location: coerce_string(item.get("location"), ""),
        location_id: coerce_string(item.get("location_id"), ""),
    }
}

fn sanitize_vehicle(
    item: &Value,
    index: usize,
    batteries: &HashMap<BatteryId, BatteryState>,
) -> Option<VehicleState> {
    let position = LatLon::new(
        coerce_number(item.get("latitude"), f64::NAN),
        coerce_number(item.get("longitude"), f64::NAN),
    );
    if !position.is_finite() {
        return None;
    }

    let battery_id = BatteryId(coerce_string(item.get("battery_id"), ""));
    let battery_percent = batteries
        .get(&battery_id)
        .map(|battery| battery.charge.clamp(0.0, 100.0))
        .unwrap_or(0.0);

    Some(VehicleState {
        id: VehicleId(coerce_string(item.get("id"), &format!("MB{index}"))),
        position,
        status: coerce_string(item.get("status"), ""),
        battery_percent,
        online_status: coerce_string(item.get("online_status"), ""),
        assignment: assignment_ref(item),
    })
}

fn assignment_ref(item: &Value) -> Option<AssignmentRef> {
    if let Some(order_id) = optional_string(item.get("order_id")) {
        return Some(AssignmentRef::Order(OrderId(order_id)));
    }
    match item.get("swap_schedule") {
        Some(Value::Object(fields)) if !fields.is_empty() => Some(AssignmentRef::SwapSchedule(
            coerce_string(fields.get("id"), ""),
        )),
        _ => None,
    }
}

fn sanitize_station(
    item: &Value,
    index: usize,
    batteries: &HashMap<BatteryId, BatteryState>,
    options: &SanitizeOptions,
) -> Option<StationState> {
    let position = LatLon::new(
        coerce_number(item.get("latitude"), f64::NAN),
        coerce_number(item.get("longitude"), f64::NAN),
    );
    if !position.is_finite() {
        return None;
    }

    let total_slots = non_negative_int(item.get("total_slots"));
    let occupied: Vec<BatteryId> = coerce_array(item.get("slots"))
        .iter()
        .map(|slot| BatteryId(coerce_string(Some(slot), "")))
        .collect();

    let ready_batteries = occupied
        .iter()
        .filter(|slot| {
            batteries
                .get(*slot)
                .is_some_and(|battery| battery.charge >= options.battery_ready_threshold)
        })
        .count() as u32;
    let charging_batteries = occupied.len() as u32 - ready_batteries;
    let over_capacity = occupied.len() as u32 > total_slots;

    Some(StationState {
        id: StationId(coerce_string(item.get("id"), &format!("BS{index}"))),
        name: coerce_string(item.get("name"), ""),
        address: coerce_string(item.get("alamat"), ""),
        position,
        total_slots,
        occupied,
        ready_batteries,
        charging_batteries,
        over_capacity,
    })
}

fn sanitize_swap_schedule(item: &Value) -> SwapSchedule {
    SwapSchedule {
        id: coerce_string(item.get("id"), ""),
        ev_id: VehicleId(coerce_string(item.get("ev_id"), "")),
        battery_station: StationId(coerce_string(item.get("battery_station"), "")),
        slot: coerce_string(item.get("slot"), ""),
        waiting_time: coerce_number(item.get("waiting_time"), 0.0),
        travel_time: coerce_number(item.get("travel_time"), 0.0),
        scheduled_time: coerce_string(item.get("scheduled_time"), ""),
        status: coerce_string(item.get("status"), ""),
    }
}

fn sanitize_order(item: &Value, index: usize) -> OrderState {
    OrderState {
        id: OrderId(coerce_string(item.get("id"), &format!("ORD{index}"))),
        status: coerce_string(item.get("status"), ""),
        assigned_vehicle: optional_string(item.get("assigned_motorbike_id")).map(VehicleId),
        origin: LatLon::new(
            coerce_number(item.get("order_origin_lat"), f64::NAN),
            coerce_number(item.get("order_origin_lon"), f64::NAN),
        ),
        destination: LatLon::new(
            coerce_number(item.get("order_destination_lat"), f64::NAN),
            coerce_number(item.get("order_destination_lon"), f64::NAN),
        ),
        created_at: coerce_string(item.get("created_at"), ""),
        completed_at: optional_string(item.get("completed_at")),
    }
}

/// Active, vehicle-assigned orders yield direct routes; entries in
/// `active_assignments` (older feeds spell it `assignments`) carry real
/// polyline geometry and replace them for the same vehicle.
fn derive_assignments(
    root: &serde_json::Map<String, Value>,
    orders: &HashMap<OrderId, OrderState>,
    options: &SanitizeOptions,
) -> HashMap<VehicleId, Assignment> {
    let mut assignments = HashMap::new();

    let mut active: Vec<&OrderState> = orders.values().collect();
    active.sort_unstable_by(|a, b| a.id.cmp(&b.id));
    for order in active {
        if order.status != "active" {
            continue;
        }
        let Some(vehicle) = order.assigned_vehicle.clone() else {
            continue;
        };
        if !order.origin.is_finite() || !order.destination.is_finite() {
            continue;
        }
        assignments.insert(
            vehicle.clone(),
            Assignment {
                id: order.id.0.clone(),
                vehicle,
                route: Route::Direct {
                    origin: order.origin,
                    destination: order.destination,
                },
                deviation_radius_m: options.default_deviation_radius_m,
            },
        );
    }

    let pushed = root
        .get("active_assignments")
        .and_then(Value::as_object)
        .or_else(|| root.get("assignments").and_then(Value::as_object));
    if let Some(entries) = pushed {
        for (vehicle_raw, entry) in entries {
            let Some(encoded) = optional_string(entry.get("polyline")) else {
                continue;
            };
            let vehicle = VehicleId(vehicle_raw.clone());
            let radius = coerce_number(
                entry.get("deviate_radius"),
                options.default_deviation_radius_m,
            );
            let radius = if radius.is_finite() && radius > 0.0 {
                radius
            } else {
                options.default_deviation_radius_m
            };
            assignments.insert(
                vehicle.clone(),
                Assignment {
                    id: coerce_string(entry.get("base_id"), vehicle_raw),
                    vehicle,
                    route: Route::Encoded(encoded),
                    deviation_radius_m: radius,
                },
            );
        }
    }

    assignments
}

/// Slot counts are non-negative integers; fractional input truncates and
/// anything below zero floors at zero.
fn non_negative_int(value: Option<&Value>) -> u32 {
    let number = coerce_number(value, 0.0);
    if number.is_finite() && number > 0.0 {
        number as u32
    } else {
        0
    }
}

/// `Some` only for a present, non-empty string form.
fn optional_string(value: Option<&Value>) -> Option<String> {
    let text = coerce_string(value, "");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
