//! Wire-facing data model for the fleetglass sync engine.
//!
//! Feed payloads arrive as loosely-typed JSON. Everything here is about
//! turning one payload into the stable entity model the engine diffs and
//! renders from: the entity types themselves, the total coercions that make
//! malformed fields degrade instead of abort, and the encoded-polyline codec
//! used for assignment routes.

pub mod model;
pub mod polyline;
pub mod sanitize;

pub use model::{
    Assignment, AssignmentRef, BatteryId, BatteryState, FleetSnapshot, LatLon, OrderId, OrderState,
    Route, StationId, StationState, SwapSchedule, VehicleId, VehicleState,
};
pub use sanitize::{
    coerce_array, coerce_number, coerce_string, snapshot_from_value, PayloadError, SanitizeOptions,
    SanitizeReport, SanitizedFrame,
};
