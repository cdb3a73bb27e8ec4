#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use fleet_core::{load_engine_config_from_env, CorridorRing, OverlayBackend, SyncEngine};
use fleet_proto::{Assignment, LatLon, StationId, StationState, VehicleId, VehicleState};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_engine_config.json");

        debug_assert!(
            config_path.exists(),
            "missing engine config fixture at {}",
            config_path.display()
        );

        std::env::set_var("FLEETGLASS_CONFIG_PATH", &config_path);
    });
}

/// Engine over a [`RecordingBackend`], configured from the test fixture.
pub fn test_engine() -> SyncEngine<RecordingBackend> {
    ensure_test_config();
    SyncEngine::new(load_engine_config_from_env(), RecordingBackend::default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    VehicleCreated(VehicleId),
    VehicleUpdated(VehicleId),
    VehicleDisposed(VehicleId),
    StationCreated(StationId),
    StationUpdated(StationId),
    StationDisposed(StationId),
    RouteCreated(VehicleId),
    RouteDisposed(VehicleId),
    CorridorCreated(VehicleId),
    CorridorDisposed(VehicleId),
}

/// Backend double that records every lifecycle call in order.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub events: Vec<OverlayEvent>,
}

impl RecordingBackend {
    pub fn count(&self, matcher: impl Fn(&OverlayEvent) -> bool) -> usize {
        self.events.iter().filter(|event| matcher(event)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|event| {
            matches!(
                event,
                OverlayEvent::VehicleCreated(_)
                    | OverlayEvent::StationCreated(_)
                    | OverlayEvent::RouteCreated(_)
                    | OverlayEvent::CorridorCreated(_)
            )
        })
    }

    pub fn disposed(&self) -> usize {
        self.count(|event| {
            matches!(
                event,
                OverlayEvent::VehicleDisposed(_)
                    | OverlayEvent::StationDisposed(_)
                    | OverlayEvent::RouteDisposed(_)
                    | OverlayEvent::CorridorDisposed(_)
            )
        })
    }
}

impl OverlayBackend for RecordingBackend {
    type VehicleHandle = VehicleId;
    type StationHandle = StationId;
    type RouteHandle = VehicleId;
    type CorridorHandle = VehicleId;

    fn create_vehicle(&mut self, state: &VehicleState) -> VehicleId {
        self.events.push(OverlayEvent::VehicleCreated(state.id.clone()));
        state.id.clone()
    }

    fn update_vehicle(&mut self, handle: &mut VehicleId, _state: &VehicleState) {
        self.events.push(OverlayEvent::VehicleUpdated(handle.clone()));
    }

    fn dispose_vehicle(&mut self, handle: VehicleId) {
        self.events.push(OverlayEvent::VehicleDisposed(handle));
    }

    fn create_station(&mut self, state: &StationState) -> StationId {
        self.events.push(OverlayEvent::StationCreated(state.id.clone()));
        state.id.clone()
    }

    fn update_station(&mut self, handle: &mut StationId, _state: &StationState) {
        self.events.push(OverlayEvent::StationUpdated(handle.clone()));
    }

    fn dispose_station(&mut self, handle: StationId) {
        self.events.push(OverlayEvent::StationDisposed(handle));
    }

    fn create_route(&mut self, assignment: &Assignment, _path: &[LatLon]) -> VehicleId {
        self.events.push(OverlayEvent::RouteCreated(assignment.vehicle.clone()));
        assignment.vehicle.clone()
    }

    fn dispose_route(&mut self, handle: VehicleId) {
        self.events.push(OverlayEvent::RouteDisposed(handle));
    }

    fn create_corridor(&mut self, vehicle: &VehicleId, _ring: &CorridorRing) -> VehicleId {
        self.events.push(OverlayEvent::CorridorCreated(vehicle.clone()));
        vehicle.clone()
    }

    fn dispose_corridor(&mut self, handle: VehicleId) {
        self.events.push(OverlayEvent::CorridorDisposed(handle));
    }
}
