//! Overlay handle lifecycle.
//!
//! One visual handle per live entity id, owned exclusively by the
//! [`OverlayManager`]. Snapshot diffs create, mutate, or dispose handles;
//! route lines and corridor rings are rebuilt wholesale every cycle because
//! their visibility also depends on the transient selection, which an
//! id-diff cannot see. Dispose takes handles by value, so destroying one
//! twice does not typecheck.

use std::collections::HashMap;

use tracing::{debug, trace};

use fleet_proto::{
    polyline, Assignment, FleetSnapshot, LatLon, Route, StationId, StationState, VehicleId,
    VehicleState,
};

use crate::corridor::{build_corridor, CorridorRing};
use crate::reconcile::EntityDiff;

/// Render-target seam.
///
/// Implementations own the actual visual resources. The manager guarantees
/// each handle is created once, mutated in place while its entity stays
/// live, and disposed exactly once.
pub trait OverlayBackend {
    type VehicleHandle;
    type StationHandle;
    type RouteHandle;
    type CorridorHandle;

    fn create_vehicle(&mut self, state: &VehicleState) -> Self::VehicleHandle;
    fn update_vehicle(&mut self, handle: &mut Self::VehicleHandle, state: &VehicleState);
    fn dispose_vehicle(&mut self, handle: Self::VehicleHandle);

    fn create_station(&mut self, state: &StationState) -> Self::StationHandle;
    fn update_station(&mut self, handle: &mut Self::StationHandle, state: &StationState);
    fn dispose_station(&mut self, handle: Self::StationHandle);

    fn create_route(&mut self, assignment: &Assignment, path: &[LatLon]) -> Self::RouteHandle;
    fn dispose_route(&mut self, handle: Self::RouteHandle);

    fn create_corridor(&mut self, vehicle: &VehicleId, ring: &CorridorRing)
        -> Self::CorridorHandle;
    fn dispose_corridor(&mut self, handle: Self::CorridorHandle);
}

/// Outcome of one wholesale route rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteRebuild {
    pub routes: usize,
    pub corridors: usize,
    /// Assignments whose route decoded to fewer than two points.
    pub skipped_routes: usize,
}

/// Owns every live overlay handle, one table per overlay class.
///
/// After each applied diff the key set of a table equals the id set of the
/// most recent snapshot for that class. Once torn down, all applies are
/// ignored.
pub struct OverlayManager<B: OverlayBackend> {
    backend: B,
    vehicles: HashMap<VehicleId, B::VehicleHandle>,
    stations: HashMap<StationId, B::StationHandle>,
    routes: Vec<B::RouteHandle>,
    corridors: Vec<B::CorridorHandle>,
    torn_down: bool,
}

impl<B: OverlayBackend> OverlayManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            vehicles: HashMap::new(),
            stations: HashMap::new(),
            routes: Vec::new(),
            corridors: Vec::new(),
            torn_down: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn live_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    pub fn live_stations(&self) -> usize {
        self.stations.len()
    }

    pub fn live_routes(&self) -> usize {
        self.routes.len()
    }

    pub fn live_corridors(&self) -> usize {
        self.corridors.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// True when a vehicle marker is currently live for `id`.
    pub fn has_vehicle(&self, id: &VehicleId) -> bool {
        self.vehicles.contains_key(id)
    }

    /// Apply one cycle's vehicle diff. Removals run first so departing
    /// handles release their backend resources before new ones allocate.
    pub fn apply_vehicles(&mut self, diff: &EntityDiff<VehicleId>, snapshot: &FleetSnapshot) {
        if self.torn_down {
            return;
        }

        for id in &diff.removed {
            if let Some(handle) = self.vehicles.remove(id) {
                trace!(target: "fleetglass::overlay", vehicle = %id, "marker.disposed");
                self.backend.dispose_vehicle(handle);
            }
        }
        for id in &diff.added {
            let Some(state) = snapshot.vehicles.get(id) else {
                continue;
            };
            trace!(target: "fleetglass::overlay", vehicle = %id, "marker.created");
            let handle = self.backend.create_vehicle(state);
            self.vehicles.insert(id.clone(), handle);
        }
        for id in &diff.updated {
            let (Some(handle), Some(state)) = (self.vehicles.get_mut(id), snapshot.vehicles.get(id))
            else {
                continue;
            };
            self.backend.update_vehicle(handle, state);
        }
    }

    /// Apply one cycle's station diff, removals first.
    pub fn apply_stations(&mut self, diff: &EntityDiff<StationId>, snapshot: &FleetSnapshot) {
        if self.torn_down {
            return;
        }

        for id in &diff.removed {
            if let Some(handle) = self.stations.remove(id) {
                trace!(target: "fleetglass::overlay", station = %id, "marker.disposed");
                self.backend.dispose_station(handle);
            }
        }
        for id in &diff.added {
            let Some(state) = snapshot.stations.get(id) else {
                continue;
            };
            trace!(target: "fleetglass::overlay", station = %id, "marker.created");
            let handle = self.backend.create_station(state);
            self.stations.insert(id.clone(), handle);
        }
        for id in &diff.updated {
            let (Some(handle), Some(state)) = (self.stations.get_mut(id), snapshot.stations.get(id))
            else {
                continue;
            };
            self.backend.update_station(handle, state);
        }
    }

    /// Dispose every route line and corridor ring, then rebuild from the
    /// current assignments. Corridors are emitted only for the selected
    /// vehicle's route.
    pub fn rebuild_routes(
        &mut self,
        snapshot: &FleetSnapshot,
        selection: Option<&VehicleId>,
    ) -> RouteRebuild {
        if self.torn_down {
            return RouteRebuild::default();
        }

        for handle in self.routes.drain(..) {
            self.backend.dispose_route(handle);
        }
        for handle in self.corridors.drain(..) {
            self.backend.dispose_corridor(handle);
        }

        let mut rebuild = RouteRebuild::default();
        let mut assignments: Vec<&Assignment> = snapshot.assignments.values().collect();
        assignments.sort_unstable_by(|a, b| a.vehicle.cmp(&b.vehicle));

        for assignment in assignments {
            let path = match &assignment.route {
                Route::Encoded(encoded) => polyline::decode(encoded),
                Route::Direct {
                    origin,
                    destination,
                } => vec![*origin, *destination],
            };
            if path.len() < 2 {
                debug!(
                    target: "fleetglass::overlay",
                    vehicle = %assignment.vehicle,
                    assignment = %assignment.id,
                    "route.skipped=undecodable"
                );
                rebuild.skipped_routes += 1;
                continue;
            }

            let handle = self.backend.create_route(assignment, &path);
            self.routes.push(handle);
            rebuild.routes += 1;

            if selection == Some(&assignment.vehicle) {
                for ring in build_corridor(&path, assignment.deviation_radius_m) {
                    let handle = self.backend.create_corridor(&assignment.vehicle, &ring);
                    self.corridors.push(handle);
                    rebuild.corridors += 1;
                }
            }
        }

        rebuild
    }

    /// Dispose every live handle in every class and refuse further work.
    /// Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        for (_, handle) in self.vehicles.drain() {
            self.backend.dispose_vehicle(handle);
        }
        for (_, handle) in self.stations.drain() {
            self.backend.dispose_station(handle);
        }
        for handle in self.routes.drain(..) {
            self.backend.dispose_route(handle);
        }
        for handle in self.corridors.drain(..) {
            self.backend.dispose_corridor(handle);
        }
        debug!(target: "fleetglass::overlay", "overlays.torn_down");
    }
}

/// Backend that owns no real resources and only traces lifecycle events.
///
/// Handles carry the entity id so dispose events stay attributable. Used by
/// the feed inspector and anywhere no renderer is attached.
#[derive(Debug, Default)]
pub struct LogBackend {
    created: u64,
    disposed: u64,
    updated: u64,
}

impl LogBackend {
    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn disposed(&self) -> u64 {
        self.disposed
    }

    pub fn updated(&self) -> u64 {
        self.updated
    }

    pub fn live(&self) -> u64 {
        self.created - self.disposed
    }
}

impl OverlayBackend for LogBackend {
    type VehicleHandle = VehicleId;
    type StationHandle = StationId;
    type RouteHandle = VehicleId;
    type CorridorHandle = VehicleId;

    fn create_vehicle(&mut self, state: &VehicleState) -> VehicleId {
        self.created += 1;
        trace!(
            target: "fleetglass::overlay",
            vehicle = %state.id,
            lat = state.position.lat,
            lon = state.position.lon,
            status = %state.status,
            "backend.vehicle_created"
        );
        state.id.clone()
    }

    fn update_vehicle(&mut self, handle: &mut VehicleId, state: &VehicleState) {
        self.updated += 1;
        trace!(
            target: "fleetglass::overlay",
            vehicle = %handle,
            lat = state.position.lat,
            lon = state.position.lon,
            "backend.vehicle_moved"
        );
    }

    fn dispose_vehicle(&mut self, handle: VehicleId) {
        self.disposed += 1;
        trace!(target: "fleetglass::overlay", vehicle = %handle, "backend.vehicle_disposed");
    }

    fn create_station(&mut self, state: &StationState) -> StationId {
        self.created += 1;
        trace!(
            target: "fleetglass::overlay",
            station = %state.id,
            free = state.free_slots(),
            "backend.station_created"
        );
        state.id.clone()
    }

    fn update_station(&mut self, handle: &mut StationId, state: &StationState) {
        self.updated += 1;
        trace!(
            target: "fleetglass::overlay",
            station = %handle,
            free = state.free_slots(),
            "backend.station_updated"
        );
    }

    fn dispose_station(&mut self, handle: StationId) {
        self.disposed += 1;
        trace!(target: "fleetglass::overlay", station = %handle, "backend.station_disposed");
    }

    fn create_route(&mut self, assignment: &Assignment, path: &[LatLon]) -> VehicleId {
        self.created += 1;
        trace!(
            target: "fleetglass::overlay",
            vehicle = %assignment.vehicle,
            points = path.len(),
            "backend.route_created"
        );
        assignment.vehicle.clone()
    }

    fn dispose_route(&mut self, handle: VehicleId) {
        self.disposed += 1;
        trace!(target: "fleetglass::overlay", vehicle = %handle, "backend.route_disposed");
    }

    fn create_corridor(&mut self, vehicle: &VehicleId, _ring: &CorridorRing) -> VehicleId {
        self.created += 1;
        trace!(target: "fleetglass::overlay", vehicle = %vehicle, "backend.corridor_created");
        vehicle.clone()
    }

    fn dispose_corridor(&mut self, handle: VehicleId) {
        self.disposed += 1;
        trace!(target: "fleetglass::overlay", vehicle = %handle, "backend.corridor_disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_proto::{FleetSnapshot, LatLon, VehicleState};

    /// Per-class operation counters.
    #[derive(Debug, Default)]
    struct CountingBackend {
        vehicle_creates: usize,
        vehicle_updates: usize,
        vehicle_disposes: usize,
        station_creates: usize,
        station_disposes: usize,
        route_creates: usize,
        route_disposes: usize,
        corridor_creates: usize,
        corridor_disposes: usize,
    }

    impl OverlayBackend for CountingBackend {
        type VehicleHandle = VehicleId;
        type StationHandle = StationId;
        type RouteHandle = ();
        type CorridorHandle = ();

        fn create_vehicle(&mut self, state: &VehicleState) -> VehicleId {
            self.vehicle_creates += 1;
            state.id.clone()
        }

        fn update_vehicle(&mut self, _handle: &mut VehicleId, _state: &VehicleState) {
            self.vehicle_updates += 1;
        }

        fn dispose_vehicle(&mut self, _handle: VehicleId) {
            self.vehicle_disposes += 1;
        }

        fn create_station(&mut self, state: &StationState) -> StationId {
            self.station_creates += 1;
            state.id.clone()
        }

        fn update_station(&mut self, _handle: &mut StationId, _state: &StationState) {}

        fn dispose_station(&mut self, _handle: StationId) {
            self.station_disposes += 1;
        }

        fn create_route(&mut self, _assignment: &Assignment, _path: &[LatLon]) {
            self.route_creates += 1;
        }

        fn dispose_route(&mut self, _handle: ()) {
            self.route_disposes += 1;
        }

        fn create_corridor(&mut self, _vehicle: &VehicleId, _ring: &CorridorRing) {
            self.corridor_creates += 1;
        }

        fn dispose_corridor(&mut self, _handle: ()) {
            self.corridor_disposes += 1;
        }
    }

    fn vehicle(id: &str, lat: f64) -> VehicleState {
        VehicleState {
            id: id.into(),
            position: LatLon::new(lat, 106.8),
            status: "idle".to_string(),
            battery_percent: 50.0,
            online_status: "online".to_string(),
            assignment: None,
        }
    }

    fn snapshot_with(vehicles: Vec<VehicleState>) -> FleetSnapshot {
        let mut snapshot = FleetSnapshot::default();
        for state in vehicles {
            snapshot.vehicles.insert(state.id.clone(), state);
        }
        snapshot
    }

    fn vehicle_diff(
        previous: &FleetSnapshot,
        current: &FleetSnapshot,
    ) -> EntityDiff<VehicleId> {
        crate::reconcile::diff_keys(&previous.vehicles, &current.vehicles)
    }

    #[test]
    fn handle_table_tracks_snapshot_ids() {
        let mut manager = OverlayManager::new(CountingBackend::default());

        let first = snapshot_with(vec![vehicle("a", -6.2), vehicle("b", -6.3)]);
        manager.apply_vehicles(&vehicle_diff(&FleetSnapshot::default(), &first), &first);
        assert_eq!(manager.live_vehicles(), 2);
        assert!(manager.has_vehicle(&"a".into()));

        let second = snapshot_with(vec![vehicle("b", -6.35), vehicle("c", -6.4)]);
        manager.apply_vehicles(&vehicle_diff(&first, &second), &second);
        assert_eq!(manager.live_vehicles(), 2);
        assert!(!manager.has_vehicle(&"a".into()));
        assert!(manager.has_vehicle(&"c".into()));

        let backend = manager.backend();
        assert_eq!(backend.vehicle_creates, 3);
        assert_eq!(backend.vehicle_updates, 1);
        assert_eq!(backend.vehicle_disposes, 1);
    }

    #[test]
    fn routes_are_rebuilt_wholesale() {
        let mut manager = OverlayManager::new(CountingBackend::default());

        let mut snapshot = FleetSnapshot::default();
        snapshot.assignments.insert(
            "a".into(),
            Assignment {
                id: "o1".to_string(),
                vehicle: "a".into(),
                route: Route::Direct {
                    origin: LatLon::new(-6.2, 106.8),
                    destination: LatLon::new(-6.3, 106.9),
                },
                deviation_radius_m: 2000.0,
            },
        );

        manager.rebuild_routes(&snapshot, None);
        assert_eq!(manager.live_routes(), 1);
        assert_eq!(manager.backend().route_disposes, 0);

        manager.rebuild_routes(&snapshot, None);
        assert_eq!(manager.live_routes(), 1);
        assert_eq!(manager.backend().route_creates, 2);
        assert_eq!(manager.backend().route_disposes, 1);
    }

    #[test]
    fn corridor_only_for_selected_vehicle() {
        let mut manager = OverlayManager::new(CountingBackend::default());

        let mut snapshot = FleetSnapshot::default();
        for id in ["a", "b"] {
            snapshot.assignments.insert(
                id.into(),
                Assignment {
                    id: id.to_string(),
                    vehicle: id.into(),
                    route: Route::Direct {
                        origin: LatLon::new(-6.2, 106.8),
                        destination: LatLon::new(-6.3, 106.9),
                    },
                    deviation_radius_m: 2000.0,
                },
            );
        }

        let rebuild = manager.rebuild_routes(&snapshot, Some(&"a".into()));
        assert_eq!(rebuild.routes, 2);
        assert_eq!(rebuild.corridors, 1);
        assert_eq!(manager.live_corridors(), 1);

        let rebuild = manager.rebuild_routes(&snapshot, None);
        assert_eq!(rebuild.corridors, 0);
        assert_eq!(manager.live_corridors(), 0);
        assert_eq!(manager.backend().corridor_disposes, 1);
    }

    #[test]
    fn undecodable_route_renders_nothing() {
        let mut manager = OverlayManager::new(CountingBackend::default());

        let mut snapshot = FleetSnapshot::default();
        snapshot.assignments.insert(
            "a".into(),
            Assignment {
                id: "o1".to_string(),
                vehicle: "a".into(),
                route: Route::Encoded("_".repeat(80)),
                deviation_radius_m: 2000.0,
            },
        );

        let rebuild = manager.rebuild_routes(&snapshot, Some(&"a".into()));
        assert_eq!(rebuild.routes, 0);
        assert_eq!(rebuild.skipped_routes, 1);
        assert_eq!(manager.live_routes(), 0);
        assert_eq!(manager.live_corridors(), 0);
    }

    #[test]
    fn teardown_disposes_everything_and_blocks_applies() {
        let mut manager = OverlayManager::new(CountingBackend::default());

        let snapshot = snapshot_with(vec![vehicle("a", -6.2), vehicle("b", -6.3)]);
        manager.apply_vehicles(&vehicle_diff(&FleetSnapshot::default(), &snapshot), &snapshot);
        manager.rebuild_routes(&snapshot, None);

        manager.teardown();
        assert!(manager.is_torn_down());
        assert_eq!(manager.live_vehicles(), 0);
        assert_eq!(manager.backend().vehicle_disposes, 2);

        // idempotent, and late applies are ignored
        manager.teardown();
        manager.apply_vehicles(&vehicle_diff(&FleetSnapshot::default(), &snapshot), &snapshot);
        assert_eq!(manager.live_vehicles(), 0);
        assert_eq!(manager.backend().vehicle_creates, 2);
    }
}
