//! Frame-driven synchronization engine.
//!
//! One [`SyncEngine`] owns the authoritative snapshot, the overlay tables,
//! and the current selection. Each text frame runs the whole pipeline
//! synchronously on the caller's thread: parse, sanitize, diff, apply,
//! rebuild routes. A frame that fails any stage leaves the previous
//! snapshot and its overlays untouched.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use fleet_proto::{snapshot_from_value, FleetSnapshot, PayloadError, VehicleId};

use crate::config::EngineConfig;
use crate::metrics::CycleMetrics;
use crate::overlay::{OverlayBackend, OverlayManager};
use crate::reconcile::{diff_keys, EntityDiff};

/// Why a frame was not applied.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("engine is torn down")]
    TornDown,
}

/// Added/updated/removed cardinalities for one entity class in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl DiffCounts {
    fn from_diff<K>(diff: &EntityDiff<K>) -> Self {
        Self {
            added: diff.added.len(),
            updated: diff.updated.len(),
            removed: diff.removed.len(),
        }
    }
}

/// What one applied frame did to the overlay tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub vehicles: DiffCounts,
    pub stations: DiffCounts,
    pub routes_built: usize,
    pub corridors_built: usize,
    pub routes_skipped: usize,
}

/// Owns snapshot state and drives the overlay manager frame by frame.
pub struct SyncEngine<B: OverlayBackend> {
    config: EngineConfig,
    manager: OverlayManager<B>,
    snapshot: FleetSnapshot,
    selection: Option<VehicleId>,
    metrics: CycleMetrics,
}

impl<B: OverlayBackend> SyncEngine<B> {
    pub fn new(config: EngineConfig, backend: B) -> Self {
        Self {
            config,
            manager: OverlayManager::new(backend),
            snapshot: FleetSnapshot::default(),
            selection: None,
            metrics: CycleMetrics::default(),
        }
    }

    /// The most recently applied snapshot.
    pub fn snapshot(&self) -> &FleetSnapshot {
        &self.snapshot
    }

    pub fn selection(&self) -> Option<&VehicleId> {
        self.selection.as_ref()
    }

    pub fn metrics(&self) -> CycleMetrics {
        self.metrics
    }

    pub fn backend(&self) -> &B {
        self.manager.backend()
    }

    pub fn overlays(&self) -> &OverlayManager<B> {
        &self.manager
    }

    pub fn is_torn_down(&self) -> bool {
        self.manager.is_torn_down()
    }

    /// Parse one text frame and reconcile all overlay tables against it.
    ///
    /// On any error the engine keeps the last good snapshot; the caller may
    /// keep feeding later frames.
    pub fn ingest_frame(&mut self, frame: &str) -> Result<CycleSummary, FrameError> {
        if self.manager.is_torn_down() {
            return Err(FrameError::TornDown);
        }

        let value = match serde_json::from_str::<Value>(frame) {
            Ok(value) => value,
            Err(err) => {
                self.metrics.frames_rejected += 1;
                warn!(target: "fleetglass::ingest", error = %err, "frame.rejected=parse");
                return Err(err.into());
            }
        };
        let sanitized = match snapshot_from_value(&value, &self.config.sanitize_options()) {
            Ok(sanitized) => sanitized,
            Err(err) => {
                self.metrics.frames_rejected += 1;
                warn!(target: "fleetglass::ingest", error = %err, "frame.rejected=shape");
                return Err(err.into());
            }
        };
        let next = sanitized.snapshot;

        let over_capacity = next.stations.values().filter(|s| s.over_capacity).count();
        if over_capacity > 0 {
            warn!(
                target: "fleetglass::ingest",
                stations = over_capacity,
                "station.over_capacity"
            );
        }

        let vehicle_diff = diff_keys(&self.snapshot.vehicles, &next.vehicles);
        let station_diff = diff_keys(&self.snapshot.stations, &next.stations);
        debug!(
            target: "fleetglass::reconcile",
            added = vehicle_diff.added.len(),
            updated = vehicle_diff.updated.len(),
            removed = vehicle_diff.removed.len(),
            "vehicles.diffed"
        );
        debug!(
            target: "fleetglass::reconcile",
            added = station_diff.added.len(),
            updated = station_diff.updated.len(),
            removed = station_diff.removed.len(),
            "stations.diffed"
        );
        self.manager.apply_vehicles(&vehicle_diff, &next);
        self.manager.apply_stations(&station_diff, &next);
        let rebuild = self.manager.rebuild_routes(&next, self.selection.as_ref());

        let summary = CycleSummary {
            vehicles: DiffCounts::from_diff(&vehicle_diff),
            stations: DiffCounts::from_diff(&station_diff),
            routes_built: rebuild.routes,
            corridors_built: rebuild.corridors,
            routes_skipped: rebuild.skipped_routes,
        };

        self.metrics.frames_applied += 1;
        self.metrics.live_vehicles = self.manager.live_vehicles();
        self.metrics.live_stations = self.manager.live_stations();
        self.metrics.live_routes = self.manager.live_routes();
        self.metrics.live_corridors = self.manager.live_corridors();
        self.metrics.dropped_vehicles += u64::from(sanitized.report.dropped_vehicles);
        self.metrics.dropped_stations += u64::from(sanitized.report.dropped_stations);
        self.metrics.undecodable_routes += rebuild.skipped_routes as u64;
        self.metrics.over_capacity_stations = over_capacity;

        info!(
            target: "fleetglass::ingest",
            vehicles_added = summary.vehicles.added,
            vehicles_removed = summary.vehicles.removed,
            stations_added = summary.stations.added,
            stations_removed = summary.stations.removed,
            routes = summary.routes_built,
            corridors = summary.corridors_built,
            "snapshot.applied"
        );

        self.snapshot = next;
        Ok(summary)
    }

    /// Change which vehicle's deviation corridor is shown.
    ///
    /// Rebuilds routes from the retained snapshot, so it takes effect
    /// without waiting for the next frame. Returns false when nothing
    /// changed (same selection, or already torn down).
    pub fn set_selection(&mut self, selection: Option<VehicleId>) -> bool {
        if self.manager.is_torn_down() || self.selection == selection {
            return false;
        }
        self.selection = selection;

        let rebuild = self
            .manager
            .rebuild_routes(&self.snapshot, self.selection.as_ref());
        self.metrics.live_routes = self.manager.live_routes();
        self.metrics.live_corridors = self.manager.live_corridors();

        match &self.selection {
            Some(vehicle) => debug!(
                target: "fleetglass::ingest",
                vehicle = %vehicle,
                corridors = rebuild.corridors,
                "selection.changed"
            ),
            None => debug!(target: "fleetglass::ingest", "selection.cleared"),
        }
        true
    }

    /// Dispose every overlay and refuse all further frames. Idempotent.
    pub fn teardown(&mut self) {
        if self.manager.is_torn_down() {
            return;
        }
        self.manager.teardown();
        self.metrics.live_vehicles = 0;
        self.metrics.live_stations = 0;
        self.metrics.live_routes = 0;
        self.metrics.live_corridors = 0;
        info!(target: "fleetglass::ingest", "engine.torn_down");
    }
}
