//! Engine wiring for the inspector.
//!
//! Runs a [`SyncEngine`] over a [`LogBackend`], so every overlay mutation
//! shows up as a trace event instead of a drawn marker.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use fleet_core::{CycleMetrics, EngineConfig, LogBackend, SyncEngine};
use fleet_feed::FeedEvent;
use fleet_proto::VehicleId;

const REPORT_EVERY_FRAMES: u64 = 10;

pub struct InspectorApp {
    engine: SyncEngine<LogBackend>,
}

impl InspectorApp {
    pub fn new(config: EngineConfig, selection: Option<VehicleId>) -> Self {
        let mut engine = SyncEngine::new(config, LogBackend::default());
        engine.set_selection(selection);
        Self { engine }
    }

    /// Consume feed events until the channel closes.
    pub async fn run(&mut self, events: &mut UnboundedReceiver<FeedEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                FeedEvent::Connected => info!(target: "fleetglass::inspect", "feed.up"),
                FeedEvent::Disconnected => info!(target: "fleetglass::inspect", "feed.down"),
                FeedEvent::Frame(frame) => self.apply_frame(&frame),
            }
        }
    }

    fn apply_frame(&mut self, frame: &str) {
        match self.engine.ingest_frame(frame) {
            Ok(_) => {
                let metrics = self.engine.metrics();
                if metrics.frames_applied % REPORT_EVERY_FRAMES == 0 {
                    report(metrics);
                }
            }
            Err(err) => {
                warn!(target: "fleetglass::inspect", error = %err, "frame.dropped");
            }
        }
    }

    pub fn teardown(&mut self) {
        self.engine.teardown();
        let backend = self.engine.backend();
        info!(
            target: "fleetglass::inspect",
            created = backend.created(),
            disposed = backend.disposed(),
            "inspector.closed"
        );
    }
}

fn report(metrics: CycleMetrics) {
    info!(
        target: "fleetglass::inspect",
        frames = metrics.frames_applied,
        rejected = metrics.frames_rejected,
        vehicles = metrics.live_vehicles,
        stations = metrics.live_stations,
        routes = metrics.live_routes,
        corridors = metrics.live_corridors,
        undecodable = metrics.undecodable_routes,
        "cycle.metrics"
    );
}
