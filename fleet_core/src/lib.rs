//! Synchronization engine for the fleetglass live map.
//!
//! Feed frames arrive as untrusted JSON; [`SyncEngine::ingest_frame`] turns
//! each one into a sanitized snapshot, reconciles it against the previous
//! cycle, and applies the difference to an [`OverlayBackend`] with minimal
//! churn. Route geometry is rebuilt wholesale every cycle because corridor
//! visibility also depends on the transient selection.

pub mod config;
pub mod corridor;
pub mod engine;
pub mod metrics;
pub mod overlay;
pub mod reconcile;

pub use config::{load_engine_config_from_env, EngineConfig, EngineConfigError};
pub use corridor::{build_corridor, CorridorRing, METERS_PER_DEGREE};
pub use engine::{CycleSummary, DiffCounts, FrameError, SyncEngine};
pub use metrics::CycleMetrics;
pub use overlay::{LogBackend, OverlayBackend, OverlayManager, RouteRebuild};
pub use reconcile::{diff_keys, EntityDiff};
