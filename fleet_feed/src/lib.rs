//! Feed transport for the fleet sync engine.
//!
//! [`client`] is the consuming side: a reconnecting websocket subscriber
//! that surfaces raw text frames. [`simulator`] is the producing side: a
//! synthetic fleet that publishes schema-shaped frames for development and
//! integration testing, served by the `feed_simulator` binary.

pub mod client;
pub mod simulator;

pub use client::{FeedClient, FeedEvent, FeedHandle};
pub use simulator::{FeedError, FeedServer, FeedSimulator, SimulatorConfig};
