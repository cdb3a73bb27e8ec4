use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;

use fleet_feed::{FeedError, FeedServer, FeedSimulator, SimulatorConfig};

#[tokio::main]
async fn main() -> Result<(), FeedError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind = std::env::var("FLEET_FEED_BIND")
        .ok()
        .and_then(|raw| raw.parse::<SocketAddr>().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 9040)));
    let interval_ms = std::env::var("FLEET_FEED_INTERVAL_MS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(1_000);

    let mut config = SimulatorConfig::default();
    if let Some(seed) = std::env::var("FLEET_FEED_SEED")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
    {
        config.seed = seed;
    }

    let server = FeedServer::bind(bind).await?;
    info!(
        target: "fleetglass::feed",
        bind = %server.local_addr(),
        interval_ms,
        vehicles = config.vehicles,
        stations = config.stations,
        "feed_simulator.ready"
    );

    server
        .run(FeedSimulator::new(config), Duration::from_millis(interval_ms))
        .await;
    Ok(())
}
