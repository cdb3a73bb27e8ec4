use clap::Parser;
use color_eyre::Result;
use tracing::info;

use fleet_core::load_engine_config_from_env;
use fleet_feed::FeedClient;
use fleet_proto::VehicleId;

mod app;

use app::InspectorApp;

#[derive(Parser, Debug)]
#[command(author, version, about = "Fleetglass live feed inspector", long_about = None)]
struct Cli {
    /// Websocket endpoint publishing fleet snapshot frames.
    #[arg(long, default_value = "127.0.0.1:9040")]
    endpoint: String,
    /// Vehicle id whose deviation corridor should be built.
    #[arg(long)]
    select: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_engine_config_from_env();
    let selection = cli.select.map(VehicleId);

    info!("Connecting to feed at {}", cli.endpoint);
    let (feed, mut events) = FeedClient::new(cli.endpoint).start();
    let mut app = InspectorApp::new(config, selection);

    tokio::select! {
        _ = app.run(&mut events) => {
            info!("Feed channel closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    feed.shutdown();
    app.teardown();
    Ok(())
}
