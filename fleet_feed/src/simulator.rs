//! Synthetic fleet feed.
//!
//! [`FeedSimulator`] evolves a small fleet tick by tick and renders each
//! tick as one schema-shaped JSON frame: motorbikes wander, drain their
//! batteries, swap at stations when low, and pick up and complete orders.
//! [`FeedServer`] publishes those frames to every websocket subscriber on a
//! fixed interval.

use std::f64::consts::TAU;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::SinkExt;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use fleet_proto::{polyline, LatLon};

const BATTERY_CAPACITY_WH: f64 = 1_800.0;
const SWAP_THRESHOLD: f64 = 15.0;
const SPARE_CHARGE_PER_TICK: f64 = 1.5;
/// Completed orders and swap events stay in the frame this many ticks.
const HISTORY_TICKS: u64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct SimulatorConfig {
    pub seed: u64,
    pub vehicles: usize,
    pub stations: usize,
    /// Center of the simulated service area.
    pub center: LatLon,
    /// Per-tick random walk amplitude, in degrees.
    pub walk_step_deg: f64,
    /// Per-vehicle chance per tick of opening a new order.
    pub order_rate: f64,
    /// Per-order chance per tick of completing.
    pub completion_rate: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            vehicles: 12,
            stations: 3,
            center: LatLon::new(-6.2088, 106.8456),
            walk_step_deg: 0.0015,
            order_rate: 0.15,
            completion_rate: 0.10,
        }
    }
}

#[derive(Debug)]
struct SimVehicle {
    id: String,
    battery_id: String,
    position: LatLon,
    charge: f64,
    cycles: u32,
    order: Option<String>,
}

#[derive(Debug)]
struct SimStation {
    id: String,
    name: String,
    address: String,
    position: LatLon,
    total_slots: u32,
}

#[derive(Debug)]
struct SimSpare {
    id: String,
    station_index: usize,
    charge: f64,
}

#[derive(Debug)]
struct SimOrder {
    id: String,
    vehicle: String,
    path: Vec<LatLon>,
    created_tick: u64,
    done_tick: Option<u64>,
}

#[derive(Debug)]
struct SimSwap {
    id: String,
    vehicle: String,
    station_index: usize,
    slot: String,
    tick: u64,
}

/// Deterministic fleet evolution; one frame per tick.
pub struct FeedSimulator {
    config: SimulatorConfig,
    rng: SmallRng,
    tick: u64,
    order_seq: u64,
    swap_seq: u64,
    vehicles: Vec<SimVehicle>,
    stations: Vec<SimStation>,
    spares: Vec<SimSpare>,
    orders: Vec<SimOrder>,
    swaps: Vec<SimSwap>,
}

impl FeedSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let mut rng = SmallRng::seed_from_u64(config.seed);

        let stations = (0..config.stations)
            .map(|i| {
                let angle = i as f64 / config.stations.max(1) as f64 * TAU;
                SimStation {
                    id: format!("BS-{:02}", i + 1),
                    name: format!("Swap Station {}", i + 1),
                    address: format!("Jl. Stasiun Tukar {}", i + 1),
                    position: LatLon::new(
                        config.center.lat + 0.012 * angle.sin(),
                        config.center.lon + 0.012 * angle.cos(),
                    ),
                    total_slots: 4,
                }
            })
            .collect::<Vec<_>>();

        let spares = (0..config.stations * 2)
            .map(|i| SimSpare {
                id: format!("BT-S{:02}", i + 1),
                station_index: i % config.stations.max(1),
                charge: rng.gen_range(40.0..100.0),
            })
            .collect();

        let vehicles = (0..config.vehicles)
            .map(|i| SimVehicle {
                id: format!("MB-{:02}", i + 1),
                battery_id: format!("BT-{:02}", i + 1),
                position: LatLon::new(
                    config.center.lat + rng.gen_range(-0.01..0.01),
                    config.center.lon + rng.gen_range(-0.01..0.01),
                ),
                charge: rng.gen_range(35.0..95.0),
                cycles: 0,
                order: None,
            })
            .collect();

        Self {
            config,
            rng,
            tick: 0,
            order_seq: 0,
            swap_seq: 0,
            vehicles,
            stations,
            spares,
            orders: Vec::new(),
            swaps: Vec::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance the fleet one tick and render the frame.
    pub fn next_frame(&mut self) -> Value {
        self.tick += 1;
        self.advance();
        self.render()
    }

    fn advance(&mut self) {
        let tick = self.tick;
        let config = self.config;
        let rng = &mut self.rng;

        for spare in &mut self.spares {
            spare.charge = (spare.charge + SPARE_CHARGE_PER_TICK).min(100.0);
        }

        for (index, vehicle) in self.vehicles.iter_mut().enumerate() {
            vehicle.position = LatLon::new(
                vehicle.position.lat + rng.gen_range(-1.0..1.0) * config.walk_step_deg,
                vehicle.position.lon + rng.gen_range(-1.0..1.0) * config.walk_step_deg,
            );
            vehicle.charge -= rng.gen_range(0.2..0.8);

            if self.stations.is_empty() {
                // nowhere to swap; the battery just runs flat
                vehicle.charge = vehicle.charge.max(0.0);
            } else if vehicle.charge < SWAP_THRESHOLD {
                let station_index = index % self.stations.len();
                self.swap_seq += 1;
                self.swaps.push(SimSwap {
                    id: format!("SS-{:04}", self.swap_seq),
                    vehicle: vehicle.id.clone(),
                    station_index,
                    slot: format!("{}", index % 4 + 1),
                    tick,
                });
                vehicle.charge = rng.gen_range(88.0..100.0);
                vehicle.cycles += 1;
            }
        }

        // complete before opening so an order lives at least one tick
        for order in &mut self.orders {
            if order.done_tick.is_none() && rng.gen_bool(config.completion_rate) {
                order.done_tick = Some(tick);
            }
        }
        for order in &self.orders {
            if order.done_tick == Some(tick) {
                if let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id == order.vehicle) {
                    vehicle.order = None;
                }
            }
        }

        for vehicle in &mut self.vehicles {
            if vehicle.order.is_some() || !rng.gen_bool(config.order_rate) {
                continue;
            }
            self.order_seq += 1;
            let id = format!("ORD-{:04}", self.order_seq);
            let origin = vehicle.position;
            let destination = LatLon::new(
                config.center.lat + rng.gen_range(-0.04..0.04),
                config.center.lon + rng.gen_range(-0.04..0.04),
            );
            let midpoint = LatLon::new(
                (origin.lat + destination.lat) / 2.0 + rng.gen_range(-0.002..0.002),
                (origin.lon + destination.lon) / 2.0 + rng.gen_range(-0.002..0.002),
            );
            self.orders.push(SimOrder {
                id: id.clone(),
                vehicle: vehicle.id.clone(),
                path: vec![origin, midpoint, destination],
                created_tick: tick,
                done_tick: None,
            });
            vehicle.order = Some(id);
        }

        self.orders
            .retain(|order| match order.done_tick {
                Some(done) => tick - done <= HISTORY_TICKS,
                None => true,
            });
        self.swaps.retain(|swap| tick - swap.tick <= HISTORY_TICKS);
    }

    fn render(&mut self) -> Value {
        let motorbikes: Vec<Value> = self
            .vehicles
            .iter()
            .map(|vehicle| {
                let mut record = json!({
                    "id": vehicle.id,
                    "latitude": vehicle.position.lat,
                    "longitude": vehicle.position.lon,
                    "status": if vehicle.order.is_some() { "busy" } else { "idle" },
                    "battery_id": vehicle.battery_id,
                    "online_status": "online",
                });
                if let Some(order_id) = &vehicle.order {
                    record["order_id"] = json!(order_id);
                } else if let Some(swap) = self
                    .swaps
                    .iter()
                    .rev()
                    .find(|swap| swap.vehicle == vehicle.id)
                {
                    record["swap_schedule"] = json!({
                        "id": swap.id,
                        "battery_station": self.stations[swap.station_index].id,
                        "slot": swap.slot,
                        "status": "scheduled",
                    });
                }
                record
            })
            .collect();

        let stations: Vec<Value> = self
            .stations
            .iter()
            .enumerate()
            .map(|(index, station)| {
                let slots: Vec<&str> = self
                    .spares
                    .iter()
                    .filter(|spare| spare.station_index == index)
                    .map(|spare| spare.id.as_str())
                    .collect();
                json!({
                    "id": station.id,
                    "name": station.name,
                    "latitude": station.position.lat,
                    "longitude": station.position.lon,
                    "total_slots": station.total_slots,
                    "slots": slots,
                    "alamat": station.address,
                })
            })
            .collect();

        let mut batteries: Vec<Value> = self
            .vehicles
            .iter()
            .map(|vehicle| {
                json!({
                    "id": vehicle.battery_id,
                    "capacity": BATTERY_CAPACITY_WH,
                    "battery_now": vehicle.charge,
                    "battery_total_charged": f64::from(vehicle.cycles) * BATTERY_CAPACITY_WH,
                    "cycle": vehicle.cycles,
                    "location": "motorbike",
                    "location_id": vehicle.id,
                })
            })
            .collect();
        batteries.extend(self.spares.iter().map(|spare| {
            json!({
                "id": spare.id,
                "capacity": BATTERY_CAPACITY_WH,
                "battery_now": spare.charge,
                "battery_total_charged": 0.0,
                "cycle": 0,
                "location": "station",
                "location_id": self.stations[spare.station_index].id,
            })
        }));

        let order_record = |order: &SimOrder, status: &str| {
            let origin = order.path[0];
            let destination = order.path[order.path.len() - 1];
            let mut record = json!({
                "id": order.id,
                "status": status,
                "assigned_motorbike_id": order.vehicle,
                "order_origin_lat": origin.lat,
                "order_origin_lon": origin.lon,
                "order_destination_lat": destination.lat,
                "order_destination_lon": destination.lon,
                "created_at": format!("tick-{}", order.created_tick),
            });
            if let Some(done) = order.done_tick {
                record["completed_at"] = json!(format!("tick-{}", done));
            }
            record
        };

        let order_active: Vec<Value> = self
            .orders
            .iter()
            .filter(|order| order.done_tick.is_none())
            .map(|order| order_record(order, "active"))
            .collect();
        let order_done: Vec<Value> = self
            .orders
            .iter()
            .filter(|order| order.done_tick.is_some())
            .map(|order| order_record(order, "done"))
            .collect();

        let mut active_assignments = serde_json::Map::new();
        for order in self.orders.iter().filter(|order| order.done_tick.is_none()) {
            let mut entry = json!({
                "base_id": order.id,
                "polyline": polyline::encode(&order.path),
            });
            if self.rng.gen_bool(0.5) {
                entry["deviate_radius"] = json!(1_500.0);
            }
            active_assignments.insert(order.vehicle.clone(), entry);
        }

        let swap_schedules: Vec<Value> = self
            .swaps
            .iter()
            .map(|swap| {
                json!({
                    "id": swap.id,
                    "ev_id": swap.vehicle,
                    "battery_station": self.stations[swap.station_index].id,
                    "slot": swap.slot,
                    "waiting_time": 4.0,
                    "travel_time": 6.0,
                    "scheduled_time": format!("tick-{}", swap.tick),
                    "status": "scheduled",
                })
            })
            .collect();

        json!({
            "fleet_ev_motorbikes": motorbikes,
            "battery_swap_station": stations,
            "batteries": batteries,
            "order_search_driver": [],
            "order_active": order_active,
            "order_done": order_done,
            "order_failed": [],
            "active_assignments": Value::Object(active_assignments),
            "swap_schedules": swap_schedules,
            "time_now": unix_now(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to bind feed listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Websocket publisher for simulator frames.
pub struct FeedServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl FeedServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self, FeedError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| FeedError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| FeedError::Bind { addr, source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Publish one frame per interval to every subscriber until the task
    /// is dropped.
    pub async fn run(self, mut simulator: FeedSimulator, interval: Duration) {
        let (frame_tx, _) = broadcast::channel::<String>(64);
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let frame = simulator.next_frame().to_string();
                    // fails only while nobody is subscribed
                    let _ = frame_tx.send(frame);
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!(target: "fleetglass::feed", %peer, "subscriber.connected");
                            tokio::spawn(serve_subscriber(stream, frame_tx.subscribe()));
                        }
                        Err(err) => {
                            warn!(target: "fleetglass::feed", error = %err, "subscriber.accept_failed");
                        }
                    }
                }
            }
        }
    }
}

async fn serve_subscriber(stream: TcpStream, mut frames: broadcast::Receiver<String>) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(err) => {
            warn!(target: "fleetglass::feed", error = %err, "subscriber.handshake_failed");
            return;
        }
    };

    loop {
        match frames.recv().await {
            Ok(frame) => {
                if ws_stream.send(Message::Text(frame)).await.is_err() {
                    debug!(target: "fleetglass::feed", "subscriber.gone");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(target: "fleetglass::feed", skipped, "subscriber.lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_proto::{snapshot_from_value, SanitizeOptions};

    #[test]
    fn frames_sanitize_into_full_snapshots() {
        let config = SimulatorConfig {
            order_rate: 1.0,
            ..SimulatorConfig::default()
        };
        let mut simulator = FeedSimulator::new(config);

        let frame = simulator.next_frame();
        let sanitized = snapshot_from_value(&frame, &SanitizeOptions::default()).unwrap();

        assert_eq!(sanitized.snapshot.vehicles.len(), config.vehicles);
        assert_eq!(sanitized.snapshot.stations.len(), config.stations);
        assert_eq!(sanitized.report.dropped_vehicles, 0);
        // order_rate 1.0 gives every vehicle an assignment on tick one
        assert_eq!(sanitized.snapshot.assignments.len(), config.vehicles);
    }

    #[test]
    fn same_seed_same_fleet() {
        let mut left = FeedSimulator::new(SimulatorConfig::default());
        let mut right = FeedSimulator::new(SimulatorConfig::default());

        let left_frame = left.next_frame();
        let right_frame = right.next_frame();
        assert_eq!(
            left_frame["fleet_ev_motorbikes"],
            right_frame["fleet_ev_motorbikes"]
        );
        assert_eq!(left_frame["batteries"], right_frame["batteries"]);
    }

    #[test]
    fn charges_stay_in_range_across_swaps() {
        let mut simulator = FeedSimulator::new(SimulatorConfig::default());
        for _ in 0..300 {
            simulator.next_frame();
        }
        for vehicle in &simulator.vehicles {
            assert!(vehicle.charge > 0.0 && vehicle.charge <= 100.0, "{}", vehicle.id);
        }
        for spare in &simulator.spares {
            assert!(spare.charge <= 100.0);
        }
    }

    #[test]
    fn stationless_fleet_runs_flat_instead_of_swapping() {
        let mut simulator = FeedSimulator::new(SimulatorConfig {
            stations: 0,
            ..SimulatorConfig::default()
        });
        // enough ticks for every battery to cross the swap threshold
        for _ in 0..400 {
            simulator.next_frame();
        }
        assert!(simulator.spares.is_empty());
        assert!(simulator.swaps.is_empty());
        for vehicle in &simulator.vehicles {
            assert!(vehicle.charge >= 0.0, "{}", vehicle.id);
        }
    }

    #[test]
    fn completed_orders_leave_the_active_list() {
        let config = SimulatorConfig {
            order_rate: 1.0,
            completion_rate: 1.0,
            ..SimulatorConfig::default()
        };
        let mut simulator = FeedSimulator::new(config);

        simulator.next_frame();
        let frame = simulator.next_frame();

        // tick-one orders all completed on tick two, before new ones opened
        let done = frame["order_done"].as_array().unwrap();
        assert_eq!(done.len(), config.vehicles);
        assert!(done.iter().all(|order| order["completed_at"] == "tick-2"));
    }
}
