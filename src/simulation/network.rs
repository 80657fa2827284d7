//! Simulation orchestrator.
//!
//! Owns the node population, the protocol instance and the random source, and
//! drives one of two run loops:
//! - `run`: a fixed number of sends between uniformly chosen node pairs
//! - `run_with_mobility`: a wall-clock paced loop where every alive node moves
//!   and then sends once per iteration, until the duration elapses or a stop
//!   is requested
//!
//! Metrics are recomputed from current state on every `metrics()` call.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::common::config::{ConfigError, SimulationConfig};

use super::energy::EnergyModel;
use super::events::{EventSink, NodeView, SimulationEvent};
use super::geometry::random_position;
use super::node::Node;
use super::protocol::{Protocol, SendOutcome};
use super::signal_calculations::Channel;
use super::types::{Environment, NodeId};

/// Indoor deployments never exceed this many nodes.
pub const INDOOR_MAX_NODES: usize = 15;
/// Initial battery energy range (J) before the environment multiplier.
const INITIAL_ENERGY_RANGE: std::ops::Range<f64> = 80.0..120.0;
/// Indoor devices get a better power supply.
const INDOOR_ENERGY_MULTIPLIER: f64 = 1.5;

/// Point-in-time metrics of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Packet delivery ratio in percent, two decimals.
    pub pdr_percent: f64,
    /// Mean delay of delivered packets in milliseconds, one decimal.
    pub avg_delay_ms: f64,
    pub total_energy_used_j: f64,
    pub collisions: u64,
    pub active_nodes: usize,
    pub total_nodes: usize,
    pub avg_spreading_factor: f64,
    pub avg_bandwidth_khz: f64,
    pub indoor_detections: usize,
    pub parameter_adaptations: u64,
}

impl MetricsSnapshot {
    /// Display names and formatted values, in export column order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Packets Sent", self.packets_sent.to_string()),
            ("Packets Received", self.packets_received.to_string()),
            ("PDR (%)", format_rounded(self.pdr_percent)),
            ("Avg Delay (ms)", format_rounded(self.avg_delay_ms)),
            ("Total Energy Used (J)", format_rounded(self.total_energy_used_j)),
            ("Collisions", self.collisions.to_string()),
            ("Active Nodes", self.active_nodes.to_string()),
            ("Total Nodes", self.total_nodes.to_string()),
            ("Avg SF", format_rounded(self.avg_spreading_factor)),
            ("Avg BW (kHz)", format_rounded(self.avg_bandwidth_khz)),
            ("Indoor Detections", self.indoor_detections.to_string()),
            ("Parameter Adaptations", self.parameter_adaptations.to_string()),
        ]
    }
}

/// Send attempts of the current run.
#[derive(Debug, Clone, Copy, Default)]
struct RunTally {
    sent: u64,
    delivered: u64,
    /// Sum of delays of delivered packets (s).
    total_delay: f64,
}

/// Run flags shared between the simulation and its stop handles.
#[derive(Debug, Default)]
struct RunState {
    running: AtomicBool,
    /// Set by a stop request, cleared when a mobility run finishes.
    stop_requested: AtomicBool,
}

impl RunState {
    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Cloneable handle that asks a running mobility loop to stop.
///
/// The request is observed at the next iteration boundary; repeated calls are
/// harmless. A request made before the loop starts ends that run immediately.
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<RunState>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.state.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

pub struct Simulation<R: Rng = StdRng> {
    nodes: Vec<Node>,
    protocol: Protocol,
    area_size: f64,
    environment: Environment,
    rng: R,
    sink: Box<dyn EventSink>,
    state: Arc<RunState>,
    tally: RunTally,
}

impl Simulation<StdRng> {
    /// Build a simulation seeded from `config.seed`, or from entropy when absent.
    pub fn new(config: &SimulationConfig, sink: Box<dyn EventSink>) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng, sink)
    }
}

impl<R: Rng> Simulation<R> {
    /// Build a simulation drawing all randomness from `rng`.
    ///
    /// Node count is clamped to the supported range and capped indoors; nodes
    /// get uniform integer positions and a random initial energy.
    pub fn with_rng(config: &SimulationConfig, mut rng: R, mut sink: Box<dyn EventSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let environment = config.environment;
        let area_size = config.effective_area_size();

        let mut node_count = config.clamped_node_count();
        if environment.is_indoor() && node_count > INDOOR_MAX_NODES {
            node_count = INDOOR_MAX_NODES;
            sink.emit(SimulationEvent::Log(format!("Reduced nodes to {} for indoor environment", node_count)));
        }

        let nodes: Vec<Node> = (1..=node_count)
            .map(|i| {
                let position = random_position(area_size, &mut rng);
                let mut energy = rng.gen_range(INITIAL_ENERGY_RANGE);
                if environment.is_indoor() {
                    energy *= INDOOR_ENERGY_MULTIPLIER;
                }
                Node::new(NodeId(i as u32), position, energy, environment)
            })
            .collect();

        let protocol = Protocol::new(Channel::new(environment), EnergyModel::default(), config.adaptive);
        log::debug!("Created {} nodes in a {}x{} {} area", node_count, area_size, area_size, environment);

        Ok(Self {
            nodes,
            protocol,
            area_size,
            environment,
            rng,
            sink,
            state: Arc::new(RunState::default()),
            tally: RunTally::default(),
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn area_size(&self) -> f64 {
        self.area_size
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Request a stop of the mobility loop at its next iteration boundary.
    pub fn stop(&mut self) {
        self.state.request_stop();
        self.sink.emit(SimulationEvent::Log("Simulation stopped manually.".to_string()));
    }

    fn log_line(&mut self, line: String) {
        self.sink.emit(SimulationEvent::Log(line));
    }

    fn adaptive_label(&self) -> &'static str {
        if self.protocol.is_adaptive() { "ENABLED" } else { "DISABLED" }
    }

    /// Send `message_count` messages between random distinct node pairs.
    ///
    /// Dead nodes are still eligible for selection; the protocol rejects them.
    pub fn run(&mut self, message_count: usize) -> MetricsSnapshot {
        let start = Instant::now();
        self.log_line(format!(
            "Simulation started with {} nodes in {} environment.",
            self.nodes.len(),
            self.environment
        ));
        self.log_line(format!("Adaptive protocol: {}", self.adaptive_label()));

        let node_count = self.nodes.len();
        if node_count < 2 {
            self.log_line("Not enough nodes to exchange messages.".to_string());
        } else {
            for _ in 0..message_count {
                let src = self.rng.gen_range(0..node_count);
                let mut dst = self.rng.gen_range(0..node_count - 1);
                if dst >= src {
                    dst += 1;
                }
                self.send_packet(src, dst);
            }
        }

        self.log_line(format!("Simulation completed in {:.2} seconds.", start.elapsed().as_secs_f64()));
        self.finish()
    }

    /// Move-and-send loop paced by `interval`, bounded by `duration`.
    ///
    /// The attempt tally is reset at start. Each iteration moves every alive
    /// node, publishes a refresh, then lets every alive node send once to a
    /// random other alive node. The stop flag is checked once per iteration;
    /// a pending stop request skips the loop entirely and is consumed here.
    pub fn run_with_mobility(&mut self, duration: Duration, interval: Duration) -> MetricsSnapshot {
        self.state.running.store(true, Ordering::SeqCst);
        self.tally = RunTally::default();
        let start = Instant::now();

        self.log_line(format!("Starting timed simulation for {} seconds...", duration.as_secs_f64()));
        self.log_line(format!("Adaptive protocol: {}", self.adaptive_label()));

        while start.elapsed() < duration && !self.state.stop_requested.load(Ordering::SeqCst) {
            for node in self.nodes.iter_mut().filter(|n| n.is_alive()) {
                node.move_within(self.area_size, self.environment, &mut self.rng);
            }
            self.emit_refresh();

            for src in 0..self.nodes.len() {
                if !self.nodes[src].is_alive() {
                    continue;
                }
                let candidates: Vec<usize> = (0..self.nodes.len()).filter(|&i| i != src && self.nodes[i].is_alive()).collect();
                if candidates.is_empty() {
                    continue;
                }
                let dst = candidates[self.rng.gen_range(0..candidates.len())];
                self.send_packet(src, dst);
            }

            thread::sleep(interval);
        }

        self.state.running.store(false, Ordering::SeqCst);
        self.state.stop_requested.store(false, Ordering::SeqCst);
        self.log_line(format!("Simulation ended after {:.1} seconds.", start.elapsed().as_secs_f64()));
        self.finish()
    }

    fn finish(&mut self) -> MetricsSnapshot {
        let metrics = self.metrics();
        self.log_line("Simulation Results:".to_string());
        for (name, value) in metrics.fields() {
            self.log_line(format!("   {}: {}", name, value));
        }
        self.sink.emit(SimulationEvent::Finished(metrics.clone()));
        metrics
    }

    /// One protocol send between two population indices, with its events.
    fn send_packet(&mut self, src: usize, dst: usize) {
        let src_id = self.nodes[src].node_id;
        let dst_id = self.nodes[dst].node_id;
        let payload = format!("Msg{} from {}", self.tally.sent + 1, src_id);

        let outcome = self.protocol.send_message(&mut self.nodes, src_id, dst_id, &payload, &mut self.rng);

        self.tally.sent += 1;
        let delivered = outcome.delivered();
        if delivered {
            self.tally.delivered += 1;
            self.tally.total_delay += outcome.delay();
        }
        if let SendOutcome::Faulted(fault) = &outcome {
            self.log_line(format!("Protocol error: {}", fault));
        }

        let sender = &self.nodes[src];
        let line = format!(
            "[{}] {} -> {} | Dist: {:.1}m | SF: {} | BW: {}kHz | CR: {} | Delay: {:.1}ms | Energy: {:.1}J | Motion: {}",
            if delivered { "OK" } else { "FAIL" },
            src_id,
            dst_id,
            sender.distance_to(&self.nodes[dst]),
            sender.spreading_factor,
            sender.bandwidth.khz(),
            sender.coding_rate,
            outcome.delay() * 1000.0,
            sender.energy(),
            if sender.motion_detected { "Yes" } else { "No" }
        );
        self.log_line(line);
        self.sink.emit(SimulationEvent::PacketAttempt {
            src: src_id,
            dst: dst_id,
            delivered,
        });
        self.emit_refresh();
    }

    pub fn node_views(&self) -> Vec<NodeView> {
        self.nodes
            .iter()
            .map(|n| NodeView {
                node_id: n.node_id,
                position: n.position,
                energy: n.energy(),
                energy_level: n.energy_level(),
                spreading_factor: n.spreading_factor,
                bandwidth_khz: n.bandwidth.khz(),
                motion_detected: n.motion_detected,
                alive: n.is_alive(),
            })
            .collect()
    }

    fn emit_refresh(&mut self) {
        let views = self.node_views();
        self.sink.emit(SimulationEvent::VisualizationRefresh(views));
    }

    /// Recompute the metrics snapshot from current node and protocol state.
    pub fn metrics(&self) -> MetricsSnapshot {
        let sent = self.tally.sent;
        let received = self.tally.delivered;
        let pdr = if sent > 0 { received as f64 / sent as f64 * 100.0 } else { 0.0 };
        let avg_delay_ms = if received > 0 { self.tally.total_delay / received as f64 * 1000.0 } else { 0.0 };

        let total_nodes = self.nodes.len();
        let total_energy: f64 = self.nodes.iter().map(Node::energy_used).sum();
        let (avg_sf, avg_bw) = if total_nodes > 0 {
            let sf: f64 = self.nodes.iter().map(|n| n.spreading_factor as f64).sum();
            let bw: f64 = self.nodes.iter().map(|n| n.bandwidth.khz() as f64).sum();
            (sf / total_nodes as f64, bw / total_nodes as f64)
        } else {
            (0.0, 0.0)
        };

        MetricsSnapshot {
            packets_sent: sent,
            packets_received: received,
            pdr_percent: round_to(pdr, 2),
            avg_delay_ms: round_to(avg_delay_ms, 1),
            total_energy_used_j: round_to(total_energy, 2),
            collisions: self.protocol.collisions(),
            active_nodes: self.nodes.iter().filter(|n| n.is_alive()).count(),
            total_nodes,
            avg_spreading_factor: round_to(avg_sf, 2),
            avg_bandwidth_khz: round_to(avg_bw, 2),
            indoor_detections: self.nodes.iter().filter(|n| n.motion_detected).count(),
            parameter_adaptations: self.nodes.iter().map(|n| n.adaptation_counter).sum(),
        }
    }
}

/// Shortest form of an already rounded value, always keeping a decimal point (`70.0`, `0.12`).
fn format_rounded(value: f64) -> String {
    format!("{:?}", value)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
