//! Per-node radio, energy and mobility state.
//!
//! A node owns its energy budget and its own power-state model. It exposes:
//! - `transmit` / `receive`, which charge short TX/RX bursts
//! - `move_within`, a bounded random walk with an indoor motion heuristic
//! - `adapt`, the LoRaMPP parameter policy driven by link quality
//!
//! A node whose energy reaches zero is dead: every operation becomes a no-op
//! and the record stays in the population as an inert entry.

use chrono::Utc;
use rand::Rng;
use std::collections::VecDeque;

use super::energy::EnergyModel;
use super::geometry::{clamp_to_area, distance, random_offset};
use super::types::{
    Bandwidth, CodingRate, EnergyLevel, Environment, MAX_SPREADING_FACTOR, MAX_TX_POWER_DBM, MIN_SPREADING_FACTOR, MIN_TX_POWER_DBM,
    NodeId, OutboundPacket, Point, PowerState, ReceivedPacket,
};

/// Time spent in TX by a single `transmit` call (s).
const TX_BURST_SECS: f64 = 0.1;
/// Time spent in RX by a single `receive` call (s).
const RX_BURST_SECS: f64 = 0.05;
/// Energy cost of one outdoor move (J).
const MOVE_ENERGY_J: f64 = 0.005;
/// Largest indoor step per axis.
const INDOOR_STEP_MAX: i64 = 2;
/// Largest outdoor step per axis.
const OUTDOOR_STEP_MAX: i64 = 5;
/// Remaining Joules per unit of outdoor step length.
const ENERGY_PER_STEP_UNIT: f64 = 20.0;
/// Displacement band (exclusive) recognised as indoor-style motion.
const MOTION_BAND: (f64, f64) = (0.2, 3.0);
/// A uniform draw must exceed this for motion to be flagged.
const MOTION_DRAW_THRESHOLD: f64 = 0.7;

/// Link considered weak below this RSSI (dBm).
const WEAK_RSSI_DBM: f64 = -110.0;
/// Link considered strong above this RSSI (dBm).
const STRONG_RSSI_DBM: f64 = -80.0;
/// Link considered strong above this SNR (dB).
const STRONG_SNR_DB: f64 = 10.0;
/// Indoor links switch to 500 kHz above this SNR (dB).
const INDOOR_WIDE_BAND_SNR_DB: f64 = -5.0;
/// Highest spreading factor used indoors.
const INDOOR_MAX_SPREADING_FACTOR: u8 = 9;
/// Highest transmit power used indoors (dBm).
const INDOOR_MAX_TX_POWER_DBM: f64 = 14.0;
/// Strong outdoor links never reduce power below this (dBm).
const STRONG_LINK_MIN_TX_POWER_DBM: f64 = 10.0;
const WEAK_LINK_POWER_STEP_DBM: f64 = 3.0;
const STRONG_LINK_POWER_STEP_DBM: f64 = 2.0;

/// Default transmit power at creation (dBm).
pub const DEFAULT_TX_POWER_DBM: f64 = 14.0;

#[derive(Debug, Clone)]
pub struct Node {
    pub node_id: NodeId,
    pub position: Point,
    pub tx_power: f64,
    pub spreading_factor: u8,
    pub bandwidth: Bandwidth,
    pub coding_rate: CodingRate,
    energy: f64,
    initial_energy: f64,
    pub state: PowerState,
    pub environment: Environment,
    pub packet_queue: VecDeque<OutboundPacket>,
    pub received_packets: Vec<ReceivedPacket>,
    pub transmitted_count: u64,
    pub received_count: u64,
    pub adaptation_counter: u64,
    pub motion_detected: bool,
    energy_model: EnergyModel,
}

impl Node {
    /// Create a node with default radio settings (14 dBm, SF7, 125 kHz, 4/5).
    ///
    /// The starting energy also becomes the node's fixed initial energy; negative
    /// values are treated as an empty battery.
    pub fn new(node_id: NodeId, position: Point, energy: f64, environment: Environment) -> Self {
        let energy = energy.max(0.0);
        Self {
            node_id,
            position,
            tx_power: DEFAULT_TX_POWER_DBM,
            spreading_factor: MIN_SPREADING_FACTOR,
            bandwidth: Bandwidth::Khz125,
            coding_rate: CodingRate::Cr4_5,
            energy,
            initial_energy: energy,
            state: PowerState::Idle,
            environment,
            packet_queue: VecDeque::new(),
            received_packets: Vec::new(),
            transmitted_count: 0,
            received_count: 0,
            adaptation_counter: 0,
            motion_detected: false,
            energy_model: EnergyModel::default(),
        }
    }

    /// Remaining energy (J).
    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Energy spent since creation (J), never negative.
    pub fn energy_used(&self) -> f64 {
        (self.initial_energy - self.energy).max(0.0)
    }

    pub fn is_alive(&self) -> bool {
        self.energy > 0.0
    }

    pub fn energy_level(&self) -> EnergyLevel {
        EnergyLevel::from_joules(self.energy)
    }

    /// Draw `amount` Joules, clamping the result into `[0, initial_energy]`.
    pub fn consume_energy(&mut self, amount: f64) -> f64 {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        self.energy = (self.energy - amount).clamp(0.0, self.initial_energy);
        self.energy
    }

    fn enter_state(&mut self, state: PowerState, duration_secs: f64) {
        let used = self.energy_model.energy_for(state, duration_secs);
        self.state = state;
        self.consume_energy(used);
    }

    /// Queue a packet for `destination` using the current radio parameters.
    ///
    /// Returns `None` without side effects when the node is dead.
    pub fn transmit(&mut self, destination: NodeId, payload: &str) -> Option<OutboundPacket> {
        if !self.is_alive() {
            return None;
        }

        let packet = OutboundPacket {
            src: self.node_id,
            dst: destination,
            payload: payload.to_string(),
            spreading_factor: self.spreading_factor,
            bandwidth: self.bandwidth,
            coding_rate: self.coding_rate,
            timestamp: Utc::now(),
        };

        self.enter_state(PowerState::Tx, TX_BURST_SECS);
        self.packet_queue.push_back(packet.clone());
        self.transmitted_count += 1;
        Some(packet)
    }

    /// Accept a delivered packet. Returns `false` when the node is dead.
    pub fn receive(&mut self, packet: ReceivedPacket) -> bool {
        if !self.is_alive() {
            return false;
        }

        self.enter_state(PowerState::Rx, RX_BURST_SECS);
        self.received_packets.push(packet);
        self.received_count += 1;
        true
    }

    /// Random walk step inside `[0, area_size]²`.
    ///
    /// Indoor steps are at most 2 units and free; outdoor steps shrink with the
    /// remaining energy (at most 5 units) and cost a fixed amount per move. The
    /// motion flag is rewritten on every effective move and can only be set
    /// indoors.
    pub fn move_within<R: Rng + ?Sized>(&mut self, area_size: f64, environment: Environment, rng: &mut R) {
        if !self.is_alive() {
            return;
        }

        let step_max = if environment.is_indoor() {
            INDOOR_STEP_MAX
        } else {
            OUTDOOR_STEP_MAX.min((self.energy / ENERGY_PER_STEP_UNIT).floor() as i64)
        };
        if step_max < 1 {
            return;
        }

        let previous = self.position;
        let (dx, dy) = random_offset(step_max, rng);
        self.position = clamp_to_area(Point::new(previous.x + dx, previous.y + dy), area_size);

        let displacement = distance(&previous, &self.position);
        let in_band = displacement > MOTION_BAND.0 && displacement < MOTION_BAND.1;
        self.motion_detected = environment.is_indoor() && in_band && rng.gen_range(0.0..1.0) > MOTION_DRAW_THRESHOLD;

        if !environment.is_indoor() {
            self.consume_energy(MOVE_ENERGY_J);
        }
    }

    /// Retune radio parameters from an observed link.
    ///
    /// The indoor branch (motion detected or indoor deployment) short-circuits
    /// the outdoor weak/strong branches; the final range clamp always runs.
    pub fn adapt(&mut self, rssi: f64, snr: f64, motion_detected: bool) {
        self.adaptation_counter += 1;

        let indoor = motion_detected || self.environment.is_indoor();

        if indoor {
            self.spreading_factor = self.spreading_factor.clamp(MIN_SPREADING_FACTOR, INDOOR_MAX_SPREADING_FACTOR);
            self.bandwidth = if snr > INDOOR_WIDE_BAND_SNR_DB {
                Bandwidth::Khz500
            } else {
                Bandwidth::Khz250
            };
            self.tx_power = self.tx_power.clamp(MIN_TX_POWER_DBM, INDOOR_MAX_TX_POWER_DBM);
            self.coding_rate = CodingRate::Cr4_5;
        } else if rssi < WEAK_RSSI_DBM || snr < 0.0 {
            self.spreading_factor = (self.spreading_factor + 1).min(MAX_SPREADING_FACTOR);
            self.tx_power = (self.tx_power + WEAK_LINK_POWER_STEP_DBM).min(MAX_TX_POWER_DBM);
            self.bandwidth = Bandwidth::Khz125;
            self.coding_rate = CodingRate::Cr4_8;
        } else if rssi > STRONG_RSSI_DBM && snr > STRONG_SNR_DB {
            self.spreading_factor = self.spreading_factor.saturating_sub(1).max(MIN_SPREADING_FACTOR);
            self.bandwidth = Bandwidth::Khz250;
            self.tx_power = (self.tx_power - STRONG_LINK_POWER_STEP_DBM).max(STRONG_LINK_MIN_TX_POWER_DBM);
            self.coding_rate = CodingRate::Cr4_5;
        }

        self.spreading_factor = self.spreading_factor.clamp(MIN_SPREADING_FACTOR, MAX_SPREADING_FACTOR);
        if self.bandwidth < Bandwidth::Khz125 {
            self.bandwidth = Bandwidth::Khz125;
        }
        self.tx_power = self.tx_power.clamp(MIN_TX_POWER_DBM, MAX_TX_POWER_DBM);
    }

    pub fn distance_to(&self, other: &Node) -> f64 {
        distance(&self.position, &other.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn node(environment: Environment) -> Node {
        Node::new(NodeId(1), Point::new(50.0, 50.0), 100.0, environment)
    }

    fn packet() -> ReceivedPacket {
        ReceivedPacket {
            src: NodeId(2),
            dst: NodeId(1),
            payload: "hello".to_string(),
            rssi: -90.0,
            snr: 8.0,
            distance: 10.0,
            delay: 0.01,
        }
    }

    #[test]
    fn transmit_enqueues_and_charges_energy() {
        let mut n = node(Environment::Urban);
        let sent = n.transmit(NodeId(2), "Msg1").expect("alive node transmits");
        assert_eq!(sent.src, NodeId(1));
        assert_eq!(sent.dst, NodeId(2));
        assert_eq!(sent.spreading_factor, 7);
        assert_eq!(n.packet_queue.len(), 1);
        assert_eq!(n.transmitted_count, 1);
        assert!(n.energy() < 100.0);
        assert_eq!(n.state, PowerState::Tx);
    }

    #[test]
    fn receive_logs_packet() {
        let mut n = node(Environment::Urban);
        assert!(n.receive(packet()));
        assert_eq!(n.received_count, 1);
        assert_eq!(n.received_packets[0].payload, "hello");
        assert!(n.energy() < 100.0);
    }

    #[test]
    fn dead_node_is_inert() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut n = node(Environment::Urban);
        n.consume_energy(1_000.0);
        assert_eq!(n.energy(), 0.0);
        assert!(!n.is_alive());
        assert!(n.transmit(NodeId(2), "x").is_none());
        assert!(!n.receive(packet()));
        let before = n.position;
        n.move_within(100.0, Environment::Urban, &mut rng);
        assert_eq!(n.position, before);
        assert_eq!(n.transmitted_count, 0);
        assert_eq!(n.received_count, 0);
    }

    #[test]
    fn energy_never_increases_or_goes_negative() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut n = Node::new(NodeId(3), Point::new(10.0, 10.0), 0.5, Environment::Rural);
        let mut previous = n.energy();
        for i in 0..500 {
            match i % 4 {
                0 => {
                    n.transmit(NodeId(4), "payload");
                }
                1 => {
                    n.receive(packet());
                }
                2 => n.move_within(100.0, Environment::Rural, &mut rng),
                _ => {
                    n.consume_energy(-3.0);
                    n.consume_energy(f64::NAN);
                }
            }
            assert!(n.energy() <= previous);
            assert!(n.energy() >= 0.0);
            previous = n.energy();
        }
        assert_eq!(n.energy(), 0.0);
        assert!((n.energy_used() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn indoor_moves_are_small_and_free() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut n = node(Environment::Indoor);
        for _ in 0..200 {
            let before = n.position;
            n.move_within(50.0, Environment::Indoor, &mut rng);
            assert!((n.position.x - before.x).abs() <= 2.0);
            assert!((n.position.y - before.y).abs() <= 2.0);
            assert!((0.0..=50.0).contains(&n.position.x));
        }
        assert_eq!(n.energy(), 100.0);
    }

    #[test]
    fn outdoor_moves_cost_energy_and_never_flag_motion() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut n = node(Environment::Urban);
        for _ in 0..200 {
            n.move_within(100.0, Environment::Urban, &mut rng);
            assert!(!n.motion_detected);
        }
        assert!((n.energy() - (100.0 - 200.0 * MOVE_ENERGY_J)).abs() < 1e-9);
    }

    #[test]
    fn low_energy_outdoor_node_stays_put() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut n = Node::new(NodeId(1), Point::new(5.0, 5.0), 19.0, Environment::Urban);
        n.move_within(100.0, Environment::Urban, &mut rng);
        assert_eq!(n.position, Point::new(5.0, 5.0));
        assert_eq!(n.energy(), 19.0);
    }

    #[test]
    fn indoor_motion_is_eventually_detected() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut n = node(Environment::Indoor);
        let detected = (0..500).any(|_| {
            n.move_within(50.0, Environment::Indoor, &mut rng);
            n.motion_detected
        });
        assert!(detected);
    }

    #[test]
    fn weak_outdoor_link_boosts_range() {
        let mut n = node(Environment::Urban);
        n.adapt(-115.0, 3.0, false);
        assert_eq!(n.spreading_factor, 8);
        assert_eq!(n.tx_power, 17.0);
        assert_eq!(n.bandwidth, Bandwidth::Khz125);
        assert_eq!(n.coding_rate, CodingRate::Cr4_8);
        n.adapt(-90.0, -1.0, false);
        assert_eq!(n.spreading_factor, 9);
        assert_eq!(n.tx_power, 20.0);
        assert_eq!(n.adaptation_counter, 2);
    }

    #[test]
    fn strong_outdoor_link_trims_power() {
        let mut n = node(Environment::Rural);
        n.spreading_factor = 10;
        n.adapt(-60.0, 20.0, false);
        assert_eq!(n.spreading_factor, 9);
        assert_eq!(n.bandwidth, Bandwidth::Khz250);
        assert_eq!(n.tx_power, 12.0);
        n.adapt(-60.0, 20.0, false);
        n.adapt(-60.0, 20.0, false);
        assert_eq!(n.tx_power, 10.0);
        assert_eq!(n.spreading_factor, 7);
    }

    #[test]
    fn moderate_outdoor_link_keeps_parameters() {
        let mut n = node(Environment::Suburban);
        n.adapt(-95.0, 5.0, false);
        assert_eq!(n.spreading_factor, 7);
        assert_eq!(n.tx_power, 14.0);
        assert_eq!(n.bandwidth, Bandwidth::Khz125);
        assert_eq!(n.adaptation_counter, 1);
    }

    #[test]
    fn motion_forces_indoor_profile() {
        let mut n = node(Environment::Indoor);
        n.spreading_factor = 12;
        n.tx_power = 20.0;
        n.coding_rate = CodingRate::Cr4_8;
        n.adapt(-90.0, 2.0, true);
        assert_eq!(n.bandwidth, Bandwidth::Khz500);
        assert_eq!(n.coding_rate, CodingRate::Cr4_5);
        assert!((7..=9).contains(&n.spreading_factor));
        assert_eq!(n.tx_power, 14.0);

        let mut outdoor = node(Environment::Urban);
        outdoor.adapt(-130.0, -8.0, true);
        assert_eq!(outdoor.bandwidth, Bandwidth::Khz250);
        assert_eq!(outdoor.spreading_factor, 7);
    }

    #[test]
    fn adapt_always_respects_parameter_ranges() {
        let rssis = [-150.0, -111.0, -110.0, -95.0, -80.0, -79.0, -20.0];
        let snrs = [-30.0, -5.0, -0.1, 0.0, 6.0, 10.0, 10.1, 40.0];
        for env in Environment::ALL {
            for motion in [false, true] {
                let mut n = node(env);
                for _ in 0..3 {
                    for &rssi in &rssis {
                        for &snr in &snrs {
                            n.adapt(rssi, snr, motion);
                            assert!((7..=12).contains(&n.spreading_factor));
                            assert!(n.bandwidth.khz() >= 125);
                            assert!((2.0..=20.0).contains(&n.tx_power));
                        }
                    }
                }
            }
        }
    }
}
