//! LoRaMPP message dispatch.
//!
//! One `send_message` call runs the whole exchange for a single packet:
//! 1) resolve both endpoints and reject unknown or dead ones
//! 2) draw a collision against the current in-flight set
//! 3) sample the link and, when enabled, let the sender adapt its radio
//! 4) compute airtime plus propagation delay from the sender's parameters
//! 5) draw delivery from SNR and distance and hand the packet to the receiver
//!
//! The protocol never owns nodes; the orchestrator lends it the population
//! for the duration of one call.

use rand::Rng;
use std::collections::HashSet;
use std::fmt;

use super::energy::EnergyModel;
use super::node::Node;
use super::signal_calculations::{Channel, LinkQuality, calculate_air_time, propagation_delay};
use super::types::{NodeId, PowerState, ReceivedPacket};

/// Collision probability contributed by each in-flight transmission.
const COLLISION_PROBABILITY_PER_TRANSMISSION: f64 = 0.1;
/// TX time charged to a sender whose attempt collided (s).
const COLLISION_TX_SECS: f64 = 0.05;
/// Back-off delay reported for a collided attempt (s).
pub const COLLISION_DELAY_SECS: f64 = 0.05;
/// SNR (dB) above which the high delivery probability applies.
const GOOD_SNR_DB: f64 = 6.0;
const GOOD_LINK_DELIVERY_PROBABILITY: f64 = 0.9;
const POOR_LINK_DELIVERY_PROBABILITY: f64 = 0.3;
/// Distance (m) at which the linear delivery penalty reaches zero.
const DELIVERY_RANGE_M: f64 = 1000.0;

/// Internal fault raised while processing a send.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The channel produced a NaN or infinite figure.
    NonFiniteLink { rssi: f64, snr: f64, distance: f64 },
    /// The sender was already registered as transmitting.
    AlreadyInFlight(NodeId),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NonFiniteLink { rssi, snr, distance } => {
                write!(f, "non-finite link figures (rssi {}, snr {}, distance {})", rssi, snr, distance)
            }
            ProtocolError::AlreadyInFlight(id) => write!(f, "{} is already transmitting", id),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The receiver accepted the packet.
    Delivered { delay: f64 },
    /// The delivery draw failed; the airtime was still spent.
    Lost { delay: f64 },
    /// The attempt collided and was backed off.
    Collided { delay: f64 },
    /// An endpoint was unknown or out of energy.
    Rejected,
    /// Processing failed internally and was contained.
    Faulted(ProtocolError),
}

impl SendOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }

    /// Delay in seconds; zero for rejected and faulted attempts.
    pub fn delay(&self) -> f64 {
        match self {
            SendOutcome::Delivered { delay } | SendOutcome::Lost { delay } | SendOutcome::Collided { delay } => *delay,
            SendOutcome::Rejected | SendOutcome::Faulted(_) => 0.0,
        }
    }
}

pub struct Protocol {
    channel: Channel,
    energy_model: EnergyModel,
    collisions: u64,
    adaptive: bool,
    in_flight: HashSet<NodeId>,
}

impl Protocol {
    pub fn new(channel: Channel, energy_model: EnergyModel, adaptive: bool) -> Self {
        Self {
            channel,
            energy_model,
            collisions: 0,
            adaptive,
            in_flight: HashSet::new(),
        }
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Number of senders currently registered as transmitting.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Send `payload` from `src` to `dst`.
    ///
    /// Never fails: unknown or dead endpoints yield `Rejected`, and internal
    /// faults are logged and returned as `Faulted` with zero delay.
    pub fn send_message<R: Rng + ?Sized>(&mut self, nodes: &mut [Node], src: NodeId, dst: NodeId, payload: &str, rng: &mut R) -> SendOutcome {
        let (Some(src_index), Some(dst_index)) = (find_node(nodes, src), find_node(nodes, dst)) else {
            log::debug!("Rejecting {} -> {}: unknown endpoint", src, dst);
            return SendOutcome::Rejected;
        };
        if !nodes[src_index].is_alive() || !nodes[dst_index].is_alive() {
            log::debug!("Rejecting {} -> {}: endpoint out of energy", src, dst);
            return SendOutcome::Rejected;
        }

        if self.check_collision(rng) {
            self.collisions += 1;
            let used = self.energy_model.energy_for(PowerState::Tx, COLLISION_TX_SECS);
            nodes[src_index].consume_energy(used);
            log::debug!("Collision on {} -> {} (total {})", src, dst, self.collisions);
            return SendOutcome::Collided {
                delay: COLLISION_DELAY_SECS,
            };
        }

        if !self.in_flight.insert(src) {
            let fault = ProtocolError::AlreadyInFlight(src);
            log::error!("Protocol error: {}", fault);
            return SendOutcome::Faulted(fault);
        }
        let result = self.exchange(nodes, src_index, dst_index, payload, rng);
        self.in_flight.remove(&src);

        match result {
            Ok(outcome) => outcome,
            Err(fault) => {
                log::error!("Protocol error: {}", fault);
                SendOutcome::Faulted(fault)
            }
        }
    }

    /// Link evaluation, adaptation, timing and delivery for a registered sender.
    fn exchange<R: Rng + ?Sized>(&mut self, nodes: &mut [Node], src_index: usize, dst_index: usize, payload: &str, rng: &mut R) -> Result<SendOutcome, ProtocolError> {
        let distance = nodes[src_index].distance_to(&nodes[dst_index]);
        let link = self.channel.simulate_link(nodes[src_index].tx_power, distance, rng);
        if !(link.rssi.is_finite() && link.snr.is_finite() && distance.is_finite()) {
            return Err(ProtocolError::NonFiniteLink {
                rssi: link.rssi,
                snr: link.snr,
                distance,
            });
        }

        let sender = &mut nodes[src_index];
        if self.adaptive {
            let motion = sender.motion_detected;
            sender.adapt(link.rssi, link.snr, motion);
        }

        let transmission_time = calculate_air_time(sender.spreading_factor, sender.bandwidth, payload.len());
        let total_delay = transmission_time + propagation_delay(distance);
        let src = sender.node_id;

        if !self.packet_delivered(&link, distance, rng) {
            return Ok(SendOutcome::Lost { delay: total_delay });
        }

        let receiver = &mut nodes[dst_index];
        let accepted = receiver.receive(ReceivedPacket {
            src,
            dst: receiver.node_id,
            payload: payload.to_string(),
            rssi: link.rssi,
            snr: link.snr,
            distance,
            delay: total_delay,
        });
        if accepted {
            Ok(SendOutcome::Delivered { delay: total_delay })
        } else {
            Ok(SendOutcome::Lost { delay: total_delay })
        }
    }

    /// Collision draw: probability `0.1 · |in_flight|`.
    fn check_collision<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        let probability = COLLISION_PROBABILITY_PER_TRANSMISSION * self.in_flight.len() as f64;
        rng.gen_range(0.0..1.0) < probability
    }

    fn packet_delivered<R: Rng + ?Sized>(&self, link: &LinkQuality, distance: f64, rng: &mut R) -> bool {
        rng.gen_range(0.0..1.0) < delivery_probability(link.snr, distance)
    }
}

/// Bernoulli success probability for a link: base rate from SNR times a linear distance penalty.
pub fn delivery_probability(snr: f64, distance: f64) -> f64 {
    let base = if snr > GOOD_SNR_DB {
        GOOD_LINK_DELIVERY_PROBABILITY
    } else {
        POOR_LINK_DELIVERY_PROBABILITY
    };
    let penalty = (1.0 - distance / DELIVERY_RANGE_M).clamp(0.0, 1.0);
    base * penalty
}

fn find_node(nodes: &[Node], id: NodeId) -> Option<usize> {
    nodes.iter().position(|n| n.node_id == id)
}
