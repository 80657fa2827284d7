//! Type definitions for the simulation.
//!
//! Contains the data structures shared across the engine:
//! - Node identifiers and 2D positions
//! - The closed set of propagation environments and their channel constants
//! - LoRa radio parameter enums (bandwidth, coding rate) and power states
//! - Packet records for the outbound queue and the received log

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest spreading factor a node may use.
pub const MIN_SPREADING_FACTOR: u8 = 7;
/// Highest spreading factor a node may use.
pub const MAX_SPREADING_FACTOR: u8 = 12;
/// Lower bound of the transmit power range (dBm).
pub const MIN_TX_POWER_DBM: f64 = 2.0;
/// Upper bound of the transmit power range (dBm).
pub const MAX_TX_POWER_DBM: f64 = 20.0;

/// Unique node identifier, rendered as `Node<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Draw a random four-digit identifier for nodes created outside the orchestrator.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        NodeId(rng.gen_range(1000..=9999))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node{}", self.0)
    }
}

/// Simple 2D point in area units (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Propagation environment of the whole deployment.
///
/// Each variant carries its own log-distance exponent, shadowing spread and
/// wall-loss behaviour, so no caller has to branch on environment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Environment {
    #[default]
    Urban,
    Suburban,
    Rural,
    FreeSpace,
    Indoor,
}

impl Environment {
    pub const ALL: [Environment; 5] = [
        Environment::Urban,
        Environment::Suburban,
        Environment::Rural,
        Environment::FreeSpace,
        Environment::Indoor,
    ];

    /// Parse an environment name, ignoring case and `_`/`-`/space separators.
    ///
    /// Unknown names fall back to [`Environment::Urban`].
    pub fn parse_lenient(name: &str) -> Self {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "urban" => Environment::Urban,
            "suburban" => Environment::Suburban,
            "rural" => Environment::Rural,
            "freespace" => Environment::FreeSpace,
            "indoor" => Environment::Indoor,
            _ => {
                log::warn!("Unknown environment {:?}, falling back to urban", name);
                Environment::Urban
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Environment::Urban => "urban",
            Environment::Suburban => "suburban",
            Environment::Rural => "rural",
            Environment::FreeSpace => "free_space",
            Environment::Indoor => "indoor",
        }
    }

    /// Path loss exponent (n) of the log-distance term.
    pub fn path_loss_exponent(self) -> f64 {
        match self {
            Environment::Urban => 3.0,
            Environment::Suburban => 2.75,
            Environment::Rural => 2.5,
            Environment::FreeSpace => 2.0,
            Environment::Indoor => 3.5,
        }
    }

    /// Standard deviation (dB) of the Gaussian shadowing term.
    pub fn shadowing_sigma(self) -> f64 {
        match self {
            Environment::Urban => 10.0,
            Environment::Suburban => 8.0,
            Environment::Rural => 6.0,
            Environment::FreeSpace => 4.0,
            Environment::Indoor => 12.0,
        }
    }

    /// Whether the multi-wall loss term applies.
    pub fn has_walls(self) -> bool {
        self == Environment::Indoor
    }

    pub fn is_indoor(self) -> bool {
        self == Environment::Indoor
    }

    /// Typical deployment area edge length for this environment.
    pub fn default_area_size(self) -> f64 {
        match self {
            Environment::Indoor => 50.0,
            Environment::Urban => 100.0,
            Environment::Suburban => 200.0,
            Environment::Rural => 500.0,
            Environment::FreeSpace => 1000.0,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Environment {
    fn from(value: String) -> Self {
        Environment::parse_lenient(&value)
    }
}

impl From<Environment> for String {
    fn from(value: Environment) -> Self {
        value.name().to_string()
    }
}

/// LoRa channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Bandwidth {
    #[default]
    Khz125,
    Khz250,
    Khz500,
}

impl Bandwidth {
    pub fn khz(self) -> u32 {
        match self {
            Bandwidth::Khz125 => 125,
            Bandwidth::Khz250 => 250,
            Bandwidth::Khz500 => 500,
        }
    }
}

/// LoRa forward error correction rate, 4/5 (least overhead) to 4/8 (most redundancy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodingRate {
    #[default]
    Cr4_5,
    Cr4_6,
    Cr4_7,
    Cr4_8,
}

impl CodingRate {
    /// Numeric code 1..=4 as used by radio drivers.
    pub fn code(self) -> u8 {
        match self {
            CodingRate::Cr4_5 => 1,
            CodingRate::Cr4_6 => 2,
            CodingRate::Cr4_7 => 3,
            CodingRate::Cr4_8 => 4,
        }
    }
}

impl fmt::Display for CodingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "4/{}", 4 + self.code())
    }
}

/// Radio power state driving current draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    Tx,
    Rx,
    Idle,
    Sleep,
}

/// Coarse classification of remaining energy, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnergyLevel {
    High,
    Medium,
    Low,
}

impl EnergyLevel {
    pub fn from_joules(energy: f64) -> Self {
        if energy > 50.0 {
            EnergyLevel::High
        } else if energy > 20.0 {
            EnergyLevel::Medium
        } else {
            EnergyLevel::Low
        }
    }
}

/// Packet placed on a node's outbound queue by `transmit`.
#[derive(Debug, Clone)]
pub struct OutboundPacket {
    pub src: NodeId,
    pub dst: NodeId,
    pub payload: String,
    pub spreading_factor: u8,
    pub bandwidth: Bandwidth,
    pub coding_rate: CodingRate,
    pub timestamp: DateTime<Utc>,
}

/// Packet handed to a receiver after a successful delivery draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPacket {
    pub src: NodeId,
    pub dst: NodeId,
    pub payload: String,
    /// Received signal strength (dBm) including fading.
    pub rssi: f64,
    /// Signal-to-noise ratio (dB) including fading.
    pub snr: f64,
    /// Euclidean distance between the endpoints at send time.
    pub distance: f64,
    /// Airtime plus propagation delay (seconds).
    pub delay: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing_is_lenient() {
        assert_eq!(Environment::parse_lenient("INDOOR"), Environment::Indoor);
        assert_eq!(Environment::parse_lenient("free_space"), Environment::FreeSpace);
        assert_eq!(Environment::parse_lenient("Free Space"), Environment::FreeSpace);
        assert_eq!(Environment::parse_lenient("free-space"), Environment::FreeSpace);
        assert_eq!(Environment::parse_lenient("Suburban"), Environment::Suburban);
        assert_eq!(Environment::parse_lenient("underwater"), Environment::Urban);
    }

    #[test]
    fn environment_name_roundtrips_through_parser() {
        for env in Environment::ALL {
            assert_eq!(Environment::parse_lenient(env.name()), env);
        }
    }

    #[test]
    fn only_indoor_has_walls() {
        for env in Environment::ALL {
            assert_eq!(env.has_walls(), env == Environment::Indoor);
        }
    }

    #[test]
    fn coding_rate_display() {
        assert_eq!(CodingRate::Cr4_5.to_string(), "4/5");
        assert_eq!(CodingRate::Cr4_8.to_string(), "4/8");
        assert_eq!(CodingRate::Cr4_7.code(), 3);
    }

    #[test]
    fn energy_level_thresholds() {
        assert_eq!(EnergyLevel::from_joules(100.0), EnergyLevel::High);
        assert_eq!(EnergyLevel::from_joules(50.0), EnergyLevel::Medium);
        assert_eq!(EnergyLevel::from_joules(21.0), EnergyLevel::Medium);
        assert_eq!(EnergyLevel::from_joules(20.0), EnergyLevel::Low);
        assert_eq!(EnergyLevel::from_joules(0.0), EnergyLevel::Low);
    }

    #[test]
    fn node_id_display_and_generation() {
        assert_eq!(NodeId(7).to_string(), "Node7");
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let id = NodeId::generate(&mut rng);
        assert!((1000..=9999).contains(&id.0));
    }
}
