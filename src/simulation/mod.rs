//! LoRaMPP mesh simulation core.
//!
//! This module provides the complete simulation engine for a mesh of
//! low-power LoRa nodes running the adaptive LoRaMPP scheme. It integrates:
//! - Channel propagation (path loss, shadowing, fading, SNR)
//! - Per-node energy accounting with power-state transitions
//! - The adaptive radio parameter policy
//! - Collision and delivery modeling per message
//! - Run orchestration, metrics and the event stream
//!
//! ## Module Organization
//!
//! - `types`: Shared data structures (ids, points, environments, packets)
//! - `signal_calculations`: Channel model and LoRa timing
//! - `energy`: Power-state energy model
//! - `geometry`: Distances and area clamping
//! - `node`: Per-node state, mobility and adaptation
//! - `protocol`: Single-message dispatch
//! - `events`: Event enum and sinks
//! - `network`: The `Simulation` orchestrator and metrics

pub mod energy;
pub mod events;
pub mod geometry;
pub mod network;
pub mod node;
pub mod protocol;
pub mod signal_calculations;
pub mod types;

// Re-export the orchestrator for convenience
pub use network::{MetricsSnapshot, Simulation, StopHandle};

// Re-export commonly used types
pub use events::{EventSink, SimulationEvent};
pub use types::{Environment, NodeId};
