//! LoRaMPP mesh simulator.
//!
//! The `simulation` module holds the engine (channel, energy, nodes, protocol
//! and the `Simulation` orchestrator); `common` holds configuration loading and
//! metrics export. Presentation layers bind to `Simulation` and the
//! `EventSink` stream; the bundled binary is a headless driver.

pub mod common;
pub mod simulation;
