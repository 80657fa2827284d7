//! Configuration and metrics export shared by the driver and the engine.

pub mod config;
pub mod export;
