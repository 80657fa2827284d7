//! Simulation event stream.
//!
//! The orchestrator pushes events to an [`EventSink`] as they happen. For a
//! single send the order is fixed: log line, packet attempt, visualization
//! refresh. Sinks decide how events travel:
//! - [`ChannelEventSink`] forwards into a bounded embassy-sync channel
//! - [`LoggingEventSink`] writes through the `log` facade
//! - `Vec<SimulationEvent>` collects everything in memory
//! - [`NullEventSink`] drops everything

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::Serialize;

use super::network::MetricsSnapshot;
use super::types::{EnergyLevel, NodeId, Point};

/// Depth of the event channel between the simulation thread and its consumer.
pub const EVENT_CHANNEL_SIZE: usize = 100;
/// Bounded channel carrying simulation events.
pub type EventChannel = embassy_sync::channel::Channel<CriticalSectionRawMutex, SimulationEvent, EVENT_CHANNEL_SIZE>;
/// Sender side of the event channel.
pub type EventChannelSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, SimulationEvent, EVENT_CHANNEL_SIZE>;
/// Receiver side of the event channel.
pub type EventChannelReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, SimulationEvent, EVENT_CHANNEL_SIZE>;

/// Render-ready view of one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub node_id: NodeId,
    pub position: Point,
    pub energy: f64,
    pub energy_level: EnergyLevel,
    pub spreading_factor: u8,
    pub bandwidth_khz: u32,
    pub motion_detected: bool,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// Emitted after every send attempt.
    PacketAttempt { src: NodeId, dst: NodeId, delivered: bool },
    /// Free-text progress line.
    Log(String),
    /// Positions or topology may have changed.
    VisualizationRefresh(Vec<NodeView>),
    /// A run completed or was stopped.
    Finished(MetricsSnapshot),
}

/// Destination for simulation events.
pub trait EventSink: Send {
    fn emit(&mut self, event: SimulationEvent);
}

impl EventSink for Vec<SimulationEvent> {
    fn emit(&mut self, event: SimulationEvent) {
        self.push(event);
    }
}

/// Sink that discards every event.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: SimulationEvent) {}
}

/// Sink writing events to the logger.
pub struct LoggingEventSink {
    verbose: bool,
}

impl LoggingEventSink {
    /// With `verbose` set, packet attempts and refreshes are logged at debug level.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&mut self, event: SimulationEvent) {
        match event {
            SimulationEvent::Log(line) => log::info!("{}", line),
            SimulationEvent::PacketAttempt { src, dst, delivered } => {
                if self.verbose {
                    log::debug!("packet {} -> {} delivered={}", src, dst, delivered);
                }
            }
            SimulationEvent::VisualizationRefresh(nodes) => {
                if self.verbose {
                    let alive = nodes.iter().filter(|n| n.alive).count();
                    log::debug!("refresh: {}/{} nodes alive", alive, nodes.len());
                }
            }
            SimulationEvent::Finished(metrics) => log::info!("Run finished: {:?}", metrics),
        }
    }
}

/// Sink forwarding into an embassy-sync channel.
///
/// Blocks the simulation thread while the channel is full, so the consumer
/// sees every event, including the final `Finished`.
pub struct ChannelEventSink {
    sender: EventChannelSender,
}

impl ChannelEventSink {
    pub fn new(sender: EventChannelSender) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&mut self, event: SimulationEvent) {
        embassy_futures::block_on(self.sender.send(event));
    }
}
