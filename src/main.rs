use anyhow::{Context, anyhow};
use env_logger::Builder;
use log::{LevelFilter, info};
use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::Duration;

use lorampp_simulator::common::config::{RunMode, SimulationConfig};
use lorampp_simulator::common::export::{export_csv, export_json};
use lorampp_simulator::simulation::events::{ChannelEventSink, EventChannel, LoggingEventSink};
use lorampp_simulator::simulation::{EventSink, Simulation, SimulationEvent, StopHandle};

/// How long the main thread waits between polls of an empty event channel.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn main() {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("lorampp_simulator"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Starting up");

    if let Err(err) = run() {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::load(Path::new(&path)).with_context(|| format!("Failed to load configuration: {}", path))?,
        None => {
            info!("No configuration file given, using defaults");
            SimulationConfig::default()
        }
    };

    // INTENTIONAL LEAK: the event channel lives for the whole process.
    let event_channel: &'static EventChannel = Box::leak(Box::new(EventChannel::new()));
    let sink = ChannelEventSink::new(event_channel.sender());
    let mut simulation = Simulation::new(&config, Box::new(sink)).context("Invalid simulation configuration")?;

    let mobility_timing = config.run.mobility_timing().context("Invalid mobility timing")?;
    if mobility_timing.is_some() {
        spawn_stop_listener(simulation.stop_handle())?;
    }

    let message_count = match config.run {
        RunMode::Messages { count } => count,
        RunMode::Mobility { .. } => 0,
    };
    let simulation_handle = thread::Builder::new()
        .name("simulation".to_string())
        .spawn(move || match mobility_timing {
            Some((duration, interval)) => simulation.run_with_mobility(duration, interval),
            None => simulation.run(message_count),
        })
        .context("Failed to spawn simulation thread")?;

    // Drain events on this thread until the run reports completion.
    let receiver = event_channel.receiver();
    let mut logging = LoggingEventSink::new(false);
    loop {
        match receiver.try_receive() {
            Ok(SimulationEvent::Finished(_)) => break,
            Ok(event) => logging.emit(event),
            Err(_) if simulation_handle.is_finished() => break,
            Err(_) => thread::sleep(EVENT_POLL_INTERVAL),
        }
    }

    let metrics = simulation_handle.join().map_err(|_| anyhow!("Simulation thread panicked"))?;

    if let Some(path) = &config.export.csv_path {
        export_csv(&metrics, path)?;
    }
    if let Some(path) = &config.export.json_path {
        export_json(&metrics, path)?;
    }

    info!(
        "Done: {} sent, {} received, PDR {}%, {} collisions",
        metrics.packets_sent, metrics.packets_received, metrics.pdr_percent, metrics.collisions
    );
    Ok(())
}

/// Stop a mobility run when a line reading `stop` or `q` arrives on stdin.
fn spawn_stop_listener(stop_handle: StopHandle) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("stop-listener".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines().map_while(Result::ok) {
                if matches!(line.trim(), "stop" | "q") {
                    info!("Stop requested");
                    stop_handle.stop();
                    break;
                }
            }
        })
        .context("Failed to spawn stop listener")?;
    Ok(())
}
