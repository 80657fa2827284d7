//! Radio energy accounting.
//!
//! A four-state power model (TX, RX, IDLE, SLEEP). Each state has a nominal
//! current draw; TX and RX add a fixed startup surcharge, and leaving SLEEP
//! adds a wakeup surcharge. The model remembers only its current state, which
//! decides whether the wakeup surcharge applies to the next call.

use super::types::PowerState;

/// Nominal supply voltage (V).
pub const DEFAULT_VOLTAGE: f64 = 3.3;
/// Wakeup surcharge when leaving SLEEP.
const SLEEP_WAKEUP: f64 = 0.005;

/// Per-state electrical characteristics.
#[derive(Debug, Clone, Copy)]
struct StateProfile {
    /// Current draw in milliamps.
    current_ma: f64,
    /// Startup surcharge applied on every entry, if any.
    startup: Option<f64>,
}

fn profile(state: PowerState) -> StateProfile {
    match state {
        PowerState::Tx => StateProfile {
            current_ma: 120.0,
            startup: Some(0.002),
        },
        PowerState::Rx => StateProfile {
            current_ma: 10.0,
            startup: Some(0.001),
        },
        PowerState::Idle => StateProfile {
            current_ma: 1.0,
            startup: None,
        },
        PowerState::Sleep => StateProfile {
            current_ma: 0.01,
            startup: None,
        },
    }
}

#[derive(Debug, Clone)]
pub struct EnergyModel {
    voltage: f64,
    current_state: PowerState,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self::new(DEFAULT_VOLTAGE)
    }
}

impl EnergyModel {
    /// Create a model starting in SLEEP.
    pub fn new(voltage: f64) -> Self {
        Self {
            voltage,
            current_state: PowerState::Sleep,
        }
    }

    pub fn current_state(&self) -> PowerState {
        self.current_state
    }

    /// Energy in Joules for spending `duration_secs` in `new_state`, entering it now.
    ///
    /// Surcharges are expressed as `value · V · 1000` mJ and the running draw as
    /// `mA · V · s` mJ; the sum is returned in Joules. Negative or non-finite
    /// durations count as zero. Always moves the model into `new_state`.
    pub fn energy_for(&mut self, new_state: PowerState, duration_secs: f64) -> f64 {
        let duration = if duration_secs.is_finite() { duration_secs.max(0.0) } else { 0.0 };
        let target = profile(new_state);
        let mut millijoules = 0.0;

        if self.current_state == PowerState::Sleep && new_state != PowerState::Sleep {
            millijoules += SLEEP_WAKEUP * self.voltage * 1000.0;
        }
        if let Some(startup) = target.startup {
            millijoules += startup * self.voltage * 1000.0;
        }
        millijoules += target.current_ma * self.voltage * duration;

        self.current_state = new_state;
        millijoules / 1000.0
    }
}
