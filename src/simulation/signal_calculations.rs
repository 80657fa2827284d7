//! Radio signal and timing calculations.
//!
//! Contains helpers for:
//! - Free-space plus log-distance path loss with Gaussian shadowing
//! - Indoor multi-wall attenuation
//! - RSSI and thermal-noise SNR, with a shared multipath fading sample per link
//! - LoRa symbol time, airtime and propagation delay
//!
//! Units:
//! - Power: dBm
//! - Time: seconds unless a name says otherwise
//! - Distance: meters

use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::types::{Bandwidth, Environment};

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 3e8;
/// Default EU868 carrier frequency (Hz).
pub const DEFAULT_FREQUENCY_HZ: f64 = 868e6;
/// Default channel bandwidth used for the noise floor (Hz).
pub const DEFAULT_BANDWIDTH_HZ: f64 = 125e3;
/// Thermal noise density at room temperature (dBm/Hz).
const THERMAL_NOISE_DENSITY_DBM_HZ: f64 = -174.0;
/// Attenuation of one interior wall (dB).
const WALL_LOSS_DB: f64 = 8.0;
/// One wall is assumed per this many meters of indoor path.
const METERS_PER_WALL: f64 = 5.0;
/// Half-width of the uniform multipath fading window (dB).
const FADING_SPAN_DB: f64 = 3.0;
/// Number of preamble plus sync symbols added to every frame.
const PREAMBLE_SYMBOLS: f64 = 8.25;
/// Minimum number of payload symbols in a frame.
const MIN_PAYLOAD_SYMBOLS: f64 = 8.0;
/// Signal propagation speed as a fraction of light speed.
const PROPAGATION_VELOCITY_FACTOR: f64 = 0.7;

/// Result of a single simulated link evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkQuality {
    /// Received signal strength (dBm), fading included.
    pub rssi: f64,
    /// Signal-to-noise ratio (dB), fading included.
    pub snr: f64,
    /// Sampled path loss (dB), without fading.
    pub path_loss: f64,
}

/// Stateless propagation model for one deployment.
///
/// Every sampling call draws fresh randomness from the caller's generator;
/// the model itself never changes after construction.
#[derive(Debug, Clone)]
pub struct Channel {
    frequency_hz: f64,
    bandwidth_hz: f64,
    environment: Environment,
}

impl Channel {
    /// Create a channel at the default 868 MHz / 125 kHz operating point.
    pub fn new(environment: Environment) -> Self {
        Self::with_parameters(DEFAULT_FREQUENCY_HZ, DEFAULT_BANDWIDTH_HZ, environment)
    }

    pub fn with_parameters(frequency_hz: f64, bandwidth_hz: f64, environment: Environment) -> Self {
        Self {
            frequency_hz,
            bandwidth_hz,
            environment,
        }
    }

    /// Carrier wavelength (m).
    fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT / self.frequency_hz
    }

    /// Deterministic part of the path loss (dB), i.e. the expectation over shadowing.
    ///
    /// # Formula
    ///
    /// ```text
    /// PL(d) = 20·log10(4πd/λ) + 10·n·log10(d) + L_walls
    /// L_walls = 8 dB · max(1, floor(d / 5))   (indoor only)
    /// ```
    ///
    /// A distance of exactly zero returns zero.
    pub fn mean_path_loss(&self, distance: f64) -> f64 {
        if distance == 0.0 {
            return 0.0;
        }
        let fspl = 20.0 * (4.0 * std::f64::consts::PI * distance / self.wavelength()).log10();
        let log_distance = 10.0 * self.environment.path_loss_exponent() * distance.log10();
        let walls = if self.environment.has_walls() {
            let wall_count = (distance / METERS_PER_WALL).floor().max(1.0);
            WALL_LOSS_DB * wall_count
        } else {
            0.0
        };
        fspl + log_distance + walls
    }

    /// Sample the path loss (dB) at `distance`, adding zero-mean Gaussian shadowing.
    ///
    /// Each call samples a new shadowing value, so repeated calls with the same
    /// distance yield different results. Distance zero returns zero without sampling.
    pub fn path_loss<R: Rng + ?Sized>(&self, distance: f64, rng: &mut R) -> f64 {
        if distance == 0.0 {
            return 0.0;
        }
        self.mean_path_loss(distance) + sample_shadowing(self.environment.shadowing_sigma(), rng)
    }

    /// RSSI(dBm) = P_tx(dBm) - PL(dB)
    pub fn rssi(&self, tx_power_dbm: f64, path_loss_db: f64) -> f64 {
        tx_power_dbm - path_loss_db
    }

    /// Thermal noise floor (dBm) for the channel bandwidth.
    pub fn noise_floor(&self) -> f64 {
        THERMAL_NOISE_DENSITY_DBM_HZ + 10.0 * self.bandwidth_hz.log10()
    }

    pub fn snr(&self, rssi_dbm: f64) -> f64 {
        rssi_dbm - self.noise_floor()
    }

    /// Evaluate one link instance: sampled path loss, RSSI and SNR.
    ///
    /// A single uniform fading sample in [-3, 3] dB is applied to both RSSI and
    /// SNR, modelling one multipath event for the whole link.
    pub fn simulate_link<R: Rng + ?Sized>(&self, tx_power_dbm: f64, distance: f64, rng: &mut R) -> LinkQuality {
        let path_loss = self.path_loss(distance, rng);
        let rssi = self.rssi(tx_power_dbm, path_loss);
        let snr = self.snr(rssi);
        let fading = rng.gen_range(-FADING_SPAN_DB..=FADING_SPAN_DB);
        LinkQuality {
            rssi: rssi + fading,
            snr: snr + fading,
            path_loss,
        }
    }
}

fn sample_shadowing<R: Rng + ?Sized>(sigma: f64, rng: &mut R) -> f64 {
    match Normal::new(0.0, sigma) {
        Ok(normal) => normal.sample(rng),
        Err(_) => 0.0,
    }
}

/// LoRa symbol duration in milliseconds: `2^SF / BW(kHz)`.
pub fn symbol_time_ms(spreading_factor: u8, bandwidth: Bandwidth) -> f64 {
    2.0_f64.powi(spreading_factor as i32) / bandwidth.khz() as f64
}

/// Number of payload symbols: `max(8, ceil(bits / (4·SF)))`.
pub fn payload_symbols(payload_len_bytes: usize, spreading_factor: u8) -> f64 {
    let bits = (payload_len_bytes * 8) as f64;
    (bits / (4.0 * spreading_factor as f64)).ceil().max(MIN_PAYLOAD_SYMBOLS)
}

/// Frame airtime in seconds: `(payload_symbols + 8.25) · T_sym`.
pub fn calculate_air_time(spreading_factor: u8, bandwidth: Bandwidth, payload_len_bytes: usize) -> f64 {
    let symbols = payload_symbols(payload_len_bytes, spreading_factor) + PREAMBLE_SYMBOLS;
    symbols * symbol_time_ms(spreading_factor, bandwidth) / 1000.0
}

/// Propagation delay in seconds at 70% of light speed.
pub fn propagation_delay(distance: f64) -> f64 {
    distance / (SPEED_OF_LIGHT * PROPAGATION_VELOCITY_FACTOR)
}
