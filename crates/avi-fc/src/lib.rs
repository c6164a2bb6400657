pub mod blackboard;
pub mod clock;
pub mod doctor;
pub mod error;
pub mod estimator;
pub mod hal;
pub mod kernel;
pub mod phase;
pub mod pyro;
pub mod signal;
pub mod tasks;

use serde::Deserialize;

use crate::estimator::EstimatorParams;
use crate::phase::FlightParams;
use crate::pyro::PyroParams;
use crate::signal::SignalTimings;

/// `[fc]` section. Every field is optional; missing ones take the flight defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcConfig {
    #[serde(default)]
    pub flight: FlightCfg,
    #[serde(default)]
    pub baseline: BaselineCfg,
    #[serde(default)]
    pub pyro: PyroCfg,
    #[serde(default)]
    pub tasks: TasksCfg,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightCfg {
    pub boot_timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,

    /// Vertical speed that counts as "moving up" for launch detection.
    pub launch_velocity_mps: Option<f32>,
    pub launch_debounce: Option<u8>,
    pub apogee_debounce: Option<u8>,

    pub landed_band_m: Option<f32>,
    pub landed_window_ms: Option<u64>,

    /// AGL altitude at or below which the main chute is fired during descent.
    pub main_deploy_altitude_m: Option<f32>,

    /// Consecutive unusable samples tolerated during ascent/apogee before abort.
    pub max_degraded_samples: Option<u32>,
    pub abort_on_dead_sensor: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaselineCfg {
    pub samples: Option<u32>,
    pub min_valid_altitude_m: Option<f32>,
    pub max_valid_altitude_m: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PyroCfg {
    pub pulse_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasksCfg {
    pub sensor_period_ms: Option<u64>,
    /// Sensor period once landed. The task keeps running for descent telemetry.
    pub landed_sensor_period_ms: Option<u64>,
    pub status_period_ms: Option<u64>,
    pub link_period_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TaskParams {
    pub sensor_period_ms: u64,
    pub landed_sensor_period_ms: u64,
    pub status_period_ms: u64,
    pub link_period_ms: u64,
}

impl Default for TaskParams {
    fn default() -> Self {
        Self {
            sensor_period_ms: 10,
            landed_sensor_period_ms: 1000,
            status_period_ms: 100,
            link_period_ms: 1000,
        }
    }
}

impl FcConfig {
    pub fn flight_params(&self) -> FlightParams {
        let d = FlightParams::default();
        let f = &self.flight;
        FlightParams {
            boot_timeout_ms: f.boot_timeout_ms.unwrap_or(d.boot_timeout_ms),
            connect_timeout_ms: f.connect_timeout_ms.unwrap_or(d.connect_timeout_ms),
            launch_velocity_mps: f.launch_velocity_mps.unwrap_or(d.launch_velocity_mps),
            launch_debounce: f.launch_debounce.unwrap_or(d.launch_debounce).max(1),
            apogee_debounce: f.apogee_debounce.unwrap_or(d.apogee_debounce).max(1),
            landed_band_m: f.landed_band_m.unwrap_or(d.landed_band_m),
            landed_window_ms: f.landed_window_ms.unwrap_or(d.landed_window_ms),
            main_deploy_altitude_m: f.main_deploy_altitude_m.unwrap_or(d.main_deploy_altitude_m),
            max_degraded_samples: f.max_degraded_samples.unwrap_or(d.max_degraded_samples),
            abort_on_dead_sensor: f.abort_on_dead_sensor.unwrap_or(d.abort_on_dead_sensor),
        }
    }

    pub fn estimator_params(&self) -> EstimatorParams {
        let d = EstimatorParams::default();
        EstimatorParams {
            baseline_samples: self.baseline.samples.unwrap_or(d.baseline_samples),
            min_valid_altitude_m: self.baseline.min_valid_altitude_m.unwrap_or(d.min_valid_altitude_m),
            max_valid_altitude_m: self.baseline.max_valid_altitude_m.unwrap_or(d.max_valid_altitude_m),
        }
    }

    pub fn pyro_params(&self) -> PyroParams {
        PyroParams { pulse_ms: self.pyro.pulse_ms.unwrap_or(PyroParams::default().pulse_ms) }
    }

    pub fn task_params(&self) -> TaskParams {
        let d = TaskParams::default();
        let t = &self.tasks;
        TaskParams {
            sensor_period_ms: t.sensor_period_ms.unwrap_or(d.sensor_period_ms),
            landed_sensor_period_ms: t.landed_sensor_period_ms.unwrap_or(d.landed_sensor_period_ms),
            status_period_ms: t.status_period_ms.unwrap_or(d.status_period_ms),
            link_period_ms: t.link_period_ms.unwrap_or(d.link_period_ms),
        }
    }

    /// The buzzer shares the boot/connect windows with the phase machine.
    pub fn signal_timings(&self) -> SignalTimings {
        let f = self.flight_params();
        SignalTimings { boot_timeout_ms: f.boot_timeout_ms, connect_timeout_ms: f.connect_timeout_ms }
    }
}
