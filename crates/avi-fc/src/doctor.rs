use anyhow::Result;

use crate::FcConfig;

pub fn check_flight(cfg: &FcConfig) -> Result<()> {
    let f = cfg.flight_params();
    anyhow::ensure!(f.boot_timeout_ms >= 1_000, "fc.flight.boot_timeout_ms too short");
    anyhow::ensure!(f.launch_velocity_mps > 0.0, "fc.flight.launch_velocity_mps must be > 0");
    anyhow::ensure!(f.launch_debounce <= 50 && f.apogee_debounce <= 50, "fc.flight debounce counts should be 1..50");
    anyhow::ensure!(f.landed_band_m > 0.0, "fc.flight.landed_band_m must be > 0");
    anyhow::ensure!(f.main_deploy_altitude_m >= 30.0, "fc.flight.main_deploy_altitude_m too low");
    anyhow::ensure!(f.max_degraded_samples >= 1, "fc.flight.max_degraded_samples must be >= 1");

    let b = cfg.estimator_params();
    anyhow::ensure!(b.baseline_samples >= 1, "fc.baseline.samples must be >= 1");
    anyhow::ensure!(b.min_valid_altitude_m < b.max_valid_altitude_m, "fc.baseline valid range is empty");

    let p = cfg.pyro_params();
    anyhow::ensure!(p.pulse_ms >= 100 && p.pulse_ms <= 5_000, "fc.pyro.pulse_ms should be 100..5000");

    let t = cfg.task_params();
    anyhow::ensure!(t.sensor_period_ms >= 1 && t.sensor_period_ms <= 50, "fc.tasks.sensor_period_ms should be 1..50");
    anyhow::ensure!(t.status_period_ms <= 100, "fc.tasks.status_period_ms above beep granularity");
    Ok(())
}
