use avi_proto::phase::FlightPhase;
use tracing::{info, warn};

use crate::blackboard::LinkStatus;
use crate::estimator::{BaselineStatus, MotionEstimate};
use crate::pyro::PyroChannel;

#[derive(Debug, Clone)]
pub struct FlightParams {
    pub boot_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub launch_velocity_mps: f32,
    pub launch_debounce: u8,
    pub apogee_debounce: u8,
    pub landed_band_m: f32,
    pub landed_window_ms: u64,
    pub main_deploy_altitude_m: f32,
    pub max_degraded_samples: u32,
    /// Abort instead of arming when the baseline failed and the sensor has
    /// never produced a valid reading.
    pub abort_on_dead_sensor: bool,
}

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            boot_timeout_ms: 15_000,
            connect_timeout_ms: 15_000,
            launch_velocity_mps: 2.0,
            launch_debounce: 3,
            apogee_debounce: 3,
            landed_band_m: 2.0,
            landed_window_ms: 5_000,
            main_deploy_altitude_m: 150.0,
            max_degraded_samples: 20,
            abort_on_dead_sensor: true,
        }
    }
}

/// Everything the machine looks at for one sensor tick.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInput {
    pub now_ms: u64,
    pub estimate: MotionEstimate,
    pub degraded_streak: u32,
    pub baseline: BaselineStatus,
    pub valid_sample_seen: bool,
    pub link: LinkStatus,
    pub abort_requested: bool,
}

impl PhaseInput {
    fn fresh(&self) -> bool {
        self.degraded_streak == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyroAction {
    ArmAll,
    Fire(PyroChannel),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Requested,
    ExcessiveDegradedSamples,
    SensorUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: FlightPhase,
    pub to: FlightPhase,
}

/// Result of one step. At most one pyro action per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub phase: FlightPhase,
    pub transition: Option<Transition>,
    pub action: Option<PyroAction>,
    pub abort_reason: Option<AbortReason>,
}

#[derive(Debug, Clone)]
pub struct FlightPhaseMachine {
    params: FlightParams,
    phase: FlightPhase,
    entered_ms: u64,
    launch_count: u8,
    apogee_count: u8,
    main_commanded: bool,
    // (reference altitude, since)
    landing_ref: Option<(f32, u64)>,
    max_altitude_m: f32,
}

impl FlightPhaseMachine {
    pub fn new(params: FlightParams) -> Self {
        Self {
            params,
            phase: FlightPhase::Boot,
            entered_ms: 0,
            launch_count: 0,
            apogee_count: 0,
            main_commanded: false,
            landing_ref: None,
            max_altitude_m: 0.0,
        }
    }

    pub fn params(&self) -> &FlightParams {
        &self.params
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn max_altitude_m(&self) -> f32 {
        self.max_altitude_m
    }

    fn stay(&self) -> Step {
        Step { phase: self.phase, transition: None, action: None, abort_reason: None }
    }

    fn enter(&mut self, to: FlightPhase, now_ms: u64, action: Option<PyroAction>) -> Step {
        let from = self.phase;
        debug_assert!(from.may_advance_to(to));
        self.phase = to;
        self.entered_ms = now_ms;
        self.launch_count = 0;
        self.apogee_count = 0;
        info!("phase: {} -> {} at {}ms", from, to, now_ms);
        Step { phase: to, transition: Some(Transition { from, to }), action, abort_reason: None }
    }

    fn abort(&mut self, now_ms: u64, reason: AbortReason) -> Step {
        warn!("phase: abort ({:?}) from {}", reason, self.phase);
        let mut step = self.enter(FlightPhase::Aborted, now_ms, Some(PyroAction::Fire(PyroChannel::Backup)));
        step.abort_reason = Some(reason);
        step
    }

    pub fn step(&mut self, input: &PhaseInput) -> Step {
        let now = input.now_ms;
        if self.phase == FlightPhase::Aborted {
            return self.stay();
        }
        if input.abort_requested {
            return self.abort(now, AbortReason::Requested);
        }
        if self.phase.is_flight_critical() && input.degraded_streak >= self.params.max_degraded_samples {
            return self.abort(now, AbortReason::ExcessiveDegradedSamples);
        }
        if input.fresh() && input.estimate.altitude_m > self.max_altitude_m {
            self.max_altitude_m = input.estimate.altitude_m;
        }

        let v = input.estimate.velocity_mps;
        match self.phase {
            FlightPhase::Boot => {
                if now >= self.params.boot_timeout_ms {
                    return self.enter(FlightPhase::Connecting, now, None);
                }
            }
            FlightPhase::Connecting => {
                let waited = now.saturating_sub(self.entered_ms);
                if input.link.connected || waited >= self.params.connect_timeout_ms {
                    if self.params.abort_on_dead_sensor
                        && input.baseline == BaselineStatus::Unavailable
                        && !input.valid_sample_seen
                    {
                        return self.abort(now, AbortReason::SensorUnavailable);
                    }
                    if !input.link.connected {
                        info!("phase: no link after {}ms, arming anyway", waited);
                    }
                    return self.enter(FlightPhase::Armed, now, Some(PyroAction::ArmAll));
                }
            }
            FlightPhase::Armed if input.fresh() => {
                if v > self.params.launch_velocity_mps {
                    self.launch_count = self.launch_count.saturating_add(1);
                    if self.launch_count >= self.params.launch_debounce {
                        return self.enter(FlightPhase::Ascent, now, None);
                    }
                } else {
                    self.launch_count = 0;
                }
            }
            FlightPhase::Ascent if input.fresh() => {
                if v <= 0.0 {
                    self.apogee_count = self.apogee_count.saturating_add(1);
                    if self.apogee_count >= self.params.apogee_debounce {
                        return self.enter(FlightPhase::Apogee, now, Some(PyroAction::Fire(PyroChannel::Drogue)));
                    }
                } else {
                    self.apogee_count = 0;
                }
            }
            FlightPhase::Apogee => {
                return self.enter(FlightPhase::Descending, now, None);
            }
            FlightPhase::Descending if input.fresh() => {
                let alt = input.estimate.altitude_m;
                let mut action = None;
                if !self.main_commanded && alt <= self.params.main_deploy_altitude_m {
                    self.main_commanded = true;
                    info!("phase: main deploy altitude reached ({:.1}m)", alt);
                    action = Some(PyroAction::Fire(PyroChannel::Main));
                }
                match self.landing_ref {
                    Some((ref_alt, since)) if (alt - ref_alt).abs() <= self.params.landed_band_m => {
                        if now.saturating_sub(since) >= self.params.landed_window_ms {
                            return self.enter(FlightPhase::Landed, now, action);
                        }
                    }
                    _ => self.landing_ref = Some((alt, now)),
                }
                return Step { action, ..self.stay() };
            }
            _ => {}
        }
        self.stay()
    }
}
