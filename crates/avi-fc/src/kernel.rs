use avi_proto::phase::FlightPhase;
use tracing::{error, warn};

use crate::blackboard::LinkStatus;
use crate::error::{FlightFault, SensorError};
use crate::estimator::{AltitudeEstimator, AltitudeSample, BaselineStatus, EstimatorParams, MotionEstimate};
use crate::hal::RelayDriver;
use crate::phase::{FlightParams, FlightPhaseMachine, PhaseInput, PyroAction, Step};
use crate::pyro::{FireResult, PulseEnd, PyroChannel, PyroParams, PyroSequencer};

/// What happened during one sensor tick.
#[derive(Debug, Clone, Copy)]
pub struct TickReport {
    pub estimate: MotionEstimate,
    pub step: Step,
    pub fired: Option<(PyroChannel, FireResult)>,
    pub pulses_ended: [Option<PulseEnd>; 3],
}

/// Estimator, phase machine and pyro sequencer, driven in that order once
/// per sensor tick. Only the sensor task owns one.
pub struct FlightKernel<R: RelayDriver> {
    estimator: AltitudeEstimator,
    machine: FlightPhaseMachine,
    pyro: PyroSequencer<R>,
    valid_sample_seen: bool,
}

impl<R: RelayDriver> FlightKernel<R> {
    pub fn new(relay: R, estimator: EstimatorParams, flight: FlightParams, pyro: PyroParams) -> Self {
        Self {
            estimator: AltitudeEstimator::new(estimator),
            machine: FlightPhaseMachine::new(flight),
            pyro: PyroSequencer::new(relay, pyro),
            valid_sample_seen: false,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.machine.phase()
    }

    pub fn estimator(&self) -> &AltitudeEstimator {
        &self.estimator
    }

    pub fn machine(&self) -> &FlightPhaseMachine {
        &self.machine
    }

    pub fn pyro(&self) -> &PyroSequencer<R> {
        &self.pyro
    }

    pub fn tick(
        &mut self,
        now_ms: u64,
        reading: Result<f32, SensorError>,
        link: LinkStatus,
        abort_requested: bool,
    ) -> TickReport {
        if matches!(reading, Ok(alt) if self.estimator.plausible(alt)) {
            self.valid_sample_seen = true;
        }

        let booting = self.machine.phase() == FlightPhase::Boot;
        if booting && now_ms >= self.machine.params().boot_timeout_ms {
            self.estimator.finish_baseline();
        }

        let estimate = if self.estimator.baseline() == BaselineStatus::Pending {
            if self.estimator.offer_baseline(reading) == BaselineStatus::Unavailable {
                warn!("{}", FlightFault::BaselineUnavailable);
            }
            self.estimator.last()
        } else {
            match reading {
                Ok(altitude_m) => self.estimator.update(AltitudeSample { timestamp_ms: now_ms, altitude_m }),
                Err(e) => self.estimator.hold(now_ms, e),
            }
        };

        let step = self.machine.step(&PhaseInput {
            now_ms,
            estimate,
            degraded_streak: self.estimator.degraded_streak(),
            baseline: self.estimator.baseline(),
            valid_sample_seen: self.valid_sample_seen,
            link,
            abort_requested,
        });

        let fired = match step.action {
            Some(PyroAction::ArmAll) => {
                self.pyro.arm_all();
                None
            }
            Some(PyroAction::Fire(ch)) => {
                let res = self.pyro.fire(ch, now_ms);
                match res {
                    FireResult::Fired => {}
                    FireResult::AlreadyFired => warn!("{}: {}", FlightFault::FireAlreadyAttempted, ch),
                    FireResult::HardwareFault => error!("{}: {}", FlightFault::HardwareFault, ch),
                }
                Some((ch, res))
            }
            None => None,
        };

        let pulses_ended = self.pyro.service(now_ms);

        TickReport { estimate, step, fired, pulses_ended }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyro::tests::RecordingRelay;
    use crate::pyro::ChannelState;

    fn kernel() -> FlightKernel<RecordingRelay> {
        FlightKernel::new(
            RecordingRelay::default(),
            EstimatorParams::default(),
            FlightParams::default(),
            PyroParams::default(),
        )
    }

    const NO_LINK: LinkStatus = LinkStatus { connected: false, last_contact_ms: 0 };

    /// Pad at 100m until 31s, climb to 500m over 4s, then fall at 20 m/s.
    fn altitude_at(t: u64) -> f32 {
        let launch = 31_000;
        if t < launch {
            100.0
        } else if t <= launch + 4_000 {
            100.0 + 400.0 * (t - launch) as f32 / 4_000.0
        } else {
            (500.0 - 20.0 * (t - launch - 4_000) as f32 / 1000.0).max(100.0)
        }
    }

    #[test]
    fn nominal_flight_scenario() {
        let mut k = kernel();
        let mut t = 0;
        let mut transitions = Vec::new();
        let mut fires = Vec::new();
        while t <= 90_000 {
            let r = k.tick(t, Ok(altitude_at(t)), NO_LINK, false);
            if let Some(tr) = r.step.transition {
                transitions.push((tr.to, t));
            }
            if let Some(f) = r.fired {
                fires.push((f, t));
            }
            t += 10;
        }

        assert_eq!(k.estimator().baseline(), BaselineStatus::Captured(100.0));
        let phases: Vec<FlightPhase> = transitions.iter().map(|(p, _)| *p).collect();
        assert_eq!(
            phases,
            vec![
                FlightPhase::Connecting,
                FlightPhase::Armed,
                FlightPhase::Ascent,
                FlightPhase::Apogee,
                FlightPhase::Descending,
                FlightPhase::Landed,
            ]
        );
        let at = |p: FlightPhase| transitions.iter().find(|(q, _)| *q == p).map(|(_, t)| *t);
        assert_eq!(at(FlightPhase::Armed), Some(30_000));
        // first rising sample is at 31010; three consecutive positive estimates
        assert_eq!(at(FlightPhase::Ascent), Some(31_030));
        // peak at 35000, velocity <= 0 from 35010 on; third such estimate
        assert_eq!(at(FlightPhase::Apogee), Some(35_030));

        let drogue: Vec<_> = fires.iter().filter(|((ch, _), _)| *ch == PyroChannel::Drogue).collect();
        assert_eq!(drogue.len(), 1);
        assert_eq!(drogue[0].1, 35_030);
        assert_eq!(drogue[0].0 .1, FireResult::Fired);

        let main: Vec<_> = fires.iter().filter(|((ch, _), _)| *ch == PyroChannel::Main).collect();
        assert_eq!(main.len(), 1);
        assert_eq!(k.pyro().state(PyroChannel::Backup), ChannelState::Armed);
        assert_eq!(k.pyro().relay().asserts, vec![PyroChannel::Drogue, PyroChannel::Main]);
        assert!(k.machine().max_altitude_m() > 399.0);
    }

    #[test]
    fn dead_sensor_boot_still_leaves_boot_on_time() {
        let mut k = kernel();
        let mut t = 0;
        while t < 15_000 {
            k.tick(t, Err(SensorError::NotReady), NO_LINK, false);
            t += 10;
        }
        assert_eq!(k.phase(), FlightPhase::Boot);
        k.tick(15_000, Err(SensorError::NotReady), NO_LINK, false);
        assert_eq!(k.phase(), FlightPhase::Connecting);
        assert_eq!(k.estimator().baseline(), BaselineStatus::Unavailable);
    }

    #[test]
    fn out_of_range_sensor_counts_as_dead() {
        let mut k = kernel();
        let mut t = 0;
        while t <= 31_000 {
            k.tick(t, Ok(50_000.0), NO_LINK, false);
            t += 10;
        }
        assert_eq!(k.estimator().baseline(), BaselineStatus::Unavailable);
        assert_eq!(k.phase(), FlightPhase::Aborted);
        assert_eq!(k.pyro().relay().asserts, vec![PyroChannel::Backup]);
    }

    #[test]
    fn abort_fires_backup_once() {
        let mut k = kernel();
        let r = k.tick(0, Ok(100.0), NO_LINK, true);
        assert_eq!(r.step.phase, FlightPhase::Aborted);
        assert_eq!(r.fired, Some((PyroChannel::Backup, FireResult::Fired)));
        let r = k.tick(10, Ok(100.0), NO_LINK, true);
        assert_eq!(r.fired, None);
        let ended = k.tick(1_000, Ok(100.0), NO_LINK, true).pulses_ended;
        assert_eq!(ended[2].map(|e| e.channel), Some(PyroChannel::Backup));
    }
}
