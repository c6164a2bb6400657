use tracing::{debug, info, warn};

use crate::error::SensorError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeSample {
    pub timestamp_ms: u64,
    pub altitude_m: f32,
}

/// Altitude above ground and vertical speed derived from the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionEstimate {
    pub altitude_m: f32,
    pub velocity_mps: f32,
    pub sample_timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineStatus {
    Pending,
    Captured(f32),
    /// No usable reading during capture; altitudes are raw (baseline 0).
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct EstimatorParams {
    pub baseline_samples: u32,
    pub min_valid_altitude_m: f32,
    pub max_valid_altitude_m: f32,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            baseline_samples: 10,
            min_valid_altitude_m: -500.0,
            max_valid_altitude_m: 9000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AltitudeEstimator {
    params: EstimatorParams,
    baseline: BaselineStatus,
    baseline_sum: f64,
    baseline_valid: u32,
    baseline_attempts: u32,

    // last accepted sample: (timestamp, altitude AGL)
    prev: Option<(u64, f32)>,
    last: MotionEstimate,
    degraded_streak: u32,
}

impl AltitudeEstimator {
    pub fn new(params: EstimatorParams) -> Self {
        Self {
            params,
            baseline: BaselineStatus::Pending,
            baseline_sum: 0.0,
            baseline_valid: 0,
            baseline_attempts: 0,
            prev: None,
            last: MotionEstimate::default(),
            degraded_streak: 0,
        }
    }

    pub fn baseline(&self) -> BaselineStatus {
        self.baseline
    }

    pub fn last(&self) -> MotionEstimate {
        self.last
    }

    /// Consecutive samples that could not be used; 0 means the last one was fresh.
    pub fn degraded_streak(&self) -> u32 {
        self.degraded_streak
    }

    /// Whether a raw reading falls inside the configured valid range.
    pub fn plausible(&self, altitude_m: f32) -> bool {
        altitude_m.is_finite()
            && altitude_m >= self.params.min_valid_altitude_m
            && altitude_m <= self.params.max_valid_altitude_m
    }

    /// Feed one raw reading into baseline capture. Settles after
    /// `baseline_samples` attempts, valid or not.
    pub fn offer_baseline(&mut self, reading: Result<f32, SensorError>) -> BaselineStatus {
        if self.baseline != BaselineStatus::Pending {
            return self.baseline;
        }
        self.baseline_attempts += 1;
        match reading {
            Ok(alt) if self.plausible(alt) => {
                self.baseline_sum += alt as f64;
                self.baseline_valid += 1;
            }
            Ok(alt) => debug!("baseline: rejected implausible reading {:.1}m", alt),
            Err(e) => debug!("baseline: sensor error: {}", e),
        }
        if self.baseline_attempts >= self.params.baseline_samples.max(1) {
            self.finish_baseline();
        }
        self.baseline
    }

    /// Settle the baseline with whatever has been collected so far.
    pub fn finish_baseline(&mut self) -> BaselineStatus {
        if self.baseline != BaselineStatus::Pending {
            return self.baseline;
        }
        self.baseline = if self.baseline_valid > 0 {
            let avg = (self.baseline_sum / self.baseline_valid as f64) as f32;
            info!(
                "baseline: {:.2}m from {}/{} readings",
                avg, self.baseline_valid, self.baseline_attempts
            );
            BaselineStatus::Captured(avg)
        } else {
            warn!(
                "baseline: unavailable after {} attempts, using relative altitude",
                self.baseline_attempts
            );
            BaselineStatus::Unavailable
        };
        self.baseline
    }

    fn baseline_m(&self) -> f32 {
        match self.baseline {
            BaselineStatus::Captured(b) => b,
            _ => 0.0,
        }
    }

    pub fn update(&mut self, sample: AltitudeSample) -> MotionEstimate {
        if !self.plausible(sample.altitude_m) {
            return self.hold(sample.timestamp_ms, SensorError::OutOfRange);
        }
        let altitude_m = sample.altitude_m - self.baseline_m();

        let velocity_mps = match self.prev {
            None => 0.0,
            Some((prev_ts, prev_alt)) => {
                if sample.timestamp_ms <= prev_ts {
                    self.degraded_streak += 1;
                    warn!(
                        "degraded sample: timestamp {} not after {}, holding velocity",
                        sample.timestamp_ms, prev_ts
                    );
                    self.last = MotionEstimate {
                        altitude_m,
                        velocity_mps: self.last.velocity_mps,
                        sample_timestamp_ms: sample.timestamp_ms,
                    };
                    return self.last;
                }
                let dt_ms = (sample.timestamp_ms - prev_ts).max(1) as f32;
                (altitude_m - prev_alt) * 1000.0 / dt_ms
            }
        };

        self.prev = Some((sample.timestamp_ms, altitude_m));
        self.degraded_streak = 0;
        self.last = MotionEstimate {
            altitude_m,
            velocity_mps,
            sample_timestamp_ms: sample.timestamp_ms,
        };
        self.last
    }

    /// No usable reading this tick: repeat the previous estimate.
    pub fn hold(&mut self, timestamp_ms: u64, reason: SensorError) -> MotionEstimate {
        self.degraded_streak += 1;
        warn!(
            "degraded sample at {}ms ({}), streak={}",
            timestamp_ms, reason, self.degraded_streak
        );
        self.last = MotionEstimate {
            sample_timestamp_ms: timestamp_ms,
            ..self.last
        };
        self.last
    }
}
