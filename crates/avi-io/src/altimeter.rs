use anyhow::{Context, Result};
use rand::Rng;
use serde::Deserialize;

use avi_fc::clock::FlightClock;
use avi_fc::error::SensorError;
use avi_fc::hal::Altimeter;

/// Altitude as a function of time since boot. Used for replay and simulation;
/// the real barometer driver implements `Altimeter` directly.
pub trait AltitudeSource: Send {
    fn altitude_at(&mut self, t_ms: u64) -> Result<f32, SensorError>;
}

impl<S: AltitudeSource + ?Sized> AltitudeSource for Box<S> {
    fn altitude_at(&mut self, t_ms: u64) -> Result<f32, SensorError> {
        (**self).altitude_at(t_ms)
    }
}

/// Recorded (t_ms, altitude_m) pairs, linearly interpolated.
#[derive(Debug, Clone)]
pub struct AltitudeTrace {
    points: Vec<(u64, f32)>,
}

impl AltitudeTrace {
    /// CSV with `t_ms,altitude_m` rows. Blank lines, `#` comments and a
    /// non-numeric header are skipped. An altitude field of `nan` or `-`
    /// records a dropout.
    pub fn parse(text: &str) -> Result<Self> {
        let mut points = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split(',');
            let t = parts.next().unwrap_or("").trim();
            let a = parts.next().unwrap_or("").trim();
            let Ok(t_ms) = t.parse::<u64>() else {
                if n == 0 {
                    continue;
                }
                anyhow::bail!("line {}: bad timestamp {:?}", n + 1, t);
            };
            let alt = if a == "-" { f32::NAN } else {
                a.parse::<f32>().with_context(|| format!("line {}: bad altitude {:?}", n + 1, a))?
            };
            if let Some((prev, _)) = points.last() {
                anyhow::ensure!(t_ms > *prev, "line {}: timestamps must increase", n + 1);
            }
            points.push((t_ms, alt));
        }
        anyhow::ensure!(!points.is_empty(), "altitude trace is empty");
        Ok(Self { points })
    }

    pub fn load(path: &str) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read altitude trace {}", path))?;
        Self::parse(&s)
    }

    pub fn duration_ms(&self) -> u64 {
        self.points.last().map(|p| p.0).unwrap_or(0)
    }
}

impl AltitudeSource for AltitudeTrace {
    fn altitude_at(&mut self, t_ms: u64) -> Result<f32, SensorError> {
        let i = self.points.partition_point(|p| p.0 <= t_ms);
        let alt = match i {
            0 => self.points[0].1,
            i if i == self.points.len() => self.points[i - 1].1,
            i => {
                let (t0, a0) = self.points[i - 1];
                let (t1, a1) = self.points[i];
                if a0.is_nan() || a1.is_nan() {
                    f32::NAN
                } else {
                    a0 + (a1 - a0) * (t_ms - t0) as f32 / (t1 - t0) as f32
                }
            }
        };
        if alt.is_nan() {
            Err(SensorError::NotReady)
        } else {
            Ok(alt)
        }
    }
}

/// Synthetic flight: pad, boost, ballistic coast, drogue descent, main descent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileConfig {
    pub ground_alt_m: Option<f32>,
    pub launch_at_ms: Option<u64>,
    pub boost_accel_mps2: Option<f32>,
    pub burn_ms: Option<u64>,
    pub drogue_rate_mps: Option<f32>,
    pub main_rate_mps: Option<f32>,
    pub main_alt_m: Option<f32>,
    /// Uniform per-sample noise amplitude, meters. Keep it below
    /// `launch_velocity * sensor_period / 2000` or the pad reads as a launch.
    pub noise_m: Option<f32>,
    /// Fraction of reads that fail, 0..1.
    pub dropout: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FlightProfile {
    ground_alt_m: f32,
    launch_at_ms: u64,
    boost_accel: f32,
    burn_s: f32,
    drogue_rate: f32,
    main_rate: f32,
    main_alt_m: f32,
    noise_m: f32,
    dropout: f64,
}

const G: f32 = 9.81;

impl FlightProfile {
    pub fn new(cfg: &ProfileConfig) -> Self {
        Self {
            ground_alt_m: cfg.ground_alt_m.unwrap_or(100.0),
            launch_at_ms: cfg.launch_at_ms.unwrap_or(35_000),
            boost_accel: cfg.boost_accel_mps2.unwrap_or(60.0),
            burn_s: cfg.burn_ms.unwrap_or(2_000) as f32 / 1000.0,
            drogue_rate: cfg.drogue_rate_mps.unwrap_or(25.0),
            main_rate: cfg.main_rate_mps.unwrap_or(6.0),
            main_alt_m: cfg.main_alt_m.unwrap_or(150.0),
            noise_m: cfg.noise_m.unwrap_or(0.0),
            dropout: cfg.dropout.unwrap_or(0.0).clamp(0.0, 1.0),
        }
    }

    fn burnout(&self) -> (f32, f32) {
        let v = self.boost_accel * self.burn_s;
        let h = 0.5 * self.boost_accel * self.burn_s * self.burn_s;
        (h, v)
    }

    /// Apogee height above ground.
    pub fn apogee_agl_m(&self) -> f32 {
        let (h, v) = self.burnout();
        h + v * v / (2.0 * G)
    }

    /// Noise-free altitude above ground at `t_ms`.
    pub fn agl_at(&self, t_ms: u64) -> f32 {
        if t_ms < self.launch_at_ms {
            return 0.0;
        }
        let t = (t_ms - self.launch_at_ms) as f32 / 1000.0;
        if t <= self.burn_s {
            return 0.5 * self.boost_accel * t * t;
        }
        let (h_bo, v_bo) = self.burnout();
        let t_apogee = self.burn_s + v_bo / G;
        if t <= t_apogee {
            let dt = t - self.burn_s;
            return h_bo + v_bo * dt - 0.5 * G * dt * dt;
        }
        let apogee = self.apogee_agl_m();
        let fall = t - t_apogee;
        let t_drogue = ((apogee - self.main_alt_m) / self.drogue_rate).max(0.0);
        let h = if fall <= t_drogue {
            apogee - self.drogue_rate * fall
        } else {
            apogee.min(self.main_alt_m) - self.main_rate * (fall - t_drogue)
        };
        h.max(0.0)
    }
}

impl AltitudeSource for FlightProfile {
    fn altitude_at(&mut self, t_ms: u64) -> Result<f32, SensorError> {
        let mut rng = rand::thread_rng();
        if self.dropout > 0.0 && rng.gen_bool(self.dropout) {
            return Err(SensorError::NotReady);
        }
        let noise = if self.noise_m > 0.0 { rng.gen_range(-self.noise_m..=self.noise_m) } else { 0.0 };
        Ok(self.ground_alt_m + self.agl_at(t_ms) + noise)
    }
}

/// Adapts an `AltitudeSource` to the driver interface by reading the flight clock.
pub struct ClockedAltimeter<S: AltitudeSource> {
    clock: FlightClock,
    source: S,
}

impl<S: AltitudeSource> ClockedAltimeter<S> {
    pub fn new(clock: FlightClock, source: S) -> Self {
        Self { clock, source }
    }
}

impl<S: AltitudeSource> Altimeter for ClockedAltimeter<S> {
    fn read_altitude(&mut self) -> Result<f32, SensorError> {
        self.source.altitude_at(self.clock.now_ms())
    }
}
