pub mod altimeter;
pub mod bench;
pub mod doctor;
pub mod gpio;

use anyhow::Result;
use serde::Deserialize;

use avi_fc::error::RelayError;
use avi_fc::hal::{RelayDriver, StatusOutput};
use avi_fc::pyro::PyroChannel;

use crate::altimeter::{AltitudeSource, AltitudeTrace, FlightProfile, ProfileConfig};
use crate::bench::{LogBuzzer, LogRelay};
use crate::gpio::{GpioBuzzer, GpioRelay, SysfsPin};

/// `[io]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct IoConfig {
    /// "profile" (synthetic flight) or "trace" (CSV replay)
    pub sensor: String,
    pub trace_file: Option<String>,
    pub profile: Option<ProfileConfig>,

    /// "gpio" or "bench"
    pub outputs: String,
    pub gpio: Option<GpioConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpioConfig {
    pub drogue_pin: Option<u32>,
    pub main_pin: Option<u32>,
    pub backup_pin: Option<u32>,
    /// Optional current-sense inputs, same channel order.
    pub drogue_sense_pin: Option<u32>,
    pub main_sense_pin: Option<u32>,
    pub backup_sense_pin: Option<u32>,
    pub buzzer_pin: u32,
}

fn out_pin(pin: Option<u32>) -> Result<Option<SysfsPin>> {
    pin.map(SysfsPin::output).transpose()
}

fn in_pin(pin: Option<u32>) -> Result<Option<SysfsPin>> {
    pin.map(SysfsPin::input).transpose()
}

/// Relay driver selected by config.
pub enum Relays {
    Gpio(GpioRelay),
    Bench(LogRelay),
}

impl RelayDriver for Relays {
    fn assert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
        match self {
            Relays::Gpio(r) => r.assert(channel),
            Relays::Bench(r) => r.assert(channel),
        }
    }

    fn deassert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
        match self {
            Relays::Gpio(r) => r.deassert(channel),
            Relays::Bench(r) => r.deassert(channel),
        }
    }

    fn continuity(&mut self, channel: PyroChannel) -> Option<bool> {
        match self {
            Relays::Gpio(r) => r.continuity(channel),
            Relays::Bench(r) => r.continuity(channel),
        }
    }
}

pub enum Buzzer {
    Gpio(GpioBuzzer),
    Bench(LogBuzzer),
}

impl StatusOutput for Buzzer {
    fn set(&mut self, on: bool) -> std::io::Result<()> {
        match self {
            Buzzer::Gpio(b) => b.set(on),
            Buzzer::Bench(b) => b.set(on),
        }
    }
}

/// Bring up relay and buzzer lines. Relays come up deasserted.
pub fn open_outputs(cfg: &IoConfig) -> Result<(Relays, Buzzer)> {
    match cfg.outputs.as_str() {
        "gpio" => {
            let g = cfg.gpio.as_ref().ok_or_else(|| anyhow::anyhow!("io.gpio section missing"))?;
            let relay = GpioRelay::new(
                [out_pin(g.drogue_pin)?, out_pin(g.main_pin)?, out_pin(g.backup_pin)?],
                [in_pin(g.drogue_sense_pin)?, in_pin(g.main_sense_pin)?, in_pin(g.backup_sense_pin)?],
            );
            let buzzer = GpioBuzzer(SysfsPin::output(g.buzzer_pin)?);
            Ok((Relays::Gpio(relay), Buzzer::Gpio(buzzer)))
        }
        "bench" => Ok((Relays::Bench(LogRelay::default()), Buzzer::Bench(LogBuzzer::default()))),
        other => anyhow::bail!("unknown io.outputs: {}", other),
    }
}

/// Altitude source selected by config.
pub fn open_source(cfg: &IoConfig) -> Result<Box<dyn AltitudeSource>> {
    match cfg.sensor.as_str() {
        "profile" => {
            let p = cfg.profile.clone().unwrap_or_default();
            Ok(Box::new(FlightProfile::new(&p)))
        }
        "trace" => {
            let f = cfg.trace_file.as_deref().ok_or_else(|| anyhow::anyhow!("io.trace_file missing"))?;
            Ok(Box::new(AltitudeTrace::load(f)?))
        }
        other => anyhow::bail!("unknown io.sensor: {}", other),
    }
}
