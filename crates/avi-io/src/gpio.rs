use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use avi_fc::error::RelayError;
use avi_fc::hal::{RelayDriver, StatusOutput};
use avi_fc::pyro::PyroChannel;
use tracing::info;

const SYSFS_GPIO: &str = "/sys/class/gpio";

/// One output line through the legacy sysfs GPIO interface.
#[derive(Debug, Clone)]
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `pin` if needed and configure it as a low output.
    pub fn output(pin: u32) -> Result<Self> {
        Self::output_under(Path::new(SYSFS_GPIO), pin)
    }

    pub fn output_under(root: &Path, pin: u32) -> Result<Self> {
        let dir = root.join(format!("gpio{}", pin));
        if !dir.exists() {
            std::fs::write(root.join("export"), pin.to_string())
                .with_context(|| format!("export gpio {}", pin))?;
        }
        // "low" sets direction and drives 0 in one write, so the line never glitches high
        std::fs::write(dir.join("direction"), "low")
            .with_context(|| format!("set gpio {} direction", pin))?;
        info!("gpio: pin {} ready as output", pin);
        Ok(Self { pin, value_path: dir.join("value") })
    }

    /// Input line, e.g. a continuity sense.
    pub fn input(pin: u32) -> Result<Self> {
        Self::input_under(Path::new(SYSFS_GPIO), pin)
    }

    pub fn input_under(root: &Path, pin: u32) -> Result<Self> {
        let dir = root.join(format!("gpio{}", pin));
        if !dir.exists() {
            std::fs::write(root.join("export"), pin.to_string())
                .with_context(|| format!("export gpio {}", pin))?;
        }
        std::fs::write(dir.join("direction"), "in")
            .with_context(|| format!("set gpio {} direction", pin))?;
        Ok(Self { pin, value_path: dir.join("value") })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn write(&self, high: bool) -> std::io::Result<()> {
        std::fs::write(&self.value_path, if high { "1" } else { "0" })
    }

    pub fn read(&self) -> std::io::Result<bool> {
        let s = std::fs::read_to_string(&self.value_path)?;
        Ok(s.trim() == "1")
    }
}

/// Relay board: one output per channel, optional sense input per channel.
#[derive(Debug)]
pub struct GpioRelay {
    outputs: [Option<SysfsPin>; 3],
    sense: [Option<SysfsPin>; 3],
}

fn idx(ch: PyroChannel) -> usize {
    match ch {
        PyroChannel::Drogue => 0,
        PyroChannel::Main => 1,
        PyroChannel::Backup => 2,
    }
}

impl GpioRelay {
    pub fn new(outputs: [Option<SysfsPin>; 3], sense: [Option<SysfsPin>; 3]) -> Self {
        Self { outputs, sense }
    }

    fn line(&self, ch: PyroChannel) -> Result<&SysfsPin, RelayError> {
        self.outputs[idx(ch)].as_ref().ok_or(RelayError::NotWired(ch))
    }
}

impl RelayDriver for GpioRelay {
    fn assert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
        Ok(self.line(channel)?.write(true)?)
    }

    fn deassert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
        Ok(self.line(channel)?.write(false)?)
    }

    fn continuity(&mut self, channel: PyroChannel) -> Option<bool> {
        self.sense[idx(channel)].as_ref().and_then(|p| p.read().ok())
    }
}

/// Buzzer (or LED) on a single line.
#[derive(Debug)]
pub struct GpioBuzzer(pub SysfsPin);

impl StatusOutput for GpioBuzzer {
    fn set(&mut self, on: bool) -> std::io::Result<()> {
        self.0.write(on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("avi-gpio-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        for pin in [17, 27, 22] {
            std::fs::create_dir_all(root.join(format!("gpio{}", pin))).unwrap();
        }
        root
    }

    #[test]
    fn relay_drives_value_files() {
        let root = fake_sysfs("relay");
        let drogue = SysfsPin::output_under(&root, 17).unwrap();
        let mut relay = GpioRelay::new([Some(drogue), None, None], [None, None, None]);

        relay.assert(PyroChannel::Drogue).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio17/value")).unwrap(), "1");
        relay.deassert(PyroChannel::Drogue).unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio17/value")).unwrap(), "0");
        assert_eq!(std::fs::read_to_string(root.join("gpio17/direction")).unwrap(), "low");

        assert!(matches!(relay.assert(PyroChannel::Main), Err(RelayError::NotWired(PyroChannel::Main))));
        assert_eq!(relay.continuity(PyroChannel::Drogue), None);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn sense_line_reports_continuity() {
        let root = fake_sysfs("sense");
        let out = SysfsPin::output_under(&root, 17).unwrap();
        let sense = SysfsPin::input_under(&root, 27).unwrap();
        std::fs::write(root.join("gpio27/value"), "0\n").unwrap();
        let mut relay = GpioRelay::new([Some(out), None, None], [Some(sense), None, None]);
        assert_eq!(relay.continuity(PyroChannel::Drogue), Some(false));
        std::fs::write(root.join("gpio27/value"), "1\n").unwrap();
        assert_eq!(relay.continuity(PyroChannel::Drogue), Some(true));
        let _ = std::fs::remove_dir_all(&root);
    }
}
