//! Drivers that only log, for bench runs and `avi sim`.

use avi_fc::error::RelayError;
use avi_fc::hal::{RelayDriver, StatusOutput};
use avi_fc::pyro::PyroChannel;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct LogRelay {
    energized: [bool; 3],
    pub fire_count: u32,
}

fn idx(ch: PyroChannel) -> usize {
    match ch {
        PyroChannel::Drogue => 0,
        PyroChannel::Main => 1,
        PyroChannel::Backup => 2,
    }
}

impl LogRelay {
    pub fn energized(&self, ch: PyroChannel) -> bool {
        self.energized[idx(ch)]
    }
}

impl RelayDriver for LogRelay {
    fn assert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
        self.energized[idx(channel)] = true;
        self.fire_count += 1;
        info!("relay[bench]: {} ON", channel);
        Ok(())
    }

    fn deassert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
        self.energized[idx(channel)] = false;
        info!("relay[bench]: {} OFF", channel);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogBuzzer {
    on: bool,
}

impl StatusOutput for LogBuzzer {
    fn set(&mut self, on: bool) -> std::io::Result<()> {
        if on != self.on {
            debug!("buzzer[bench]: {}", if on { "on" } else { "off" });
        }
        self.on = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_relay_tracks_lines() {
        let mut r = LogRelay::default();
        r.assert(PyroChannel::Main).unwrap();
        assert!(r.energized(PyroChannel::Main));
        assert!(!r.energized(PyroChannel::Drogue));
        r.deassert(PyroChannel::Main).unwrap();
        assert!(!r.energized(PyroChannel::Main));
        assert_eq!(r.fire_count, 1);
    }
}
