use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::hal::RelayDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PyroChannel {
    Drogue,
    Main,
    Backup,
}

impl PyroChannel {
    pub const ALL: [PyroChannel; 3] = [PyroChannel::Drogue, PyroChannel::Main, PyroChannel::Backup];

    fn slot(self) -> usize {
        match self {
            PyroChannel::Drogue => 0,
            PyroChannel::Main => 1,
            PyroChannel::Backup => 2,
        }
    }
}

impl std::fmt::Display for PyroChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PyroChannel::Drogue => "drogue",
            PyroChannel::Main => "main",
            PyroChannel::Backup => "backup",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Safed,
    Armed,
    Fired,
    FireFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireResult {
    Fired,
    AlreadyFired,
    HardwareFault,
}

/// A pulse that ended during `service`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEnd {
    pub channel: PyroChannel,
    /// `Some(false)` means the sense line saw no current: the channel is now FireFailed.
    pub continuity: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PyroParams {
    pub pulse_ms: u64,
}

impl Default for PyroParams {
    fn default() -> Self {
        Self { pulse_ms: 1000 }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: ChannelState,
    pulse_until: Option<u64>,
}

/// Owns relay state. Refuses to energize a channel twice no matter who asks.
pub struct PyroSequencer<R: RelayDriver> {
    relay: R,
    params: PyroParams,
    slots: [Slot; 3],
}

impl<R: RelayDriver> PyroSequencer<R> {
    pub fn new(relay: R, params: PyroParams) -> Self {
        let slot = Slot { state: ChannelState::Safed, pulse_until: None };
        Self { relay, params, slots: [slot; 3] }
    }

    pub fn state(&self, channel: PyroChannel) -> ChannelState {
        self.slots[channel.slot()].state
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn pulse_active(&self, channel: PyroChannel) -> bool {
        self.slots[channel.slot()].pulse_until.is_some()
    }

    pub fn arm_all(&mut self) {
        for ch in PyroChannel::ALL {
            let slot = &mut self.slots[ch.slot()];
            if slot.state == ChannelState::Safed {
                slot.state = ChannelState::Armed;
            }
        }
        info!("pyro: channels armed");
    }

    /// Start the firing pulse. Returns immediately; `service` ends the pulse.
    pub fn fire(&mut self, channel: PyroChannel, now_ms: u64) -> FireResult {
        let slot = &mut self.slots[channel.slot()];
        match slot.state {
            ChannelState::Fired | ChannelState::FireFailed => {
                warn!("pyro: {} already attempted ({:?}), ignoring", channel, slot.state);
                return FireResult::AlreadyFired;
            }
            ChannelState::Safed | ChannelState::Armed => {}
        }

        match self.relay.assert(channel) {
            Ok(()) => {
                slot.state = ChannelState::Fired;
                slot.pulse_until = Some(now_ms + self.params.pulse_ms);
                info!("pyro: {} fired at {}ms ({}ms pulse)", channel, now_ms, self.params.pulse_ms);
                FireResult::Fired
            }
            Err(e) => {
                slot.state = ChannelState::FireFailed;
                error!("pyro: {} relay assert failed: {}", channel, e);
                // make sure the line is not left half-driven
                if let Err(e) = self.relay.deassert(channel) {
                    error!("pyro: {} relay deassert failed: {}", channel, e);
                }
                FireResult::HardwareFault
            }
        }
    }

    /// Deassert every pulse whose deadline has passed.
    pub fn service(&mut self, now_ms: u64) -> [Option<PulseEnd>; 3] {
        let mut ended = [None; 3];
        for ch in PyroChannel::ALL {
            let i = ch.slot();
            let Some(until) = self.slots[i].pulse_until else { continue };
            if now_ms < until {
                continue;
            }
            self.slots[i].pulse_until = None;
            if let Err(e) = self.relay.deassert(ch) {
                error!("pyro: {} relay deassert failed: {}", ch, e);
            }
            let continuity = self.relay.continuity(ch);
            if continuity == Some(false) {
                self.slots[i].state = ChannelState::FireFailed;
                error!("pyro: {} no current drawn during pulse", ch);
            }
            ended[i] = Some(PulseEnd { channel: ch, continuity });
        }
        ended
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::RelayError;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingRelay {
        pub asserts: Vec<PyroChannel>,
        pub deasserts: Vec<PyroChannel>,
        pub fail_assert: Option<PyroChannel>,
        pub fail_deassert: bool,
        pub continuity: Option<bool>,
    }

    impl RelayDriver for RecordingRelay {
        fn assert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
            if self.fail_assert == Some(channel) {
                return Err(RelayError::NotWired(channel));
            }
            self.asserts.push(channel);
            Ok(())
        }

        fn deassert(&mut self, channel: PyroChannel) -> Result<(), RelayError> {
            self.deasserts.push(channel);
            if self.fail_deassert {
                return Err(RelayError::NotWired(channel));
            }
            Ok(())
        }

        fn continuity(&mut self, _channel: PyroChannel) -> Option<bool> {
            self.continuity
        }
    }

    fn seq() -> PyroSequencer<RecordingRelay> {
        PyroSequencer::new(RecordingRelay::default(), PyroParams::default())
    }

    #[test]
    fn fires_exactly_once() {
        let mut p = seq();
        p.arm_all();
        assert_eq!(p.fire(PyroChannel::Drogue, 100), FireResult::Fired);
        for t in [101, 500, 5000] {
            assert_eq!(p.fire(PyroChannel::Drogue, t), FireResult::AlreadyFired);
        }
        assert_eq!(p.relay().asserts, vec![PyroChannel::Drogue]);
        assert_eq!(p.state(PyroChannel::Drogue), ChannelState::Fired);
    }

    #[test]
    fn fire_from_safed_is_allowed() {
        let mut p = seq();
        assert_eq!(p.fire(PyroChannel::Backup, 0), FireResult::Fired);
    }

    #[test]
    fn pulse_ends_after_duration() {
        let mut p = seq();
        p.fire(PyroChannel::Main, 1000);
        assert!(p.service(1999).iter().all(Option::is_none));
        assert!(p.pulse_active(PyroChannel::Main));
        let ended = p.service(2000);
        assert_eq!(ended[1], Some(PulseEnd { channel: PyroChannel::Main, continuity: None }));
        assert!(!p.pulse_active(PyroChannel::Main));
        assert_eq!(p.relay().deasserts, vec![PyroChannel::Main]);
        // no second deassert
        assert!(p.service(3000).iter().all(Option::is_none));
    }

    #[test]
    fn assert_failure_is_terminal_for_that_channel_only() {
        let mut p = seq();
        p.relay.fail_assert = Some(PyroChannel::Drogue);
        p.arm_all();
        assert_eq!(p.fire(PyroChannel::Drogue, 0), FireResult::HardwareFault);
        assert_eq!(p.state(PyroChannel::Drogue), ChannelState::FireFailed);
        assert_eq!(p.fire(PyroChannel::Drogue, 10), FireResult::AlreadyFired);
        assert_eq!(p.fire(PyroChannel::Main, 10), FireResult::Fired);
        assert_eq!(p.state(PyroChannel::Backup), ChannelState::Armed);
    }

    #[test]
    fn deassert_failure_on_fault_path_is_reported_not_fatal() {
        let mut p = seq();
        p.relay.fail_assert = Some(PyroChannel::Main);
        p.relay.fail_deassert = true;
        assert_eq!(p.fire(PyroChannel::Main, 0), FireResult::HardwareFault);
        assert_eq!(p.relay.deasserts, vec![PyroChannel::Main]);
        assert_eq!(p.state(PyroChannel::Main), ChannelState::FireFailed);
        assert!(!p.pulse_active(PyroChannel::Main));
        // no pulse was started, so service has nothing to close
        assert_eq!(p.service(2_000), [None; 3]);
    }

    #[test]
    fn missing_continuity_marks_fire_failed() {
        let mut p = seq();
        p.relay.continuity = Some(false);
        p.fire(PyroChannel::Drogue, 0);
        let ended = p.service(1000);
        assert_eq!(ended[0].map(|e| e.continuity), Some(Some(false)));
        assert_eq!(p.state(PyroChannel::Drogue), ChannelState::FireFailed);
        assert_eq!(p.fire(PyroChannel::Drogue, 1001), FireResult::AlreadyFired);
    }

    #[test]
    fn overlapping_pulses_are_independent() {
        let mut p = seq();
        p.fire(PyroChannel::Drogue, 0);
        p.fire(PyroChannel::Main, 500);
        let ended = p.service(1000);
        assert!(ended[0].is_some());
        assert!(ended[1].is_none());
        assert!(p.pulse_active(PyroChannel::Main));
    }
}
