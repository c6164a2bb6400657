use avi_proto::phase::FlightPhase;
use tracing::debug;

use crate::blackboard::LinkStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulsePattern {
    pub on_ms: u64,
    pub off_ms: u64,
}

impl PulsePattern {
    /// Long beep: ground link is up.
    pub const LINK_OK: PulsePattern = PulsePattern { on_ms: 1000, off_ms: 100 };
    pub const BOOTING: PulsePattern = PulsePattern { on_ms: 100, off_ms: 900 };
    pub const CONNECTING: PulsePattern = PulsePattern { on_ms: 500, off_ms: 500 };
    /// Connect window expired without a link. Held for the rest of the flight.
    pub const LINK_FAILED: PulsePattern = PulsePattern { on_ms: 100, off_ms: 100 };

    pub fn period_ms(&self) -> u64 {
        self.on_ms + self.off_ms
    }
}

#[derive(Debug, Clone)]
pub struct SignalTimings {
    pub boot_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for SignalTimings {
    fn default() -> Self {
        Self { boot_timeout_ms: 15_000, connect_timeout_ms: 15_000 }
    }
}

/// First match wins; a live link overrides every time-based pattern.
pub fn select_pattern(link: &LinkStatus, elapsed_ms: u64, t: &SignalTimings) -> PulsePattern {
    if link.connected {
        PulsePattern::LINK_OK
    } else if elapsed_ms < t.boot_timeout_ms {
        PulsePattern::BOOTING
    } else if elapsed_ms < t.boot_timeout_ms + t.connect_timeout_ms {
        PulsePattern::CONNECTING
    } else {
        PulsePattern::LINK_FAILED
    }
}

/// Drives the buzzer line. The only state is where we are inside the current cycle.
#[derive(Debug, Clone)]
pub struct StatusSignaler {
    timings: SignalTimings,
    current: Option<PulsePattern>,
    cycle_start_ms: u64,
}

impl StatusSignaler {
    pub fn new(timings: SignalTimings) -> Self {
        Self { timings, current: None, cycle_start_ms: 0 }
    }

    pub fn pattern(&self) -> Option<PulsePattern> {
        self.current
    }

    /// Output level at `now_ms`. The pattern is re-selected at each cycle boundary
    /// so a beep is never cut short.
    pub fn sample(&mut self, phase: FlightPhase, link: &LinkStatus, now_ms: u64) -> bool {
        let expired = match self.current {
            None => true,
            Some(p) => now_ms.saturating_sub(self.cycle_start_ms) >= p.period_ms(),
        };
        if expired {
            let next = select_pattern(link, now_ms, &self.timings);
            if self.current != Some(next) {
                debug!(
                    "status: pattern {}/{} (phase={}, link={})",
                    next.on_ms, next.off_ms, phase, link.connected
                );
            }
            self.current = Some(next);
            self.cycle_start_ms = now_ms;
        }
        match self.current {
            Some(p) => now_ms - self.cycle_start_ms < p.on_ms,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWN: LinkStatus = LinkStatus { connected: false, last_contact_ms: 0 };
    const UP: LinkStatus = LinkStatus { connected: true, last_contact_ms: 0 };

    #[test]
    fn pattern_table() {
        let t = SignalTimings::default();
        assert_eq!(select_pattern(&DOWN, 0, &t), PulsePattern::BOOTING);
        assert_eq!(select_pattern(&DOWN, 14_999, &t), PulsePattern::BOOTING);
        assert_eq!(select_pattern(&DOWN, 15_000, &t), PulsePattern::CONNECTING);
        assert_eq!(select_pattern(&DOWN, 29_999, &t), PulsePattern::CONNECTING);
        assert_eq!(select_pattern(&DOWN, 30_000, &t), PulsePattern::LINK_FAILED);
        assert_eq!(select_pattern(&DOWN, 3_600_000, &t), PulsePattern::LINK_FAILED);
    }

    #[test]
    fn link_overrides_everything() {
        let t = SignalTimings::default();
        for elapsed in [0, 20_000, 100_000] {
            assert_eq!(select_pattern(&UP, elapsed, &t), PulsePattern::LINK_OK);
        }
    }

    #[test]
    fn duty_cycle_follows_pattern() {
        let mut s = StatusSignaler::new(SignalTimings::default());
        let levels: Vec<bool> = (0..10)
            .map(|i| s.sample(FlightPhase::Boot, &DOWN, i * 100))
            .collect();
        assert_eq!(
            levels,
            vec![true, false, false, false, false, false, false, false, false, false]
        );
        assert!(s.sample(FlightPhase::Boot, &DOWN, 1000));
    }

    #[test]
    fn fast_pulse_sustained_after_connect_window() {
        let mut s = StatusSignaler::new(SignalTimings::default());
        let mut t = 0;
        while t <= 31_000 {
            s.sample(FlightPhase::Armed, &DOWN, t);
            t += 100;
        }
        assert_eq!(s.pattern(), Some(PulsePattern::LINK_FAILED));
        let mut on = 0;
        for _ in 0..100 {
            if s.sample(FlightPhase::Descending, &DOWN, t) {
                on += 1;
            }
            assert_eq!(s.pattern(), Some(PulsePattern::LINK_FAILED));
            t += 100;
        }
        assert_eq!(on, 50);
    }

    #[test]
    fn new_pattern_waits_for_cycle_end() {
        let mut s = StatusSignaler::new(SignalTimings::default());
        assert!(s.sample(FlightPhase::Boot, &DOWN, 0));
        s.sample(FlightPhase::Boot, &UP, 500);
        assert_eq!(s.pattern(), Some(PulsePattern::BOOTING));
        assert!(s.sample(FlightPhase::Boot, &UP, 1000));
        assert_eq!(s.pattern(), Some(PulsePattern::LINK_OK));
    }
}
