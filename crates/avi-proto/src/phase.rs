use serde::{Deserialize, Serialize};

/// Flight phase as seen by every task and by the ground.
///
/// Phases advance in declaration order; `Aborted` is the only escape and is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlightPhase {
    Boot,
    Connecting,
    Armed,
    Ascent,
    Apogee,
    Descending,
    Landed,
    Aborted,
}

impl FlightPhase {
    /// Position in the nominal sequence (Boot=0 .. Landed=6). `None` for Aborted.
    pub fn index(self) -> Option<u8> {
        match self {
            FlightPhase::Boot => Some(0),
            FlightPhase::Connecting => Some(1),
            FlightPhase::Armed => Some(2),
            FlightPhase::Ascent => Some(3),
            FlightPhase::Apogee => Some(4),
            FlightPhase::Descending => Some(5),
            FlightPhase::Landed => Some(6),
            FlightPhase::Aborted => None,
        }
    }

    /// True if moving from `self` to `next` respects the forward-only rule.
    pub fn may_advance_to(self, next: FlightPhase) -> bool {
        match (self.index(), next.index()) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => b >= a,
        }
    }

    pub fn is_flight_critical(self) -> bool {
        matches!(self, FlightPhase::Ascent | FlightPhase::Apogee)
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlightPhase::Boot => "BOOT",
            FlightPhase::Connecting => "CONNECTING",
            FlightPhase::Armed => "ARMED",
            FlightPhase::Ascent => "ASCENT",
            FlightPhase::Apogee => "APOGEE",
            FlightPhase::Descending => "DESCENDING",
            FlightPhase::Landed => "LANDED",
            FlightPhase::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborted_reachable_from_everywhere() {
        for p in [
            FlightPhase::Boot,
            FlightPhase::Connecting,
            FlightPhase::Armed,
            FlightPhase::Ascent,
            FlightPhase::Apogee,
            FlightPhase::Descending,
            FlightPhase::Landed,
        ] {
            assert!(p.may_advance_to(FlightPhase::Aborted));
        }
    }

    #[test]
    fn no_regression() {
        assert!(!FlightPhase::Ascent.may_advance_to(FlightPhase::Armed));
        assert!(!FlightPhase::Aborted.may_advance_to(FlightPhase::Boot));
        assert!(FlightPhase::Apogee.may_advance_to(FlightPhase::Descending));
    }
}
