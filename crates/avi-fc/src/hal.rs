//! Narrow seams to the hardware and radio. Implementations live in
//! `avi-io` and `avi-link`; the kernel only sees these traits.

use avi_proto::telemetry::{TelemetryRecord, UplinkCommand};

use crate::error::{LinkError, RelayError, SensorError};
use crate::pyro::PyroChannel;

/// Barometric altitude source, meters above sea level.
pub trait Altimeter: Send {
    fn read_altitude(&mut self) -> Result<f32, SensorError>;
}

/// GPIO-level relay primitives. The pyro sequencer is the only caller.
pub trait RelayDriver: Send {
    fn assert(&mut self, channel: PyroChannel) -> Result<(), RelayError>;
    fn deassert(&mut self, channel: PyroChannel) -> Result<(), RelayError>;

    /// Post-pulse current sense. `None` when the board has no sense line.
    fn continuity(&mut self, _channel: PyroChannel) -> Option<bool> {
        None
    }
}

/// Single boolean buzzer/LED line.
pub trait StatusOutput: Send {
    fn set(&mut self, on: bool) -> std::io::Result<()>;
}

/// Radio gateway. `poll` must not block: drain whatever arrived, update
/// liveness and hand back at most one command.
pub trait LinkGateway: Send {
    fn poll(&mut self, now_ms: u64) -> Option<UplinkCommand>;
    fn is_connected(&self) -> bool;
    fn last_contact_ms(&self) -> u64;
    fn send(&mut self, record: &TelemetryRecord) -> Result<(), LinkError>;
}
