use thiserror::Error;

use crate::pyro::PyroChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor not ready")]
    NotReady,
    #[error("reading out of plausible range")]
    OutOfRange,
    #[error("sensor bus error")]
    Bus,
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay {0} not wired")]
    NotWired(PyroChannel),
    #[error("relay gpio: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link not open")]
    NotOpen,
    #[error("frame does not fit the tx buffer")]
    FrameTooLarge,
    #[error("encode: {0}")]
    Encode(String),
    #[error("link io: {0}")]
    Io(#[from] std::io::Error),
}

/// Fault taxonomy. Only `ExcessiveDegradedSamples` escalates (to Aborted);
/// everything else is absorbed where it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlightFault {
    #[error("sensor degraded, holding previous estimate")]
    SensorDegraded,
    #[error("baseline unavailable, using relative altitude")]
    BaselineUnavailable,
    #[error("radio link lost")]
    LinkLost,
    #[error("pyro channel already attempted")]
    FireAlreadyAttempted,
    #[error("pyro hardware fault")]
    HardwareFault,
    #[error("too many consecutive degraded samples")]
    ExcessiveDegradedSamples,
}
