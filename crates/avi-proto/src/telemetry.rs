use serde::{Deserialize, Serialize};

use crate::phase::FlightPhase;

/// Downlink frame, one per link tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub timestamp_ms: u64,
    pub phase: FlightPhase,
    pub altitude_m: f32,
    pub velocity_mps: f32,
}

/// Frames the ground station may send up. Anything received counts as contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum UplinkCommand {
    Ping,
    Abort,
}
