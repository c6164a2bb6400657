pub mod phase;
pub mod telemetry;
