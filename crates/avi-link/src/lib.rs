pub mod doctor;
pub mod health;
pub mod radio;
pub mod sim;

use anyhow::{Context, Result};
use avi_fc::error::LinkError;
use avi_fc::hal::LinkGateway;
use avi_proto::telemetry::{TelemetryRecord, UplinkCommand};
use serde::Deserialize;

use crate::radio::SerialRadio;
use crate::sim::SimLink;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// "radio" or "sim"
    pub kind: String,

    pub serial_dev: Option<String>,
    /// E32 modules ship at 9600.
    pub baud: Option<u32>,

    /// Ground counts as connected while a frame arrived within this window.
    pub contact_timeout_ms: Option<u64>,

    /// kind = "sim": when the simulated ground station shows up.
    pub sim_connect_after_ms: Option<u64>,
    pub sim_abort_at_ms: Option<u64>,
}

impl LinkConfig {
    pub fn contact_timeout_ms(&self) -> u64 {
        self.contact_timeout_ms.unwrap_or(3_000)
    }
}

/// The gateway the link task owns.
pub enum Gateway {
    Radio(SerialRadio),
    Sim(SimLink),
}

impl Gateway {
    pub fn open(cfg: &LinkConfig) -> Result<Self> {
        match cfg.kind.as_str() {
            "radio" => {
                let dev = cfg.serial_dev.as_ref().context("link.serial_dev missing")?;
                let baud = cfg.baud.unwrap_or(9600);
                Ok(Gateway::Radio(SerialRadio::open(dev, baud, cfg.contact_timeout_ms())?))
            }
            "sim" => Ok(Gateway::Sim(sim_link(cfg))),
            other => anyhow::bail!("unknown link.kind: {}", other),
        }
    }
}

pub fn sim_link(cfg: &LinkConfig) -> SimLink {
    let link = SimLink::new(cfg.sim_connect_after_ms, cfg.contact_timeout_ms());
    match cfg.sim_abort_at_ms {
        Some(t) => link.with_abort_at(t),
        None => link,
    }
}

impl LinkGateway for Gateway {
    fn poll(&mut self, now_ms: u64) -> Option<UplinkCommand> {
        match self {
            Gateway::Radio(r) => r.poll(now_ms),
            Gateway::Sim(s) => s.poll(now_ms),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Gateway::Radio(r) => r.is_connected(),
            Gateway::Sim(s) => s.is_connected(),
        }
    }

    fn last_contact_ms(&self) -> u64 {
        match self {
            Gateway::Radio(r) => r.last_contact_ms(),
            Gateway::Sim(s) => s.last_contact_ms(),
        }
    }

    fn send(&mut self, record: &TelemetryRecord) -> Result<(), LinkError> {
        match self {
            Gateway::Radio(r) => r.send(record),
            Gateway::Sim(s) => s.send(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(kind: &str) -> LinkConfig {
        LinkConfig {
            kind: kind.into(),
            serial_dev: None,
            baud: None,
            contact_timeout_ms: None,
            sim_connect_after_ms: Some(0),
            sim_abort_at_ms: None,
        }
    }

    #[test]
    fn sim_gateway_connects() {
        let mut g = Gateway::open(&cfg("sim")).unwrap();
        g.poll(10);
        assert!(g.is_connected());
    }

    #[test]
    fn radio_without_device_is_rejected() {
        assert!(Gateway::open(&cfg("radio")).is_err());
        assert!(Gateway::open(&cfg("lora")).is_err());
    }
}
