use avi_fc::error::LinkError;
use avi_fc::hal::LinkGateway;
use avi_proto::telemetry::{TelemetryRecord, UplinkCommand};
use tracing::debug;

use crate::health::{Contact, LinkHealth};

/// Stand-in for the radio when flying on the bench or in `avi sim`.
#[derive(Debug, Clone)]
pub struct SimLink {
    /// Ground appears at this time; `None` never connects.
    connect_at_ms: Option<u64>,
    /// Ground disappears at this time.
    drop_at_ms: Option<u64>,
    /// Ground sends a single abort at this time.
    abort_at_ms: Option<u64>,
    contact: Contact,
    health: LinkHealth,
    last_sent: Option<TelemetryRecord>,
}

impl SimLink {
    pub fn new(connect_at_ms: Option<u64>, contact_timeout_ms: u64) -> Self {
        Self {
            connect_at_ms,
            drop_at_ms: None,
            abort_at_ms: None,
            contact: Contact::new(contact_timeout_ms),
            health: LinkHealth::default(),
            last_sent: None,
        }
    }

    pub fn with_drop_at(mut self, t_ms: u64) -> Self {
        self.drop_at_ms = Some(t_ms);
        self
    }

    pub fn with_abort_at(mut self, t_ms: u64) -> Self {
        self.abort_at_ms = Some(t_ms);
        self
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    pub fn last_sent(&self) -> Option<&TelemetryRecord> {
        self.last_sent.as_ref()
    }

    fn ground_present(&self, now_ms: u64) -> bool {
        let up = matches!(self.connect_at_ms, Some(t) if now_ms >= t);
        let gone = matches!(self.drop_at_ms, Some(t) if now_ms >= t);
        up && !gone
    }
}

impl LinkGateway for SimLink {
    fn poll(&mut self, now_ms: u64) -> Option<UplinkCommand> {
        let mut cmd = None;
        if self.ground_present(now_ms) {
            self.contact.touch(now_ms);
            self.health.on_receive();
            cmd = Some(UplinkCommand::Ping);
        }
        if let Some(t) = self.abort_at_ms {
            if now_ms >= t {
                self.abort_at_ms = None;
                cmd = Some(UplinkCommand::Abort);
            }
        }
        self.contact.refresh(now_ms);
        cmd
    }

    fn is_connected(&self) -> bool {
        self.contact.connected()
    }

    fn last_contact_ms(&self) -> u64 {
        self.contact.last_ms()
    }

    fn send(&mut self, record: &TelemetryRecord) -> Result<(), LinkError> {
        if !self.contact.connected() {
            self.health.on_send_failed();
            return Err(LinkError::NotOpen);
        }
        debug!("sim link: tx {:?}", record);
        self.last_sent = Some(*record);
        self.health.on_send_ok();
        Ok(())
    }
}
