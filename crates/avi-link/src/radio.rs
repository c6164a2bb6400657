use std::io::{Cursor, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use avi_fc::error::LinkError;
use avi_fc::hal::LinkGateway;
use avi_proto::telemetry::{TelemetryRecord, UplinkCommand};
use tokio_serial::SerialPort;
use tracing::{debug, info, warn};

use crate::health::{Contact, LinkHealth};

const RX_CAP: usize = 256;
const TX_CAP: usize = 192;

/// Newline-delimited frame splitter over a fixed buffer.
#[derive(Debug)]
pub struct LineFramer {
    buf: [u8; RX_CAP],
    len: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self { buf: [0; RX_CAP], len: 0 }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    pub frames: u32,
    pub command: Option<UplinkCommand>,
}

impl LineFramer {
    /// Append received bytes and consume every complete line. An abort in any
    /// line wins over pings.
    pub fn push(&mut self, bytes: &[u8]) -> Drained {
        let mut out = Drained::default();
        for &b in bytes {
            if b == b'\n' {
                let line = trim_cr(&self.buf[..self.len]);
                if !line.is_empty() {
                    out.frames += 1;
                    match serde_json::from_slice::<UplinkCommand>(line) {
                        Ok(UplinkCommand::Abort) => out.command = Some(UplinkCommand::Abort),
                        Ok(UplinkCommand::Ping) => {
                            if out.command.is_none() {
                                out.command = Some(UplinkCommand::Ping);
                            }
                        }
                        Err(e) => debug!("radio: unparsed frame ({} bytes): {}", line.len(), e),
                    }
                }
                self.len = 0;
            } else if self.len < RX_CAP {
                self.buf[self.len] = b;
                self.len += 1;
            } else {
                warn!("radio: rx line exceeds {} bytes, dropping", RX_CAP);
                self.len = 0;
            }
        }
        out
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Encode one record as a JSON line into `buf`. Returns the frame length.
pub fn encode_frame(record: &TelemetryRecord, buf: &mut [u8]) -> Result<usize, LinkError> {
    let mut cur = Cursor::new(buf);
    serde_json::to_writer(&mut cur, record).map_err(|e| {
        if e.is_io() { LinkError::FrameTooLarge } else { LinkError::Encode(e.to_string()) }
    })?;
    cur.write_all(b"\n").map_err(|_| LinkError::FrameTooLarge)?;
    Ok(cur.position() as usize)
}

/// Transparent-UART radio module (E32 class) on a serial port.
pub struct SerialRadio {
    dev: String,
    port: Box<dyn SerialPort>,
    framer: LineFramer,
    contact: Contact,
    health: LinkHealth,
    tx: [u8; TX_CAP],
}

impl SerialRadio {
    pub fn open(dev: &str, baud: u32, contact_timeout_ms: u64) -> Result<Self> {
        let port = tokio_serial::new(dev, baud)
            .timeout(Duration::from_millis(5))
            .open()
            .with_context(|| format!("open radio serial device {}", dev))?;
        info!("radio: opened {} @ {}", dev, baud);
        Ok(Self {
            dev: dev.to_string(),
            port,
            framer: LineFramer::default(),
            contact: Contact::new(contact_timeout_ms),
            health: LinkHealth::default(),
            tx: [0; TX_CAP],
        })
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    fn read_available(&mut self) -> std::io::Result<Drained> {
        let mut chunk = [0u8; 64];
        let mut total = Drained::default();
        loop {
            let pending = self.port.bytes_to_read()? as usize;
            if pending == 0 {
                return Ok(total);
            }
            let want = pending.min(chunk.len());
            let n = self.port.read(&mut chunk[..want])?;
            if n == 0 {
                return Ok(total);
            }
            let d = self.framer.push(&chunk[..n]);
            total.frames += d.frames;
            if d.command == Some(UplinkCommand::Abort) || total.command.is_none() {
                total.command = d.command.or(total.command);
            }
        }
    }
}

impl LinkGateway for SerialRadio {
    fn poll(&mut self, now_ms: u64) -> Option<UplinkCommand> {
        let drained = match self.read_available() {
            Ok(d) => d,
            Err(e) => {
                warn!("radio: read on {} failed: {}", self.dev, e);
                Drained::default()
            }
        };
        if drained.frames > 0 {
            self.contact.touch(now_ms);
            for _ in 0..drained.frames {
                self.health.on_receive();
            }
        }
        self.contact.refresh(now_ms);
        drained.command
    }

    fn is_connected(&self) -> bool {
        self.contact.connected()
    }

    fn last_contact_ms(&self) -> u64 {
        self.contact.last_ms()
    }

    fn send(&mut self, record: &TelemetryRecord) -> Result<(), LinkError> {
        let n = encode_frame(record, &mut self.tx)?;
        match self.port.write_all(&self.tx[..n]) {
            Ok(()) => {
                self.health.on_send_ok();
                Ok(())
            }
            Err(e) => {
                self.health.on_send_failed();
                warn!(
                    "radio: send failed (failures: {}, quality: {}%): {}",
                    self.health.consecutive_failures, self.health.quality, e
                );
                Err(LinkError::Io(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avi_proto::phase::FlightPhase;

    #[test]
    fn framer_splits_lines_across_pushes() {
        let mut f = LineFramer::default();
        let d = f.push(br#"{"cmd":"pi"#);
        assert_eq!(d.frames, 0);
        let d = f.push(b"ng\"}\r\n");
        assert_eq!(d, Drained { frames: 1, command: Some(UplinkCommand::Ping) });
    }

    #[test]
    fn abort_wins_over_ping() {
        let mut f = LineFramer::default();
        let d = f.push(b"{\"cmd\":\"abort\"}\n{\"cmd\":\"ping\"}\n");
        assert_eq!(d.frames, 2);
        assert_eq!(d.command, Some(UplinkCommand::Abort));
    }

    #[test]
    fn garbage_counts_as_contact_only() {
        let mut f = LineFramer::default();
        let d = f.push(b"hello\n\n");
        assert_eq!(d, Drained { frames: 1, command: None });
    }

    #[test]
    fn overlong_line_is_dropped() {
        let mut f = LineFramer::default();
        let junk = vec![b'x'; RX_CAP + 10];
        f.push(&junk);
        let d = f.push(b"{\"cmd\":\"ping\"}\n");
        // the tail of the junk is glued to the ping, so it does not parse
        assert_eq!(d.frames, 1);
        let d = f.push(b"{\"cmd\":\"ping\"}\n");
        assert_eq!(d.command, Some(UplinkCommand::Ping));
    }

    #[test]
    fn frame_fits_tx_buffer() {
        let r = TelemetryRecord {
            timestamp_ms: u64::MAX,
            phase: FlightPhase::Descending,
            altitude_m: -12345.678,
            velocity_mps: 98765.43,
        };
        let mut buf = [0u8; TX_CAP];
        let n = encode_frame(&r, &mut buf).unwrap();
        assert_eq!(buf[n - 1], b'\n');
        let back: TelemetryRecord = serde_json::from_slice(&buf[..n - 1]).unwrap();
        assert_eq!(back.phase, FlightPhase::Descending);
    }

    #[test]
    fn tiny_buffer_reports_too_large() {
        let r = TelemetryRecord { timestamp_ms: 1, phase: FlightPhase::Boot, altitude_m: 0.0, velocity_mps: 0.0 };
        let mut buf = [0u8; 8];
        assert!(matches!(encode_frame(&r, &mut buf), Err(LinkError::FrameTooLarge)));
    }
}
