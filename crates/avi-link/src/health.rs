#[derive(Debug, Clone)]
pub struct LinkHealth {
    pub quality: u8,           // 0-100
    pub consecutive_failures: u32,
    pub frames_sent: u64,
    pub frames_received: u64,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self {
            quality: 100,
            consecutive_failures: 0,
            frames_sent: 0,
            frames_received: 0,
        }
    }
}

impl LinkHealth {
    pub fn on_send_ok(&mut self) {
        self.frames_sent += 1;
        self.consecutive_failures = 0;
        // recover slowly, degrade fast
        self.quality = (self.quality + 10).min(100);
    }

    pub fn on_send_failed(&mut self) {
        self.consecutive_failures += 1;
        self.quality = self.quality.saturating_sub(20);
    }

    pub fn on_receive(&mut self) {
        self.frames_received += 1;
    }
}

/// Ground-contact tracker: connected while a frame arrived within the timeout.
#[derive(Debug, Clone)]
pub struct Contact {
    timeout_ms: u64,
    last_ms: Option<u64>,
    connected: bool,
}

impl Contact {
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms, last_ms: None, connected: false }
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_ms = Some(now_ms);
    }

    /// Re-evaluate liveness at `now_ms`.
    pub fn refresh(&mut self, now_ms: u64) -> bool {
        self.connected = match self.last_ms {
            Some(t) => now_ms.saturating_sub(t) <= self.timeout_ms,
            None => false,
        };
        self.connected
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn last_ms(&self) -> u64 {
        self.last_ms.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_expires() {
        let mut c = Contact::new(3000);
        assert!(!c.refresh(0));
        c.touch(1000);
        assert!(c.refresh(4000));
        assert!(!c.refresh(4001));
        assert_eq!(c.last_ms(), 1000);
    }

    #[test]
    fn quality_degrades_and_recovers() {
        let mut h = LinkHealth::default();
        h.on_send_failed();
        h.on_send_failed();
        assert_eq!(h.quality, 60);
        assert_eq!(h.consecutive_failures, 2);
        h.on_send_ok();
        assert_eq!(h.quality, 70);
        assert_eq!(h.consecutive_failures, 0);
    }
}
