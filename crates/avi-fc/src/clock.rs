use tokio::time::Instant;

/// Milliseconds since boot. Copied freely into every task; nothing resets it.
#[derive(Debug, Clone, Copy)]
pub struct FlightClock {
    boot: Instant,
}

impl FlightClock {
    pub fn start() -> Self {
        Self { boot: Instant::now() }
    }

    pub fn now_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }
}
