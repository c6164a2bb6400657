//! Latest-value shared state between the sensor, status and link tasks.
//!
//! Every cell has exactly one `Publisher` (not `Clone`), so each field has a
//! single writer by construction. Readers copy the whole value out under the
//! cell's lock; a reader never sees a half-written struct.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use avi_proto::phase::FlightPhase;
use tokio::sync::watch;

use crate::estimator::MotionEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub last_contact_ms: u64,
}

#[derive(Debug)]
pub struct Publisher<T>(watch::Sender<T>);

impl<T> Publisher<T> {
    pub fn publish(&self, value: T) {
        self.0.send_replace(value);
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot<T>(watch::Receiver<T>);

impl<T: Copy> Snapshot<T> {
    pub fn read(&self) -> T {
        *self.0.borrow()
    }
}

fn cell<T>(init: T) -> (Publisher<T>, Snapshot<T>) {
    let (tx, rx) = watch::channel(init);
    (Publisher(tx), Snapshot(rx))
}

/// Latched abort request. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct AbortLatch(Arc<AtomicBool>);

impl AbortLatch {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Write side owned by the sensor task.
#[derive(Debug)]
pub struct FlightWriters {
    pub phase: Publisher<FlightPhase>,
    pub estimate: Publisher<MotionEstimate>,
}

/// Read side, cloned into every task.
#[derive(Debug, Clone)]
pub struct Blackboard {
    pub phase: Snapshot<FlightPhase>,
    pub estimate: Snapshot<MotionEstimate>,
    pub link: Snapshot<LinkStatus>,
    pub abort: AbortLatch,
}

pub fn blackboard() -> (Blackboard, FlightWriters, Publisher<LinkStatus>) {
    let (phase_tx, phase_rx) = cell(FlightPhase::Boot);
    let (est_tx, est_rx) = cell(MotionEstimate::default());
    let (link_tx, link_rx) = cell(LinkStatus::default());
    let board = Blackboard {
        phase: phase_rx,
        estimate: est_rx,
        link: link_rx,
        abort: AbortLatch::default(),
    };
    (board, FlightWriters { phase: phase_tx, estimate: est_tx }, link_tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_latest_value() {
        let (board, writers, link) = blackboard();
        assert_eq!(board.phase.read(), FlightPhase::Boot);
        writers.phase.publish(FlightPhase::Armed);
        link.publish(LinkStatus { connected: true, last_contact_ms: 42 });
        let other = board.clone();
        assert_eq!(other.phase.read(), FlightPhase::Armed);
        assert_eq!(other.link.read().last_contact_ms, 42);
    }

    #[test]
    fn abort_latch_is_shared() {
        let (board, _w, _l) = blackboard();
        let copy = board.abort.clone();
        assert!(!board.abort.is_requested());
        copy.request();
        assert!(board.abort.is_requested());
    }
}
