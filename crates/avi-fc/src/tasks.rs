//! The three periodic loops. None of them ever waits on another: they only
//! meet through the blackboard.

use std::time::Duration;

use avi_proto::phase::FlightPhase;
use avi_proto::telemetry::{TelemetryRecord, UplinkCommand};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::blackboard::{Blackboard, FlightWriters, LinkStatus, Publisher};
use crate::clock::FlightClock;
use crate::error::FlightFault;
use crate::hal::{Altimeter, LinkGateway, RelayDriver, StatusOutput};
use crate::kernel::FlightKernel;
use crate::signal::StatusSignaler;
use crate::TaskParams;

fn ticker(period_ms: u64) -> Interval {
    let mut iv = interval(Duration::from_millis(period_ms.max(1)));
    // a late tick is taken once, not replayed in a burst
    iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
    iv
}

/// Sole driver of the phase machine and the pyro sequencer.
pub async fn sensor_task<A: Altimeter, R: RelayDriver>(
    clock: FlightClock,
    mut altimeter: A,
    mut kernel: FlightKernel<R>,
    writers: FlightWriters,
    board: Blackboard,
    params: TaskParams,
) {
    let mut iv = ticker(params.sensor_period_ms);
    let mut slowed = false;
    loop {
        iv.tick().await;
        let now = clock.now_ms();
        let reading = altimeter.read_altitude();
        let report = kernel.tick(now, reading, board.link.read(), board.abort.is_requested());

        writers.estimate.publish(report.estimate);
        if report.step.transition.is_some() {
            writers.phase.publish(report.step.phase);
        }
        for end in report.pulses_ended.iter().flatten() {
            debug!("sensor: {} pulse ended (continuity={:?})", end.channel, end.continuity);
        }

        if !slowed && report.step.phase == FlightPhase::Landed {
            slowed = true;
            info!("sensor: landed, sampling every {}ms", params.landed_sensor_period_ms);
            iv = ticker(params.landed_sensor_period_ms);
            // first tick of a fresh interval completes immediately
            iv.tick().await;
        }
    }
}

/// Buzzer loop. Runs on its own cadence so the crew hears something even if
/// the sensor loop stalls.
pub async fn status_task<O: StatusOutput>(
    clock: FlightClock,
    mut output: O,
    mut signaler: StatusSignaler,
    board: Blackboard,
    period_ms: u64,
) {
    let mut iv = ticker(period_ms);
    let mut last_level = None;
    let mut output_failed = false;
    loop {
        iv.tick().await;
        let now = clock.now_ms();
        let level = signaler.sample(board.phase.read(), &board.link.read(), now);
        if last_level == Some(level) {
            continue;
        }
        match output.set(level) {
            Ok(()) => {
                last_level = Some(level);
                output_failed = false;
            }
            Err(e) => {
                if !output_failed {
                    warn!("status: output write failed: {}", e);
                }
                output_failed = true;
            }
        }
    }
}

/// Owns the gateway: publishes link status, latches uplink aborts and sends
/// one telemetry record per tick. Send failures are dropped.
pub async fn link_task<G: LinkGateway>(
    clock: FlightClock,
    mut gateway: G,
    link: Publisher<LinkStatus>,
    board: Blackboard,
    period_ms: u64,
) {
    let mut iv = ticker(period_ms);
    let mut was_connected = false;
    loop {
        iv.tick().await;
        let now = clock.now_ms();

        if let Some(cmd) = gateway.poll(now) {
            match cmd {
                UplinkCommand::Abort => {
                    warn!("link: abort requested by ground");
                    board.abort.request();
                }
                UplinkCommand::Ping => debug!("link: ping"),
            }
        }

        let connected = gateway.is_connected();
        if connected != was_connected {
            if connected {
                info!("link: connected");
            } else {
                warn!("link: {}", FlightFault::LinkLost);
            }
            was_connected = connected;
        }
        link.publish(LinkStatus { connected, last_contact_ms: gateway.last_contact_ms() });

        let est = board.estimate.read();
        let record = TelemetryRecord {
            timestamp_ms: now,
            phase: board.phase.read(),
            altitude_m: est.altitude_m,
            velocity_mps: est.velocity_mps,
        };
        if let Err(e) = gateway.send(&record) {
            debug!("link: telemetry dropped: {}", e);
        }
    }
}
