use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use avi_fc::blackboard::{blackboard, LinkStatus};
use avi_fc::clock::FlightClock;
use avi_fc::hal::LinkGateway;
use avi_fc::kernel::FlightKernel;
use avi_fc::pyro::PyroChannel;
use avi_fc::signal::StatusSignaler;
use avi_fc::tasks::{link_task, sensor_task, status_task};
use avi_fc::{doctor as fc_doctor, FcConfig};
use avi_io::altimeter::{AltitudeSource, AltitudeTrace, ClockedAltimeter};
use avi_io::bench::LogRelay;
use avi_io::{doctor as io_doctor, IoConfig};
use avi_link::{doctor as link_doctor, Gateway, LinkConfig};
use avi_proto::phase::FlightPhase;
use avi_proto::telemetry::{TelemetryRecord, UplinkCommand};

#[derive(Debug, Parser)]
#[command(name = "avi", version, about = "Model-rocket flight computer")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config and hardware presence.
    Doctor,
    /// Fly: sensor, status and link tasks until interrupted.
    Run,
    /// Run the kernel over a synthetic or recorded profile on virtual time.
    Sim {
        /// Replay this CSV (t_ms,altitude_m) instead of the configured source.
        #[arg(long)]
        trace: Option<String>,
        #[arg(long)]
        duration_s: Option<u64>,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    fc: FcConfig,
    link: LinkConfig,
    io: IoConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(&cfg).await?,
        Command::Sim { trace, duration_s } => sim(&cfg, trace, duration_s)?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    fc_doctor::check_flight(&cfg.fc)?;
    link_doctor::check_link(&cfg.link)?;
    io_doctor::check_io(&cfg.io)?;
    info!("doctor: OK");
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    let clock = FlightClock::start();
    info!("run: boot");

    let (board, writers, link_pub) = blackboard();
    let (relays, buzzer) = avi_io::open_outputs(&cfg.io).context("outputs")?;
    let source = avi_io::open_source(&cfg.io).context("altitude source")?;
    let gateway = match Gateway::open(&cfg.link) {
        Ok(g) => g,
        Err(e) => {
            // flight does not depend on the radio
            warn!("run: link unavailable ({:#}), flying without ground link", e);
            Gateway::Sim(avi_link::sim::SimLink::new(None, cfg.link.contact_timeout_ms()))
        }
    };

    let kernel = FlightKernel::new(
        relays,
        cfg.fc.estimator_params(),
        cfg.fc.flight_params(),
        cfg.fc.pyro_params(),
    );
    let tasks = cfg.fc.task_params();

    // The sensor loop gets its own thread and runtime so link or buzzer work
    // can never delay a tick.
    let sensor_rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("sensor runtime")?;
    let sensor_board = board.clone();
    let sensor_params = tasks.clone();
    let altimeter = ClockedAltimeter::new(clock, source);
    std::thread::Builder::new()
        .name("sensor".into())
        .spawn(move || {
            sensor_rt.block_on(sensor_task(clock, altimeter, kernel, writers, sensor_board, sensor_params))
        })
        .context("spawn sensor thread")?;

    tokio::spawn(status_task(
        clock,
        buzzer,
        StatusSignaler::new(cfg.fc.signal_timings()),
        board.clone(),
        tasks.status_period_ms,
    ));
    tokio::spawn(link_task(clock, gateway, link_pub, board.clone(), tasks.link_period_ms));

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    let est = board.estimate.read();
    info!(
        "run: stopping at {}ms in {} (alt={:.1}m v={:.1}m/s)",
        clock.now_ms(),
        board.phase.read(),
        est.altitude_m,
        est.velocity_mps
    );
    Ok(())
}

fn sim(cfg: &Config, trace: Option<String>, duration_s: Option<u64>) -> Result<()> {
    let mut source: Box<dyn AltitudeSource> = match &trace {
        Some(path) => Box::new(AltitudeTrace::load(path)?),
        None => avi_io::open_source(&cfg.io)?,
    };
    let mut link = avi_link::sim_link(&cfg.link);
    let mut kernel = FlightKernel::new(
        LogRelay::default(),
        cfg.fc.estimator_params(),
        cfg.fc.flight_params(),
        cfg.fc.pyro_params(),
    );
    let mut signaler = StatusSignaler::new(cfg.fc.signal_timings());
    let tasks = cfg.fc.task_params();

    let end_ms = duration_s.unwrap_or(180) * 1000;
    let mut link_status = LinkStatus::default();
    let mut abort = false;
    let mut next_link_ms = 0;
    let mut next_status_ms = 0;
    let mut last_pattern = None;
    let mut telemetry_sent = 0u32;
    let mut t = 0u64;

    while t <= end_ms {
        if t >= next_link_ms {
            if link.poll(t) == Some(UplinkCommand::Abort) {
                println!("{:>8}ms  UPLINK abort", t);
                abort = true;
            }
            link_status = LinkStatus { connected: link.is_connected(), last_contact_ms: link.last_contact_ms() };
        }

        let r = kernel.tick(t, source.altitude_at(t), link_status, abort);
        if let Some(tr) = r.step.transition {
            println!(
                "{:>8}ms  {} -> {}  alt={:.1}m v={:.1}m/s",
                t, tr.from, tr.to, r.estimate.altitude_m, r.estimate.velocity_mps
            );
        }
        if let Some((ch, res)) = r.fired {
            println!("{:>8}ms  FIRE {} -> {:?}", t, ch, res);
        }

        if t >= next_link_ms {
            let rec = TelemetryRecord {
                timestamp_ms: t,
                phase: kernel.phase(),
                altitude_m: r.estimate.altitude_m,
                velocity_mps: r.estimate.velocity_mps,
            };
            if link.send(&rec).is_ok() {
                telemetry_sent += 1;
            }
            next_link_ms += tasks.link_period_ms;
        }
        if t >= next_status_ms {
            signaler.sample(kernel.phase(), &link_status, t);
            if signaler.pattern() != last_pattern {
                if let Some(p) = signaler.pattern() {
                    println!("{:>8}ms  BEEP {}/{}", t, p.on_ms, p.off_ms);
                }
                last_pattern = signaler.pattern();
            }
            next_status_ms += tasks.status_period_ms;
        }

        t += if kernel.phase() == FlightPhase::Landed {
            tasks.landed_sensor_period_ms
        } else {
            tasks.sensor_period_ms
        };
    }

    println!("---");
    println!("final phase: {}", kernel.phase());
    println!("max altitude: {:.1}m AGL", kernel.machine().max_altitude_m());
    println!("baseline: {:?}", kernel.estimator().baseline());
    for ch in PyroChannel::ALL {
        println!("{}: {:?}", ch, kernel.pyro().state(ch));
    }
    println!("relay pulses: {}", kernel.pyro().relay().fire_count);
    println!("telemetry frames: {}", telemetry_sent);
    Ok(())
}
