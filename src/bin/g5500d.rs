//! Daemon entry point: CLI, logging, hardware selection, service spawn.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use g5500d::config::{Config, DEF_ROT_PORT, DEF_WEB_PORT};
use g5500d::controller::Controller;
use g5500d::hal::{RotatorHal, SimRotator};
use g5500d::mount::SimMode;
use g5500d::services::{rotctld, web};
use g5500d::state::SharedState;
use g5500d::surface::{self, Rotator};
use g5500d::{cal, RotError};

/// On anything that is not a Pi, default to full simulation so the daemon
/// is usable out of the box for client development.
const DEF_SIM_LEVEL: u8 = if cfg!(target_os = "linux") { 0 } else { 3 };

/// rotctld and web control for a Yaesu G-5500 on a Raspberry Pi.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Listen on this port for rotctld commands.
    #[arg(short = 'r', long, default_value_t = DEF_ROT_PORT)]
    rot_port: u16,

    /// Listen on this port for web commands.
    #[arg(short = 'w', long, default_value_t = DEF_WEB_PORT)]
    web_port: u16,

    /// Simulation level: 0=real 1=az-only 2=az+el90 3=az+el180.
    #[arg(short = 's', long, default_value_t = DEF_SIM_LEVEL)]
    simulator: u8,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mode = SimMode::from_level(args.simulator)
        .with_context(|| format!("simulation level {} must be 0..=3", args.simulator))?;

    let config = Config::default()
        .with_rot_port(args.rot_port)
        .with_web_port(args.web_port)
        .with_simulator(mode);

    let cal_path = config.cal_path.clone().or_else(cal::default_path);
    if cal_path.is_none() {
        warn!("HOME is not set; calibration will not persist");
    }

    let shared = Arc::new(SharedState::new());
    let rotator = Arc::new(Rotator::new(Arc::clone(&shared), cal_path.clone()));
    rotator.set_sim_mode(mode);

    spawn_controller(mode, &shared, cal_path)?;

    let runtime = tokio::runtime::Runtime::new().context("tokio runtime")?;
    runtime.block_on(serve(rotator, config))
}

/// Pick the HAL for the requested mode and start the control thread.
fn spawn_controller(
    mode: SimMode,
    shared: &Arc<SharedState>,
    cal_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    match mode {
        SimMode::Off => {
            #[cfg(target_os = "linux")]
            {
                let mut hal = g5500d::hal::PiRotator::new()
                    .map_err(|e| anyhow::anyhow!("{e} ({})", RotError::GpioFail))?;
                hal.init()
                    .map_err(|e| anyhow::anyhow!("{e} ({})", RotError::GpioFail))?;
                Controller::new(hal, Arc::clone(shared), cal_path)
                    .spawn()
                    .map_err(|_| anyhow::anyhow!("{}", RotError::Internal))?;
                Ok(())
            }
            #[cfg(not(target_os = "linux"))]
            {
                let _ = cal_path;
                anyhow::bail!("real hardware requires Linux; use --simulator 1..3")
            }
        }
        _ => {
            let mut hal = SimRotator::new(mode);
            hal.init().map_err(|e| anyhow::anyhow!("{e}"))?;
            Controller::new(hal, Arc::clone(shared), cal_path)
                .spawn()
                .map_err(|_| anyhow::anyhow!("{}", RotError::Internal))?;
            Ok(())
        }
    }
}

/// Run both dialects until a termination signal arrives, then stop the
/// mount and give the controller one tick to release the relays.
async fn serve(rotator: Arc<Rotator>, config: Config) -> anyhow::Result<()> {
    info!(
        rot = %config.rot_addr,
        web = %config.web_addr,
        simulator = config.simulator.level(),
        "g5500d starting"
    );

    let rot_rotator = Arc::clone(&rotator);
    tokio::spawn(async move {
        if let Err(e) = rotctld::run_server(rot_rotator, config.rot_addr).await {
            error!(%e, "rotctld server failed");
            std::process::exit(1);
        }
    });

    let web_rotator = Arc::clone(&rotator);
    tokio::spawn(async move {
        if let Err(e) = web::run_server(web_rotator, config.web_addr).await {
            error!(%e, "web server failed");
            std::process::exit(1);
        }
    });

    wait_for_signal().await;
    surface::shutdown(&rotator);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("SIGTERM handler");
    let mut hup = signal(SignalKind::hangup()).expect("SIGHUP handler");
    let mut quit = signal(SignalKind::quit()).expect("SIGQUIT handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
        _ = hup.recv() => {}
        _ = quit.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
