mod config;
mod run;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use homer_ctl::doctor as ctl_doctor;
use homer_link::autodetect::{autodetect_autopilot, default_candidate_bauds, default_candidate_devs};
use homer_link::{doctor as link_doctor, open_link, Backend, LinkConfig, VehicleLink};
use homer_sense::doctor as sense_doctor;

use crate::config::{load_config, Config};

#[derive(Debug, Parser)]
#[command(name = "homer", version, about = "Radio-beacon homing for autonomous surface vessels")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration without touching hardware.
    Doctor,
    /// Run sensors, control loop, vehicle link and telemetry.
    Run,
    Link { #[command(subcommand)] cmd: LinkCmd },
}

#[derive(Debug, Subcommand)]
enum LinkCmd {
    /// Probe serial ports/bauds for an autopilot HEARTBEAT.
    Probe,
    /// Open the configured link and arm the vehicle.
    Arm,
    /// Open the configured link and disarm the vehicle.
    Disarm,
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
        Command::Run => run::run(&cfg).await?,
        Command::Link { cmd } => link_cmd(&cfg, cmd).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    ctl_doctor::check_control(&cfg.control)?;
    ctl_doctor::check_pid(&cfg.pid)?;
    ctl_doctor::check_thresholds(&cfg.compass.thresholds())?;
    link_doctor::check_link(&cfg.link)?;
    sense_doctor::check_sensors(&cfg.joystick, &cfg.compass, &cfg.vision, &cfg.commands)?;

    if cfg.telemetry.enabled() {
        cfg.telemetry
            .target()
            .parse::<std::net::SocketAddr>()
            .context("telemetry.target is not an ip:port address")?;
    }
    if cfg.link.autodetect() {
        info!("doctor: link autodetect enabled (OK)");
    }
    if cfg.control.near_field_m.is_some() && !cfg.vision.enabled() {
        warn!("doctor: control.near_field_m has no effect while vision is disabled");
    }

    info!("doctor: OK");
    Ok(())
}

async fn link_cmd(cfg: &Config, cmd: LinkCmd) -> Result<()> {
    let link_cfg = cfg.link.clone();
    tokio::task::spawn_blocking(move || link_cmd_blocking(&link_cfg, cmd))
        .await
        .context("link task")?
}

fn link_cmd_blocking(cfg: &LinkConfig, cmd: LinkCmd) -> Result<()> {
    match cmd {
        LinkCmd::Probe => {
            anyhow::ensure!(cfg.backend == Backend::Mavlink, "link probe needs the mavlink backend");
            let devs = cfg.candidate_devs.clone().unwrap_or_else(default_candidate_devs);
            let bauds = cfg.candidate_bauds.clone().unwrap_or_else(default_candidate_bauds);
            let res = autodetect_autopilot(&devs, &bauds, cfg.heartbeat_timeout(), cfg.mav_ids())?;
            if let Some((dev, baud)) = res.chosen {
                println!("CHOSEN: {} @ {}", dev, baud);
            } else {
                println!("CHOSEN: none");
            }
            for p in res.probes {
                println!("probe dev={} baud={} hb={} {}ms note={}", p.dev, p.baud, p.hb_seen, p.elapsed_ms, p.note);
            }
            Ok(())
        }
        LinkCmd::Arm => {
            let mut opened = open_link(cfg)?;
            report(opened.link.arm(), "armed", opened.link.as_ref())
        }
        LinkCmd::Disarm => {
            let mut opened = open_link(cfg)?;
            report(opened.link.force_disarm(), "disarmed", opened.link.as_ref())
        }
    }
}

fn report(res: Result<(), homer_link::LinkError>, done: &str, link: &dyn VehicleLink) -> Result<()> {
    match res {
        Ok(()) => {
            println!("{} ({} heartbeat={})", done, link.backend(), link.heartbeat());
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            Err(e.into())
        }
    }
}
