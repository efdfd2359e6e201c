use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use homer_ctl::{ArbiterInputs, ControlArbiter, LinkAction, LinkView, TickOutput};
use homer_link::{open_link, spawn_link_worker, LinkHandle, LinkStatus};
use homer_proto::{EffortCommand, OperatorState, VisionSample};
use homer_sense::{spawn_commands, spawn_compass, spawn_joystick, spawn_vision};

use crate::config::Config;
use crate::telemetry::{ControlReport, TelemetryRelay};

/// How long shutdown waits for the vehicle to acknowledge a disarm.
const SHUTDOWN_DISARM_WAIT: Duration = Duration::from_secs(10);

pub fn link_view(st: &LinkStatus) -> LinkView {
    LinkView {
        armed: st.armed,
        handshake_pending: st.handshake_pending,
        failed_handshakes: st.failed_handshakes,
    }
}

/// Hands one tick's decision to the link worker. The effort goes first so a
/// disarm request is queued behind the neutral command.
pub fn apply(link: &LinkHandle, out: &TickOutput) {
    if let Some(cmd) = out.command {
        link.send_cmd(cmd);
    }
    match out.action {
        LinkAction::Arm => {
            link.request_arm();
        }
        LinkAction::Disarm => {
            link.request_disarm();
        }
        LinkAction::None => {}
    }
}

pub async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");

    // Sensors first: a bad bind address should fail before the vehicle is touched.
    let joystick = spawn_joystick(&cfg.joystick).await?;
    let compass = spawn_compass(&cfg.compass).await?;
    let vision = if cfg.vision.enabled() { Some(spawn_vision(&cfg.vision).await?) } else { None };
    let operator = OperatorState {
        gains: cfg.pid.gains(),
        thresholds: cfg.compass.thresholds(),
        ..OperatorState::default()
    };
    let commands = spawn_commands(&cfg.commands, operator).await?;

    let link_cfg = cfg.link.clone();
    let opened = tokio::task::spawn_blocking(move || open_link(&link_cfg))
        .await
        .context("link open task")??;
    let status = Arc::new(Mutex::new(LinkStatus {
        port: Some(opened.port.clone()),
        baud: Some(opened.baud),
        ..LinkStatus::default()
    }));
    let (link, worker) = spawn_link_worker(opened.link, status, cfg.link.poll());

    let (report_tx, report_rx) = watch::channel(ControlReport::default());
    let relay = if cfg.telemetry.enabled() {
        let relay = TelemetryRelay::bind(cfg.telemetry.target()).await?;
        Some(tokio::spawn(relay.run(cfg.telemetry.interval(), report_rx, link.clone())))
    } else {
        None
    };

    let mut arbiter = ControlArbiter::new(&cfg.control, &cfg.pid, Instant::now());
    let mut ticker = tokio::time::interval(cfg.control.tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("run: control loop every {:?}", cfg.control.tick());
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            r = &mut shutdown => {
                r.context("install ctrl-c handler")?;
                info!("run: shutdown requested");
                break;
            }
        }

        let js = joystick.rx.borrow().clone();
        let bearing = *compass.rx.borrow();
        let vis = vision.as_ref().map(|v| *v.rx.borrow()).unwrap_or_else(VisionSample::default);
        let op = *commands.rx.borrow();
        let inputs = ArbiterInputs {
            joystick: &js,
            compass: &bearing,
            vision: &vis,
            operator: &op,
            link: link_view(&link.status()),
        };

        let out = arbiter.tick(&inputs, Instant::now());
        apply(&link, &out);
        report_tx.send_replace(ControlReport {
            mode: out.mode,
            effort: arbiter.effort(),
            gains: arbiter.controller().gains(),
            raw_bearing: bearing.raw,
        });
    }

    if let Some(r) = relay {
        r.abort();
    }
    disarm_on_exit(&link).await;
    drop(link);
    if tokio::time::timeout(Duration::from_secs(2), worker).await.is_err() {
        warn!("run: link worker did not stop in time");
    }
    info!("run: stopped");
    Ok(())
}

async fn disarm_on_exit(link: &LinkHandle) {
    if !link.status().armed {
        return;
    }
    info!("run: disarming before exit");
    link.send_cmd(EffortCommand::NEUTRAL);

    let deadline = Instant::now() + SHUTDOWN_DISARM_WAIT;
    while Instant::now() < deadline {
        let st = link.status();
        if !st.armed {
            info!("run: vehicle disarmed");
            return;
        }
        if !st.handshake_pending {
            link.request_disarm();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    warn!("run: vehicle still armed at exit");
}
