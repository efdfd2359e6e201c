use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use homer_proto::EffortCommand;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::handshake::VehicleLink;
use crate::state::LinkStatus;

const QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRequest {
    Arm,
    Disarm,
    Command(EffortCommand),
}

pub fn lock_status(status: &Mutex<LinkStatus>) -> MutexGuard<'_, LinkStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

/// Non-blocking front end to the link worker. Every write to the vehicle
/// goes through the one worker thread, so handshakes never interleave with
/// effort commands.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkRequest>,
    status: Arc<Mutex<LinkStatus>>,
}

impl LinkHandle {
    /// Queues an arm handshake. Returns false if one is already pending or
    /// the worker is gone.
    pub fn request_arm(&self) -> bool {
        self.request_handshake(LinkRequest::Arm)
    }

    pub fn request_disarm(&self) -> bool {
        self.request_handshake(LinkRequest::Disarm)
    }

    fn request_handshake(&self, req: LinkRequest) -> bool {
        let mut st = lock_status(&self.status);
        if st.handshake_pending {
            return false;
        }
        match self.tx.try_send(req) {
            Ok(()) => {
                st.handshake_pending = true;
                true
            }
            Err(e) => {
                warn!("link: could not queue {:?}: {}", req, e);
                false
            }
        }
    }

    pub fn send_cmd(&self, cmd: EffortCommand) {
        match self.tx.try_send(LinkRequest::Command(cmd)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("link: queue full, dropping command"),
            Err(TrySendError::Closed(_)) => warn!("link: worker stopped, command dropped"),
        }
    }

    pub fn status(&self) -> LinkStatus {
        lock_status(&self.status).clone()
    }
}

/// Moves the link onto a blocking thread that owns it for its lifetime.
/// The worker exits once every [`LinkHandle`] is dropped.
pub fn spawn_link_worker(
    link: Box<dyn VehicleLink>,
    status: Arc<Mutex<LinkStatus>>,
    poll: Duration,
) -> (LinkHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    {
        let mut st = lock_status(&status);
        st.connected = true;
        st.backend = Some(link.backend());
    }
    let worker_status = Arc::clone(&status);
    let join = tokio::task::spawn_blocking(move || run_worker(link, rx, worker_status, poll));
    (LinkHandle { tx, status }, join)
}

fn run_worker(
    mut link: Box<dyn VehicleLink>,
    mut rx: mpsc::Receiver<LinkRequest>,
    status: Arc<Mutex<LinkStatus>>,
    poll: Duration,
) {
    info!("link worker: started ({})", link.backend());
    loop {
        loop {
            match rx.try_recv() {
                Ok(LinkRequest::Command(cmd)) => {
                    if let Err(e) = link.send_cmd(cmd) {
                        warn!("link: send_cmd failed: {}", e);
                        lock_status(&status).last_error = Some(e.to_string());
                    }
                }
                Ok(req) => {
                    let result = if req == LinkRequest::Arm { link.arm() } else { link.disarm() };
                    let mut st = lock_status(&status);
                    match result {
                        Ok(()) => st.last_error = None,
                        Err(e) => {
                            error!("link: {}", e);
                            st.failed_handshakes += 1;
                            st.last_error = Some(e.to_string());
                        }
                    }
                    st.handshake_pending = false;
                    publish(&mut st, link.as_ref());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("link worker: all handles dropped, exiting");
                    lock_status(&status).connected = false;
                    return;
                }
            }
        }

        if let Err(e) = link.poll(poll) {
            debug!("link: poll failed: {}", e);
            lock_status(&status).last_error = Some(e.to_string());
            std::thread::sleep(poll);
        }
        publish(&mut lock_status(&status), link.as_ref());
    }
}

fn publish(st: &mut LinkStatus, link: &dyn VehicleLink) {
    st.armed = link.armed();
    st.observe_heartbeat(link.heartbeat(), Instant::now());
}
