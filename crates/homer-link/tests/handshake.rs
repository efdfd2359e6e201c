use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use homer_link::{
    spawn_link_worker, HandshakePolicy, Inbound, Link, LinkError, LinkStatus, Severity, Transport,
    VehicleLink,
};
use homer_proto::EffortCommand;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Request(bool),
    Effort(EffortCommand),
    Clear,
}

/// Replays a fixed script of inbound messages and records every write.
#[derive(Clone, Default)]
struct Scripted {
    replies: Arc<Mutex<VecDeque<Inbound>>>,
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl Scripted {
    fn new(replies: Vec<Inbound>) -> Self {
        Self { replies: Arc::new(Mutex::new(replies.into())), ..Default::default() }
    }

    fn push(&self, msg: Inbound) {
        self.replies.lock().unwrap().push_back(msg);
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn requests(&self) -> Vec<bool> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Request(b) => Some(b),
                _ => None,
            })
            .collect()
    }
}

impl Transport for Scripted {
    fn send_arm_request(&mut self, arm: bool) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(Sent::Request(arm));
        Ok(())
    }

    fn send_effort(&mut self, cmd: EffortCommand) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(Sent::Effort(cmd));
        Ok(())
    }

    fn recv(&mut self, timeout: Duration) -> Result<Option<Inbound>, LinkError> {
        let next = self.replies.lock().unwrap().pop_front();
        if next.is_none() {
            std::thread::sleep(timeout.min(Duration::from_millis(2)));
        }
        Ok(next)
    }

    fn clear_input(&mut self) -> Result<(), LinkError> {
        self.sent.lock().unwrap().push(Sent::Clear);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn policy(max_attempts: Option<u32>) -> HandshakePolicy {
    HandshakePolicy { max_attempts, ack_timeout: Duration::from_millis(50) }
}

fn ack(armed: bool) -> Inbound {
    Inbound::Ack { armed }
}

#[test]
fn arm_adopts_acknowledged_state() {
    let t = Scripted::new(vec![ack(true)]);
    let mut link = Link::new(t.clone(), policy(Some(3)));

    link.arm().unwrap();
    assert!(link.armed());
    assert_eq!(link.heartbeat(), 1);
    assert_eq!(t.sent(), vec![Sent::Clear, Sent::Request(true)]);
}

#[test]
fn negative_ack_keeps_disarmed_and_retries() {
    let t = Scripted::new(vec![ack(false), ack(true)]);
    let mut link = Link::new(t.clone(), policy(Some(5)));

    link.arm().unwrap();
    assert!(link.armed());
    assert_eq!(t.requests(), vec![true, true]);
}

#[test]
fn unanswered_requests_fail_after_budget() {
    let t = Scripted::new(vec![]);
    let mut link = Link::new(t.clone(), policy(Some(3)));

    match link.arm() {
        Err(LinkError::NotAcknowledged { requested, attempts }) => {
            assert!(requested);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected NotAcknowledged, got {:?}", other),
    }
    assert!(!link.armed());
    assert_eq!(t.requests(), vec![true, true, true]);
    assert_eq!(t.sent().iter().filter(|s| **s == Sent::Clear).count(), 3);
}

#[test]
fn unbounded_policy_keeps_trying_until_acknowledged() {
    let t = Scripted::new(vec![ack(false), ack(false), ack(false), ack(false), ack(false), ack(false), ack(true)]);
    let mut link = Link::new(t.clone(), policy(None));

    link.arm().unwrap();
    assert_eq!(t.requests().len(), 7);
}

#[test]
fn status_and_logs_before_ack_are_absorbed() {
    let t = Scripted::new(vec![
        Inbound::Status { armed: Some(false) },
        Inbound::Log { severity: Severity::Info, sender: "nucleo".into(), text: "boot".into() },
        ack(true),
    ]);
    let mut link = Link::new(t.clone(), policy(Some(1)));

    link.arm().unwrap();
    assert!(link.armed());
    // status + ack; log lines are not liveness
    assert_eq!(link.heartbeat(), 2);
}

#[test]
fn status_can_lower_but_never_raise_armed() {
    let t = Scripted::new(vec![Inbound::Status { armed: Some(true) }, ack(true)]);
    let mut link = Link::new(t.clone(), policy(Some(1)));

    assert!(link.poll(Duration::from_millis(5)).unwrap());
    assert!(!link.armed());
    assert_eq!(link.heartbeat(), 1);

    link.arm().unwrap();
    t.push(Inbound::Status { armed: Some(false) });
    link.poll(Duration::from_millis(5)).unwrap();
    assert!(!link.armed());
}

#[test]
fn stray_positive_ack_outside_handshake_is_ignored() {
    let t = Scripted::new(vec![ack(true)]);
    let mut link = Link::new(t, policy(Some(1)));

    link.poll(Duration::from_millis(5)).unwrap();
    assert!(!link.armed());
    assert_eq!(link.heartbeat(), 1);
}

#[test]
fn disarm_is_symmetric() {
    let t = Scripted::new(vec![ack(true), ack(true), ack(false)]);
    let mut link = Link::new(t.clone(), policy(Some(5)));

    link.arm().unwrap();
    link.disarm().unwrap();
    assert!(!link.armed());
    assert_eq!(t.requests(), vec![true, false, false]);
}

#[test]
fn handshake_is_a_no_op_when_state_already_matches() {
    let t = Scripted::new(vec![]);
    let mut link = Link::new(t.clone(), policy(Some(1)));

    link.disarm().unwrap();
    assert!(t.sent().is_empty());
}

#[test]
fn force_disarm_requires_an_acknowledgement() {
    let t = Scripted::new(vec![Inbound::Status { armed: None }, ack(false)]);
    let mut link = Link::new(t.clone(), policy(Some(3)));

    link.force_disarm().unwrap();
    assert_eq!(t.requests(), vec![false]);

    let t = Scripted::new(vec![]);
    let mut link = Link::new(t.clone(), policy(Some(2)));
    assert!(matches!(
        link.force_disarm(),
        Err(LinkError::NotAcknowledged { requested: false, attempts: 2 })
    ));
}

#[test]
fn refused_request_changes_no_state_and_is_retried() {
    let t = Scripted::new(vec![Inbound::Rejected, Inbound::Rejected]);
    let mut link = Link::new(t.clone(), policy(Some(2)));

    assert!(matches!(
        link.force_disarm(),
        Err(LinkError::NotAcknowledged { requested: false, attempts: 2 })
    ));
    assert!(!link.armed());
    assert_eq!(link.heartbeat(), 0);
    assert_eq!(t.requests(), vec![false, false]);

    let t = Scripted::new(vec![Inbound::Rejected, ack(true)]);
    let mut link = Link::new(t.clone(), policy(Some(3)));
    link.arm().unwrap();
    assert!(link.armed());
    assert_eq!(t.requests(), vec![true, true]);
}

#[test]
fn commands_are_fire_and_forget() {
    let t = Scripted::new(vec![]);
    let mut link = Link::new(t.clone(), policy(Some(1)));
    let cmd = EffortCommand::new(-200, 50);

    for _ in 0..3 {
        link.send_cmd(cmd).unwrap();
    }
    assert_eq!(t.sent(), vec![Sent::Effort(cmd); 3]);
    assert_eq!(link.heartbeat(), 0);
}

async fn wait_for(status: &Arc<Mutex<LinkStatus>>, pred: impl Fn(&LinkStatus) -> bool) -> LinkStatus {
    for _ in 0..300 {
        let st = status.lock().unwrap().clone();
        if pred(&st) {
            return st;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("link status never reached the expected state");
}

#[tokio::test]
async fn worker_runs_handshake_and_forwards_commands() {
    let t = Scripted::new(vec![ack(true)]);
    let status = Arc::new(Mutex::new(LinkStatus::default()));
    let link = Box::new(Link::new(t.clone(), policy(Some(3))));
    let (handle, join) = spawn_link_worker(link, Arc::clone(&status), Duration::from_millis(5));

    assert!(handle.request_arm());
    let st = wait_for(&status, |s| s.armed && !s.handshake_pending).await;
    assert_eq!(st.backend, Some("scripted"));
    assert_eq!(st.heartbeat, 1);
    assert!(st.last_heartbeat.is_some());

    let cmd = EffortCommand::new(0, -300);
    handle.send_cmd(cmd);
    handle.send_cmd(cmd);
    for _ in 0..300 {
        if t.sent().iter().filter(|s| **s == Sent::Effort(cmd)).count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(t.sent().iter().filter(|s| **s == Sent::Effort(cmd)).count(), 2);

    drop(handle);
    join.await.unwrap();
    assert!(!status.lock().unwrap().connected);
}

#[tokio::test]
async fn worker_reports_failed_handshake() {
    let t = Scripted::new(vec![]);
    let status = Arc::new(Mutex::new(LinkStatus::default()));
    let link = Box::new(Link::new(t, policy(Some(2))));
    let (handle, _join) = spawn_link_worker(link, Arc::clone(&status), Duration::from_millis(5));

    assert!(handle.request_arm());
    let st = wait_for(&status, |s| s.failed_handshakes == 1 && !s.handshake_pending).await;
    assert!(!st.armed);
    assert!(st.last_error.unwrap().contains("not acknowledged"));

    // a new request is accepted once the failure has been recorded
    assert!(handle.request_disarm());
}
