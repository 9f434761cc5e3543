// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::result_channel;
use hd_adapters::{FakeChannel, FakeFleetController};
use hd_core::{Availability, FakeClock, FleetPolicy, SessionId, Solution};
use std::time::Duration;

const HASH: &str = "cad77c7dffc10fcacc77ff0690f2897a";

struct Harness {
    registry: Arc<Registry<FakeChannel>>,
    clock: FakeClock,
    dispatcher: Dispatcher<FakeChannel, FakeFleetController, FakeClock>,
}

impl Harness {
    fn new(policy: DispatchPolicy) -> Self {
        let registry = Arc::new(Registry::new());
        let clock = FakeClock::new();
        let autoscaler = Autoscaler::new(
            FleetPolicy::default(),
            FakeFleetController::new(),
            registry.clone(),
        );
        let dispatcher = Dispatcher::new(registry.clone(), autoscaler, policy, clock.clone());
        Self {
            registry,
            clock,
            dispatcher,
        }
    }

    fn add_worker(&self, id: &str) -> FakeChannel {
        let channel = FakeChannel::new();
        self.registry
            .add_worker(WorkerId::new(id), channel.clone(), None)
            .unwrap();
        channel
    }

    fn availability(&self, id: &str) -> Option<Availability> {
        self.registry.availability(&WorkerId::new(id))
    }
}

fn submission(raw: &str, session: &str) -> (Submission, mpsc::Receiver<Solution>) {
    let (reply, rx) = result_channel(SessionId::new(session), 8);
    (
        Submission {
            raw: raw.to_string(),
            reply,
        },
        rx,
    )
}

fn fp(s: &str) -> Fingerprint {
    Fingerprint::normalize(s).unwrap()
}

#[test]
fn idle_worker_receives_search_frame() {
    let mut h = Harness::new(DispatchPolicy::default());
    let channel = h.add_worker("w-1");
    let (sub, _rx) = submission(&format!("{HASH}\n"), "client-1");

    let outcome = h.dispatcher.submit(sub);

    assert_eq!(outcome, SubmitOutcome::Queued(fp(HASH)));
    assert_eq!(channel.frames(), vec![format!("search {HASH} 0 ZZZZ")]);
    assert_eq!(h.availability("w-1"), Some(Availability::Busy(fp(HASH))));
    assert_eq!(h.dispatcher.queue_depth(), 0);
    assert!(!h.dispatcher.retry_armed());
}

#[test]
fn task_waits_for_a_worker_then_assigns_on_retry() {
    let mut h = Harness::new(DispatchPolicy::default());
    let (sub, _rx) = submission(HASH, "client-1");

    h.dispatcher.submit(sub);
    assert_eq!(h.dispatcher.queue_depth(), 1);
    assert!(h.dispatcher.retry_armed());

    assert_eq!(h.dispatcher.retry_tick(), 0);
    assert!(h.dispatcher.retry_armed());

    let channel = h.add_worker("w-1");
    assert_eq!(h.dispatcher.retry_tick(), 1);

    assert_eq!(channel.frames().len(), 1);
    assert_eq!(h.dispatcher.queue_depth(), 0);
    assert!(!h.dispatcher.retry_armed());
}

#[test]
fn one_idle_worker_takes_exactly_one_of_two_tasks() {
    let mut h = Harness::new(DispatchPolicy::default());
    let channel = h.add_worker("w-1");
    let (first, _rx1) = submission("aaaa", "client-1");
    let (second, _rx2) = submission("bbbb", "client-2");

    h.dispatcher.submit(first);
    h.dispatcher.submit(second);

    assert_eq!(channel.frames(), vec!["search aaaa 0 ZZZZ"]);
    assert_eq!(h.dispatcher.pending_fingerprints(), vec![fp("bbbb")]);
    assert!(h.dispatcher.retry_armed());
}

#[test]
fn failed_send_reverts_worker_and_keeps_task_at_head() {
    let mut h = Harness::new(DispatchPolicy::default());
    let channel = h.add_worker("w-1");
    channel.set_failing(true);
    let (first, _rx1) = submission("aaaa", "client-1");
    let (second, _rx2) = submission("bbbb", "client-1");

    h.dispatcher.submit(first);
    h.dispatcher.submit(second);

    assert_eq!(h.availability("w-1"), Some(Availability::Idle));
    assert_eq!(
        h.dispatcher.pending_fingerprints(),
        vec![fp("aaaa"), fp("bbbb")]
    );
    assert!(h.dispatcher.retry_armed());

    channel.set_failing(false);
    h.dispatcher.retry_tick();
    assert_eq!(channel.frames(), vec!["search aaaa 0 ZZZZ"]);
}

#[test]
fn worker_gone_after_selection_falls_through_to_next_idle() {
    let mut h = Harness::new(DispatchPolicy::default());
    let channel = h.add_worker("w-live");
    let (reply, _rx) = result_channel(SessionId::new("client-1"), 8);
    h.dispatcher
        .adopt(Task::new(fp("beef"), reply, h.clock.now()));
    let mut picks = vec![WorkerId::new("w-gone")].into_iter();

    let assigned = h
        .dispatcher
        .pump_with(|registry| picks.next().or_else(|| registry.find_idle_worker()));

    assert_eq!(assigned, 1);
    assert_eq!(channel.frames(), vec!["search beef 0 ZZZZ"]);
    assert_eq!(h.availability("w-live"), Some(Availability::Busy(fp("beef"))));
    assert_eq!(h.dispatcher.queue_depth(), 0);
    assert!(!h.dispatcher.retry_armed());
}

#[test]
fn repeated_stale_selection_falls_back_to_retry() {
    let mut h = Harness::new(DispatchPolicy::default());
    let channel = h.add_worker("w-live");
    let (reply, _rx) = result_channel(SessionId::new("client-1"), 8);
    h.dispatcher
        .adopt(Task::new(fp("beef"), reply, h.clock.now()));

    let assigned = h
        .dispatcher
        .pump_with(|_| Some(WorkerId::new("w-gone")));

    assert_eq!(assigned, 0);
    assert!(channel.frames().is_empty());
    assert_eq!(h.dispatcher.pending_fingerprints(), vec![fp("beef")]);
    assert!(h.dispatcher.retry_armed());
}

#[test]
fn pending_tasks_are_served_in_submission_order() {
    let mut h = Harness::new(DispatchPolicy::default());
    let mut receivers = Vec::new();
    for raw in ["aaaa", "bbbb", "cccc"] {
        let (sub, rx) = submission(raw, "client-1");
        receivers.push(rx);
        h.dispatcher.submit(sub);
    }

    let first = h.add_worker("w-1");
    let second = h.add_worker("w-2");
    h.dispatcher.retry_tick();

    assert_eq!(first.frames(), vec!["search aaaa 0 ZZZZ"]);
    assert_eq!(second.frames(), vec!["search bbbb 0 ZZZZ"]);
    assert_eq!(h.dispatcher.pending_fingerprints(), vec![fp("cccc")]);
}

#[test]
fn duplicate_of_pending_task_joins_it() {
    let mut h = Harness::new(DispatchPolicy::default());
    let (first, _rx1) = submission("beef", "client-1");
    let (second, _rx2) = submission(" beef ", "client-2");

    h.dispatcher.submit(first);
    let outcome = h.dispatcher.submit(second);

    assert_eq!(outcome, SubmitOutcome::Coalesced(fp("beef")));
    assert_eq!(h.dispatcher.queue_depth(), 1);
    assert_eq!(h.dispatcher.pending[0].waiters().len(), 2);
}

#[test]
fn duplicate_of_assigned_task_is_not_assigned_twice() {
    let mut h = Harness::new(DispatchPolicy::default());
    let w1 = h.add_worker("w-1");
    let w2 = h.add_worker("w-2");
    let (first, _rx1) = submission("beef", "client-1");
    let (second, _rx2) = submission("beef", "client-2");

    h.dispatcher.submit(first);
    let outcome = h.dispatcher.submit(second);

    assert_eq!(outcome, SubmitOutcome::Coalesced(fp("beef")));
    assert_eq!(w1.frames().len() + w2.frames().len(), 1);
    let holder = h.registry.find_worker_by_fingerprint(&fp("beef")).unwrap();
    let task = h.registry.resolve(&fp("beef"), &holder).task().unwrap();
    assert_eq!(task.waiters().len(), 2);
}

#[test]
fn blank_submission_is_ignored() {
    let mut h = Harness::new(DispatchPolicy::default());
    let (sub, _rx) = submission(" \r\n", "client-1");

    assert_eq!(h.dispatcher.submit(sub), SubmitOutcome::Ignored);
    assert_eq!(h.dispatcher.queue_depth(), 0);
}

#[test]
fn full_queue_drops_new_submissions() {
    let mut h = Harness::new(DispatchPolicy {
        queue_capacity: 1,
        ..DispatchPolicy::default()
    });
    let (first, _rx1) = submission("aaaa", "client-1");
    let (second, _rx2) = submission("bbbb", "client-1");

    h.dispatcher.submit(first);
    let outcome = h.dispatcher.submit(second);

    assert_eq!(outcome, SubmitOutcome::Dropped(fp("bbbb")));
    assert_eq!(h.dispatcher.pending_fingerprints(), vec![fp("aaaa")]);
}

#[test]
fn attempt_budget_abandons_task() {
    let mut h = Harness::new(DispatchPolicy {
        max_attempts: Some(2),
        ..DispatchPolicy::default()
    });
    let (sub, _rx) = submission("beef", "client-1");
    h.dispatcher.submit(sub);

    h.dispatcher.retry_tick();
    assert_eq!(h.dispatcher.pending[0].attempts, 2);

    h.dispatcher.retry_tick();
    assert_eq!(h.dispatcher.queue_depth(), 0);
    assert!(!h.dispatcher.retry_armed());
}

#[test]
fn deadline_abandons_task() {
    let mut h = Harness::new(DispatchPolicy {
        task_deadline: Some(Duration::from_secs(30)),
        ..DispatchPolicy::default()
    });
    let (sub, _rx) = submission("beef", "client-1");
    h.dispatcher.submit(sub);

    h.clock.advance(Duration::from_secs(29));
    h.dispatcher.retry_tick();
    assert_eq!(h.dispatcher.queue_depth(), 1);

    h.clock.advance(Duration::from_secs(1));
    h.dispatcher.retry_tick();
    assert_eq!(h.dispatcher.queue_depth(), 0);
}

#[test]
fn task_without_waiting_client_is_dropped_on_retry() {
    let mut h = Harness::new(DispatchPolicy::default());
    let (sub, rx) = submission("beef", "client-1");
    h.dispatcher.submit(sub);

    drop(rx);
    h.dispatcher.retry_tick();

    assert_eq!(h.dispatcher.queue_depth(), 0);
}

#[test]
fn stalled_assignment_is_requeued_at_head() {
    let mut h = Harness::new(DispatchPolicy {
        assignment_timeout: Some(Duration::from_secs(60)),
        ..DispatchPolicy::default()
    });
    let stuck = h.add_worker("w-1");
    let (first, _rx1) = submission("aaaa", "client-1");
    let (second, _rx2) = submission("bbbb", "client-1");
    h.dispatcher.submit(first);
    h.dispatcher.submit(second);

    h.clock.advance(Duration::from_secs(61));
    h.dispatcher.retry_tick();

    assert!(stuck.is_closed());
    assert_eq!(h.availability("w-1"), None);
    assert_eq!(
        h.dispatcher.pending_fingerprints(),
        vec![fp("aaaa"), fp("bbbb")]
    );
}

#[test]
fn orphan_is_requeued_and_reassigned() {
    let mut h = Harness::new(DispatchPolicy::default());
    h.add_worker("w-1");
    let (sub, _rx) = submission("beef", "client-1");
    h.dispatcher.submit(sub);

    let orphan = h.registry.remove_worker(&WorkerId::new("w-1")).unwrap();
    let replacement = h.add_worker("w-2");
    h.dispatcher.requeue(orphan);

    assert_eq!(replacement.frames(), vec!["search beef 0 ZZZZ"]);
    assert_eq!(h.availability("w-2"), Some(Availability::Busy(fp("beef"))));
}

#[test]
fn orphan_is_dropped_when_requeue_disabled() {
    let mut h = Harness::new(DispatchPolicy {
        requeue_orphans: false,
        ..DispatchPolicy::default()
    });
    h.add_worker("w-1");
    let (sub, _rx) = submission("beef", "client-1");
    h.dispatcher.submit(sub);

    let orphan = h.registry.remove_worker(&WorkerId::new("w-1")).unwrap();
    h.dispatcher.requeue(orphan);

    assert_eq!(h.dispatcher.queue_depth(), 0);
}

#[test]
fn requeued_orphan_merges_with_pending_duplicate() {
    let mut h = Harness::new(DispatchPolicy::default());
    h.add_worker("w-1");
    let (first, _rx1) = submission("beef", "client-1");
    h.dispatcher.submit(first);
    let orphan = h.registry.remove_worker(&WorkerId::new("w-1")).unwrap();

    let (second, _rx2) = submission("beef", "client-2");
    h.dispatcher.submit(second);
    h.dispatcher.requeue(orphan);

    assert_eq!(h.dispatcher.pending_fingerprints(), vec![fp("beef")]);
    assert_eq!(h.dispatcher.pending[0].waiters().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn run_loop_retries_until_a_worker_arrives() {
    let h = Harness::new(DispatchPolicy::default());
    let registry = h.registry.clone();
    let (handle, inbox) = dispatch_channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(h.dispatcher.run(inbox, shutdown_rx));

    let (reply, _rx) = result_channel(SessionId::new("client-1"), 4);
    handle.submit(HASH, reply).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let channel = FakeChannel::new();
    registry
        .add_worker(WorkerId::new("w-1"), channel.clone(), None)
        .unwrap();
    assert!(channel.frames().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(channel.frames(), vec![format!("search {HASH} 0 ZZZZ")]);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap();
    assert!(channel.is_closed());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn submit_after_stop_reports_stopped() {
    let (handle, inbox) = dispatch_channel(1);
    drop(inbox);
    let (reply, _rx) = result_channel(SessionId::new("client-1"), 4);

    assert_eq!(handle.submit("beef", reply), Err(SubmitError::Stopped));
}

#[tokio::test]
async fn full_submission_channel_reports_queue_full() {
    let (handle, _inbox) = dispatch_channel(1);
    let (reply, _rx) = result_channel(SessionId::new("client-1"), 4);

    handle.submit("aaaa", reply.clone()).unwrap();
    assert_eq!(handle.submit("bbbb", reply), Err(SubmitError::QueueFull));
}
