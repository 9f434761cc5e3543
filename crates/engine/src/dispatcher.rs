// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task dispatcher: owns the pending queue and every assignment decision.
//!
//! One loop multiplexes client submissions, requeued tasks, a single retry
//! timer and the autoscaler tick, so registry mutations that pick workers all
//! happen on one logical thread of control.

use crate::autoscaler::Autoscaler;
use crate::error::SubmitError;
use crate::registry::{RejectReason, Registry};
use crate::task::{ResultSink, Submission, Task};
use hd_adapters::{FleetController, PeerChannel};
use hd_core::{search_frame, Clock, DispatchPolicy, Fingerprint, WorkerId};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Producer side of the dispatcher, cloned into every connection handler
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    submissions: mpsc::Sender<Submission>,
    requeues: mpsc::UnboundedSender<Task>,
}

/// Consumer side, moved into [`Dispatcher::run`]
#[derive(Debug)]
pub struct DispatcherInbox {
    pub(crate) submissions: mpsc::Receiver<Submission>,
    pub(crate) requeues: mpsc::UnboundedReceiver<Task>,
}

pub fn dispatch_channel(capacity: usize) -> (DispatcherHandle, DispatcherInbox) {
    let (submissions_tx, submissions_rx) = mpsc::channel(capacity.max(1));
    let (requeues_tx, requeues_rx) = mpsc::unbounded_channel();
    (
        DispatcherHandle {
            submissions: submissions_tx,
            requeues: requeues_tx,
        },
        DispatcherInbox {
            submissions: submissions_rx,
            requeues: requeues_rx,
        },
    )
}

impl DispatcherHandle {
    /// Hand a raw submission to the dispatcher without waiting
    pub fn submit(&self, raw: &str, reply: ResultSink) -> Result<(), SubmitError> {
        let submission = Submission {
            raw: raw.to_string(),
            reply,
        };
        self.submissions.try_send(submission).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Stopped,
        })
    }

    /// Return a task taken from a departed worker
    pub fn requeue(&self, task: Task) -> Result<(), SubmitError> {
        self.requeues.send(task).map_err(|_| SubmitError::Stopped)
    }
}

/// What happened to one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Added to the tail of the queue
    Queued(Fingerprint),
    /// Joined a task already pending or assigned
    Coalesced(Fingerprint),
    /// Queue at capacity; submission discarded
    Dropped(Fingerprint),
    /// Blank after normalization
    Ignored,
}

/// How one attempt to hand a task to a selected worker ended
#[derive(Debug)]
enum Assignment {
    Sent,
    /// The task left this dispatcher some other way
    Absorbed,
    /// The worker left or turned busy after it was selected
    Stale(Task),
    /// The frame could not be sent
    Failed(Task),
}

pub struct Dispatcher<C, F, K> {
    registry: Arc<Registry<C>>,
    autoscaler: Autoscaler<C, F>,
    policy: DispatchPolicy,
    clock: K,
    pending: VecDeque<Task>,
    retry_at: Option<Instant>,
}

impl<C, F, K> Dispatcher<C, F, K>
where
    C: PeerChannel,
    F: FleetController,
    K: Clock,
{
    pub fn new(
        registry: Arc<Registry<C>>,
        autoscaler: Autoscaler<C, F>,
        policy: DispatchPolicy,
        clock: K,
    ) -> Self {
        Self {
            registry,
            autoscaler,
            policy,
            clock,
            pending: VecDeque::new(),
            retry_at: None,
        }
    }

    /// Tasks accepted but not yet assigned
    pub fn queue_depth(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_fingerprints(&self) -> Vec<Fingerprint> {
        self.pending.iter().map(|t| t.fingerprint.clone()).collect()
    }

    pub fn retry_armed(&self) -> bool {
        self.retry_at.is_some()
    }

    /// Accept a client submission and try to assign the queue head
    pub fn submit(&mut self, submission: Submission) -> SubmitOutcome {
        let outcome = self.enqueue(submission);
        self.pump();
        outcome
    }

    fn enqueue(&mut self, submission: Submission) -> SubmitOutcome {
        let Ok(fingerprint) = Fingerprint::normalize(&submission.raw) else {
            tracing::debug!("ignoring blank submission");
            return SubmitOutcome::Ignored;
        };
        let session = submission.reply.session().clone();

        let existing = self.pending.iter_mut().find(|t| t.fingerprint == fingerprint);
        if let Some(task) = existing {
            task.attach(submission.reply);
            tracing::info!(
                fingerprint = %fingerprint,
                session = %session,
                "joined pending task"
            );
            return SubmitOutcome::Coalesced(fingerprint);
        }

        let reply = match self.registry.attach_waiter(&fingerprint, submission.reply) {
            Ok(()) => {
                tracing::info!(
                    fingerprint = %fingerprint,
                    session = %session,
                    "joined assigned task"
                );
                return SubmitOutcome::Coalesced(fingerprint);
            }
            Err(reply) => reply,
        };

        if self.pending.len() >= self.policy.queue_capacity {
            tracing::warn!(
                fingerprint = %fingerprint,
                session = %session,
                "task queue full, dropping submission"
            );
            return SubmitOutcome::Dropped(fingerprint);
        }

        tracing::info!(fingerprint = %fingerprint, session = %session, "task queued");
        self.pending
            .push_back(Task::new(fingerprint.clone(), reply, self.clock.now()));
        SubmitOutcome::Queued(fingerprint)
    }

    /// Assign queued tasks, oldest first, until the queue or the idle pool runs out.
    ///
    /// Returns how many tasks were assigned.
    pub fn pump(&mut self) -> usize {
        self.pump_with(Registry::find_idle_worker)
    }

    fn pump_with(&mut self, mut select: impl FnMut(&Registry<C>) -> Option<WorkerId>) -> usize {
        let mut assigned = 0;
        let mut stale = 0;
        while let Some(task) = self.pending.pop_front() {
            let Some(worker) = select(self.registry.as_ref()) else {
                tracing::debug!(
                    fingerprint = %task.fingerprint,
                    depth = self.pending.len() + 1,
                    "no idle worker, retrying later"
                );
                self.pending.push_front(task);
                self.arm_retry();
                break;
            };
            match self.assign(&worker, task) {
                Assignment::Sent => assigned += 1,
                Assignment::Absorbed => {}
                Assignment::Stale(task) => {
                    self.pending.push_front(task);
                    stale += 1;
                    // Each stale pick should drop that worker from selection
                    if stale > self.registry.len() {
                        self.arm_retry();
                        break;
                    }
                    tracing::debug!(worker_id = %worker, "worker changed before assignment");
                }
                Assignment::Failed(task) => {
                    self.pending.push_front(task);
                    self.arm_retry();
                    break;
                }
            }
        }
        assigned
    }

    /// Mark `worker` busy, then send. A failed send puts the worker back to
    /// idle and hands the task back for retry.
    fn assign(&mut self, worker: &WorkerId, task: Task) -> Assignment {
        let fingerprint = task.fingerprint.clone();
        let frame = search_frame(&fingerprint, &self.policy.range);

        if let Err(rejected) = self.registry.mark_busy(worker, task, self.clock.now()) {
            return match rejected.reason {
                RejectReason::AlreadyAssigned => {
                    self.merge_into_assigned(rejected.task);
                    Assignment::Absorbed
                }
                RejectReason::UnknownWorker | RejectReason::WorkerBusy => {
                    Assignment::Stale(rejected.task)
                }
            };
        }

        match self.registry.send(worker, &frame) {
            Ok(()) => {
                tracing::info!(worker_id = %worker, fingerprint = %fingerprint, "task assigned");
                Assignment::Sent
            }
            Err(e) => {
                tracing::warn!(
                    worker_id = %worker,
                    fingerprint = %fingerprint,
                    error = %e,
                    "send to worker failed, retrying task"
                );
                match self.registry.mark_idle(worker) {
                    Some(task) => Assignment::Failed(task),
                    // Worker deregistered in between; its handler requeues the task
                    None => Assignment::Absorbed,
                }
            }
        }
    }

    fn merge_into_assigned(&mut self, task: Task) {
        let fingerprint = task.fingerprint.clone();
        let mut leftover = Vec::new();
        for waiter in task.into_waiters() {
            if let Err(waiter) = self.registry.attach_waiter(&fingerprint, waiter) {
                leftover.push(waiter);
            }
        }
        // The assignment resolved meanwhile; queue whoever is still waiting
        let mut waiters = leftover.into_iter();
        if let Some(first) = waiters.next() {
            let mut task = Task::new(fingerprint, first, self.clock.now());
            for waiter in waiters {
                task.attach(waiter);
            }
            self.pending.push_front(task);
        }
    }

    fn arm_retry(&mut self) {
        if self.retry_at.is_none() {
            self.retry_at = Some(Instant::now() + self.policy.retry_delay);
        }
    }

    /// Put a task back at the head of the queue, merging with any copy of the
    /// same fingerprint already pending or assigned
    pub fn adopt(&mut self, task: Task) {
        if let Some(existing) = self
            .pending
            .iter_mut()
            .find(|t| t.fingerprint == task.fingerprint)
        {
            existing.merge(task);
            return;
        }
        if self.registry.find_worker_by_fingerprint(&task.fingerprint).is_some() {
            self.merge_into_assigned(task);
            return;
        }
        self.pending.push_front(task);
    }

    /// Handle a task whose worker went away mid-assignment
    pub fn requeue(&mut self, task: Task) {
        if !self.policy.requeue_orphans {
            tracing::warn!(
                fingerprint = %task.fingerprint,
                "worker lost mid-assignment, task dropped"
            );
            return;
        }
        tracing::info!(fingerprint = %task.fingerprint, "requeueing orphaned task");
        self.adopt(task);
        self.pump();
    }

    /// Fire the retry timer: expire stalled assignments, age pending tasks,
    /// then assign what can be assigned
    pub fn retry_tick(&mut self) -> usize {
        self.retry_at = None;
        self.expire_stalled();
        self.age_pending();
        self.pump()
    }

    /// Drop workers that have held one assignment longer than the timeout
    fn expire_stalled(&mut self) {
        let Some(timeout) = self.policy.assignment_timeout else {
            return;
        };
        for worker in self.registry.stalled(&self.clock, timeout) {
            tracing::warn!(
                worker_id = %worker,
                ?timeout,
                "assignment timed out, dropping worker"
            );
            if let Some(task) = self.registry.remove_worker(&worker) {
                self.adopt(task);
            }
        }
    }

    /// Count one more attempt for every pending task and abandon the ones out
    /// of budget or no longer wanted
    fn age_pending(&mut self) {
        let clock = &self.clock;
        let max_attempts = self.policy.max_attempts;
        let deadline = self.policy.task_deadline;

        self.pending.retain_mut(|task| {
            if !task.has_live_waiters() {
                tracing::info!(
                    fingerprint = %task.fingerprint,
                    "no client waiting, dropping task"
                );
                return false;
            }
            if max_attempts.is_some_and(|max| task.attempts >= max) {
                tracing::warn!(
                    fingerprint = %task.fingerprint,
                    attempts = task.attempts,
                    "attempt budget exhausted, abandoning task"
                );
                return false;
            }
            if deadline.is_some_and(|d| clock.since(task.submitted_at) >= d) {
                tracing::warn!(
                    fingerprint = %task.fingerprint,
                    attempts = task.attempts,
                    "task deadline passed, abandoning task"
                );
                return false;
            }
            task.attempts += 1;
            true
        });
    }

    /// Run the autoscaler once and take back any orphaned tasks
    pub async fn scale_tick(&mut self) {
        self.expire_stalled();
        let orphans = self.autoscaler.tick(self.pending.len()).await;
        for task in orphans {
            self.requeue(task);
        }
        self.pump();
    }

    /// Event loop; returns when `shutdown` flips to true or its sender drops.
    ///
    /// Closes every worker channel on the way out.
    pub async fn run(
        mut self,
        mut inbox: DispatcherInbox,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let period = self.autoscaler.interval();
        let mut scale = tokio::time::interval_at(Instant::now() + period, period);
        scale.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(?period, "dispatcher started");
        while !*shutdown.borrow() {
            let retry_at = self.retry_at;
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(submission) = inbox.submissions.recv() => {
                    self.submit(submission);
                }
                Some(task) = inbox.requeues.recv() => {
                    self.requeue(task);
                }
                _ = sleep_until(retry_at), if retry_at.is_some() => {
                    self.retry_tick();
                }
                _ = scale.tick() => {
                    self.scale_tick().await;
                }
            }
        }

        let closed = self.registry.close_all();
        tracing::info!(
            workers = closed,
            pending = self.pending.len(),
            "dispatcher stopped"
        );
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
