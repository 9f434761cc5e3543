// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry: the single source of truth for connected workers.
//!
//! All state lives behind one mutex. The fingerprint index is updated in the
//! same critical section as the worker's availability, so no fingerprint is
//! ever held by two workers and no worker holds two fingerprints.

use crate::error::RegistryError;
use crate::task::{ResultSink, Task};
use hd_adapters::PeerChannel;
use hd_core::{Availability, Clock, Fingerprint, WorkerId, WorkerStatus};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Assignment {
    task: Task,
    since: Instant,
}

#[derive(Debug)]
struct Entry<C> {
    channel: C,
    peer: Option<IpAddr>,
    busy: Option<Assignment>,
    /// Sequence number of the last transition to idle; lowest is picked first
    released_at: u64,
}

#[derive(Debug)]
struct Inner<C> {
    workers: HashMap<WorkerId, Entry<C>>,
    assigned: HashMap<Fingerprint, WorkerId>,
    sequence: u64,
}

impl<C> Inner<C> {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Why `mark_busy` refused an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    UnknownWorker,
    WorkerBusy,
    AlreadyAssigned,
}

/// A refused assignment; the task is handed back so it is never lost
#[derive(Debug)]
pub struct AssignRejected {
    pub reason: RejectReason,
    pub task: Task,
}

/// Outcome of matching a reported fingerprint against the assignments
#[derive(Debug)]
pub enum Resolution {
    /// The reporter held the fingerprint and is idle again
    Resolved(Task),
    /// No worker holds the fingerprint
    Unassigned,
    /// Another worker holds the fingerprint; it stays busy
    HeldBy(WorkerId),
}

impl Resolution {
    pub fn task(self) -> Option<Task> {
        match self {
            Resolution::Resolved(task) => Some(task),
            Resolution::Unassigned | Resolution::HeldBy(_) => None,
        }
    }
}

/// Result of merging the registry with the fleet's member list
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub retained: usize,
    pub pruned: Vec<WorkerId>,
    /// Tasks held by pruned workers
    pub orphaned: Vec<Task>,
}

#[derive(Debug)]
pub struct Registry<C> {
    inner: Mutex<Inner<C>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                workers: HashMap::new(),
                assigned: HashMap::new(),
                sequence: 0,
            }),
        }
    }
}

impl<C: PeerChannel> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a freshly connected worker as idle
    pub fn add_worker(
        &self,
        id: WorkerId,
        channel: C,
        peer: Option<IpAddr>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.lock();
        if inner.workers.contains_key(&id) {
            return Err(RegistryError::DuplicateWorker(id));
        }
        let released_at = inner.next_sequence();
        inner.workers.insert(
            id,
            Entry {
                channel,
                peer,
                busy: None,
                released_at,
            },
        );
        Ok(())
    }

    /// Deregister a worker and close its channel; idempotent.
    ///
    /// Returns the task it was working on, if any.
    pub fn remove_worker(&self, id: &WorkerId) -> Option<Task> {
        let mut inner = self.lock();
        let entry = inner.workers.remove(id)?;
        entry.channel.close();
        let assignment = entry.busy?;
        inner.assigned.remove(&assignment.task.fingerprint);
        Some(assignment.task)
    }

    /// Move an idle worker to `Busy(task.fingerprint)`
    pub fn mark_busy(
        &self,
        id: &WorkerId,
        task: Task,
        now: Instant,
    ) -> Result<(), AssignRejected> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let reject = |reason, task| Err(AssignRejected { reason, task });

        if inner.assigned.contains_key(&task.fingerprint) {
            return reject(RejectReason::AlreadyAssigned, task);
        }
        let Some(entry) = inner.workers.get_mut(id) else {
            tracing::warn!(worker_id = %id, "mark busy on unknown worker");
            return reject(RejectReason::UnknownWorker, task);
        };
        if entry.busy.is_some() {
            return reject(RejectReason::WorkerBusy, task);
        }

        let fingerprint = task.fingerprint.clone();
        entry.busy = Some(Assignment { task, since: now });
        inner.assigned.insert(fingerprint, id.clone());
        Ok(())
    }

    /// Return a worker to idle; a no-op for idle or unknown workers.
    ///
    /// Returns the task it was holding.
    pub fn mark_idle(&self, id: &WorkerId) -> Option<Task> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let sequence = inner.next_sequence();
        let Some(entry) = inner.workers.get_mut(id) else {
            tracing::debug!(worker_id = %id, "mark idle on unknown worker");
            return None;
        };
        let assignment = entry.busy.take()?;
        entry.released_at = sequence;
        inner.assigned.remove(&assignment.task.fingerprint);
        Some(assignment.task)
    }

    /// Send a frame to a worker without holding the registry lock
    pub fn send(&self, id: &WorkerId, frame: &str) -> Result<(), RegistryError> {
        let channel = self
            .lock()
            .workers
            .get(id)
            .map(|entry| entry.channel.clone())
            .ok_or_else(|| RegistryError::UnknownWorker(id.clone()))?;
        channel.send(frame).map_err(|source| RegistryError::Channel {
            worker: id.clone(),
            source,
        })
    }

    /// The idle worker released longest ago, skipping closed channels
    pub fn find_idle_worker(&self) -> Option<WorkerId> {
        self.lock()
            .workers
            .iter()
            .filter(|(_, entry)| entry.busy.is_none() && !entry.channel.is_closed())
            .min_by_key(|(_, entry)| entry.released_at)
            .map(|(id, _)| id.clone())
    }

    pub fn find_worker_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<WorkerId> {
        self.lock().assigned.get(fingerprint).cloned()
    }

    /// Free `reporter` from `fingerprint` and hand back its task.
    ///
    /// Nothing changes unless `reporter` is the worker holding `fingerprint`.
    pub fn resolve(&self, fingerprint: &Fingerprint, reporter: &WorkerId) -> Resolution {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.assigned.get(fingerprint) {
            None => return Resolution::Unassigned,
            Some(holder) if holder != reporter => return Resolution::HeldBy(holder.clone()),
            Some(_) => {}
        }
        let sequence = inner.next_sequence();
        let Some(entry) = inner.workers.get_mut(reporter) else {
            return Resolution::Unassigned;
        };
        let Some(assignment) = entry.busy.take() else {
            return Resolution::Unassigned;
        };
        entry.released_at = sequence;
        inner.assigned.remove(fingerprint);
        Resolution::Resolved(assignment.task)
    }

    /// Add a waiter to the task assigned to `fingerprint`.
    ///
    /// Hands the sink back when nothing holds that fingerprint.
    pub fn attach_waiter(
        &self,
        fingerprint: &Fingerprint,
        sink: ResultSink,
    ) -> Result<(), ResultSink> {
        let mut inner = self.lock();
        let Some(id) = inner.assigned.get(fingerprint).cloned() else {
            return Err(sink);
        };
        match inner.workers.get_mut(&id).and_then(|e| e.busy.as_mut()) {
            Some(assignment) => {
                assignment.task.attach(sink);
                Ok(())
            }
            None => Err(sink),
        }
    }

    pub fn list_worker_ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.lock().workers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().workers.is_empty()
    }

    pub fn idle_count(&self) -> usize {
        self.lock()
            .workers
            .values()
            .filter(|entry| entry.busy.is_none())
            .count()
    }

    pub fn availability(&self, id: &WorkerId) -> Option<Availability> {
        self.lock().workers.get(id).map(|entry| match &entry.busy {
            None => Availability::Idle,
            Some(a) => Availability::Busy(a.task.fingerprint.clone()),
        })
    }

    /// Status rows ordered by worker id
    pub fn snapshot(&self) -> Vec<WorkerStatus> {
        let inner = self.lock();
        let mut rows: Vec<_> = inner
            .workers
            .iter()
            .map(|(id, entry)| {
                let availability = match &entry.busy {
                    None => Availability::Idle,
                    Some(a) => Availability::Busy(a.task.fingerprint.clone()),
                };
                WorkerStatus::new(id.clone(), &availability)
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        rows
    }

    /// Merge the registry with the fleet's current members.
    ///
    /// Workers whose channel closed are dropped. Idle workers with a known peer
    /// address missing from a member list that names IP addresses are dropped
    /// as scaled away. Busy workers with an open channel always keep their
    /// assignment. Workers only ever join through the handshake.
    pub fn reconcile(&self, members: &[String]) -> Reconciliation {
        let member_ips: HashSet<IpAddr> = members
            .iter()
            .filter_map(|m| m.trim().parse().ok())
            .collect();

        let mut inner = self.lock();
        let doomed: Vec<WorkerId> = inner
            .workers
            .iter()
            .filter(|(_, entry)| {
                if entry.channel.is_closed() {
                    return true;
                }
                let scaled_away = match entry.peer {
                    Some(ip) => !member_ips.is_empty() && !member_ips.contains(&ip),
                    None => false,
                };
                entry.busy.is_none() && scaled_away
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut result = Reconciliation::default();
        for id in doomed {
            let Some(entry) = inner.workers.remove(&id) else {
                continue;
            };
            entry.channel.close();
            if let Some(assignment) = entry.busy {
                inner.assigned.remove(&assignment.task.fingerprint);
                result.orphaned.push(assignment.task);
            }
            result.pruned.push(id);
        }
        result.pruned.sort();
        result.retained = inner.workers.len();
        result
    }

    /// Busy workers whose assignment is at least `timeout` old
    pub fn stalled<K: Clock>(&self, clock: &K, timeout: Duration) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self
            .lock()
            .workers
            .iter()
            .filter(|(_, entry)| {
                entry
                    .busy
                    .as_ref()
                    .is_some_and(|a| clock.since(a.since) >= timeout)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Close every worker channel and forget all workers
    pub fn close_all(&self) -> usize {
        let mut inner = self.lock();
        inner.assigned.clear();
        let count = inner.workers.len();
        for (_, entry) in inner.workers.drain() {
            entry.channel.close();
        }
        count
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
