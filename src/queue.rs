use std::path::Path;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::dependants::DependantIndex;
use crate::error::{QueueError, Result};
use crate::id::JobId;
use crate::job::{current_time_millis, JobRecord, JobStatus};
use crate::pending::{PendingRegistry, DEFAULT_PENDING_CAPACITY};
use crate::recovery;
use crate::store::RecordStore;
use crate::sync_ext::{CondvarExt, MutexExt};

/// How often a blocked `dequeue` wakes up to re-check its cancel token. The
/// token itself carries no wakeup signal (see `cancel.rs`), so this bounds
/// cancellation latency in the absence of a matching `enqueue`.
const DEQUEUE_CANCEL_POLL: Duration = Duration::from_millis(200);

struct Inner {
    pending: PendingRegistry,
    dependants: DependantIndex,
}

/// A persistent, dependency-aware job queue rooted at a single storage
/// directory.
///
/// All mutating operations (`enqueue`, `dequeue`, `finish`) serialize
/// through one queue-wide mutex; `dequeue` is the sole operation that
/// releases it while waiting, so concurrent producers can make progress
/// while workers block. `status` never takes the lock; it reads straight
/// through to the record store.
pub struct Queue {
    store: RecordStore,
    state: Mutex<Inner>,
    cv: Condvar,
}

impl Queue {
    /// Open (or create) a queue rooted at `dir`, recovering in-memory
    /// indices from whatever is already persisted there.
    ///
    /// At most one `Queue` should govern a given directory at a time; the
    /// queue itself enforces no cross-process lock (see the storage-layout
    /// Non-goal: no lock file).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(dir, DEFAULT_PENDING_CAPACITY)
    }

    /// Like [`Queue::open`], but with an explicit per-type pending-channel
    /// bound instead of the default.
    pub fn open_with_capacity(dir: impl AsRef<Path>, pending_capacity: usize) -> Result<Self> {
        let store = RecordStore::open(dir.as_ref()).map_err(QueueError::StorageFailure)?;
        let (pending, dependants) = recovery::recover(&store, pending_capacity)
            .map_err(QueueError::CorruptStore)?;
        tracing::info!(dir = %dir.as_ref().display(), "queue recovered");
        Ok(Queue {
            store,
            state: Mutex::new(Inner { pending, dependants }),
            cv: Condvar::new(),
        })
    }

    /// Enqueue a new job of `job_type` with caller-defined `args`, ready
    /// only once every id in `dependencies` has finished.
    pub fn enqueue<A: Serialize>(
        &self,
        job_type: impl Into<String>,
        args: &A,
        dependencies: Vec<JobId>,
    ) -> Result<JobId> {
        let job_type = job_type.into();
        let mut deps = dependencies;
        dedup_preserve_order(&mut deps);

        let args_bytes = serde_json::to_vec(args).map_err(|e| QueueError::BadArguments(e.into()))?;
        let now = current_time_millis();

        let mut guard = self.state.lock_unpoisoned();

        let mut dep_finished = Vec::with_capacity(deps.len());
        for dep in &deps {
            let dep_record = self
                .store
                .read(*dep)
                .map_err(QueueError::StorageFailure)?
                .ok_or(QueueError::UnknownDependency(*dep))?;
            dep_finished.push(dep_record.is_finished());
        }

        let id = JobId::new();
        let record = JobRecord::new(id, job_type.clone(), args_bytes, deps.clone(), now);
        self.store.write(&record).map_err(QueueError::StorageFailure)?;

        let all_finished = dep_finished.iter().all(|f| *f);
        if all_finished {
            guard = self
                .cv
                .wait_while_unpoisoned(guard, |inner| inner.pending.is_full(&job_type));
            guard.pending.push(&job_type, id);
        } else {
            for (dep, finished) in deps.iter().zip(dep_finished.iter()) {
                if !finished {
                    guard.dependants.register(*dep, id);
                }
            }
        }
        drop(guard);
        if all_finished {
            self.cv.notify_all();
        }

        tracing::debug!(job_id = %id, job_type = %job_type, dependencies = deps.len(), "job enqueued");
        Ok(id)
    }

    /// Block until a job of one of `accepted_types` is ready, or `cancel`
    /// fires. On success, returns the job's id and its decoded arguments,
    /// having stamped and persisted `started_at`.
    pub fn dequeue<A: DeserializeOwned>(
        &self,
        cancel: &CancelToken,
        accepted_types: &[String],
    ) -> Result<(JobId, A)> {
        if cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }

        let mut guard = self.state.lock_unpoisoned();
        for t in accepted_types {
            guard.pending.ensure_channel(t);
        }

        let id = loop {
            if cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            if let Some(id) = guard.pending.pop_any(accepted_types) {
                break id;
            }
            let (next_guard, _timeout) =
                self.cv.wait_timeout_unpoisoned(guard, DEQUEUE_CANCEL_POLL);
            guard = next_guard;
        };

        let mut record = self
            .store
            .read(id)
            .map_err(QueueError::StorageFailure)?
            .ok_or(QueueError::UnknownJob(id))?;
        record.started_at = Some(current_time_millis());
        self.store.write(&record).map_err(QueueError::StorageFailure)?;
        drop(guard);
        // Popping freed one slot in this type's channel; wake any enqueue
        // blocked on `is_full` for it.
        self.cv.notify_all();

        let args = serde_json::from_slice(&record.args).map_err(|e| QueueError::Corrupt(id, e.into()))?;
        tracing::debug!(job_id = %id, job_type = %record.job_type, "job dequeued");
        Ok((id, args))
    }

    /// Mark a running job finished with `result`, releasing any dependants
    /// whose last unfinished dependency was this job.
    pub fn finish<R: Serialize>(&self, id: JobId, result: &R) -> Result<()> {
        let result_bytes = serde_json::to_vec(result).map_err(|e| QueueError::BadResult(e.into()))?;
        let now = current_time_millis();

        let mut guard = self.state.lock_unpoisoned();

        let mut record = self
            .store
            .read(id)
            .map_err(QueueError::StorageFailure)?
            .ok_or(QueueError::UnknownJob(id))?;
        if !record.is_running() {
            return Err(QueueError::NotRunning(id));
        }
        record.result = Some(result_bytes);
        record.finished_at = Some(now);
        self.store.write(&record).map_err(QueueError::StorageFailure)?;

        let released = self.release_dependants(&mut guard, id)?;
        drop(guard);
        if !released.is_empty() {
            self.cv.notify_all();
        }

        tracing::debug!(job_id = %id, released = released.len(), "job finished");
        Ok(())
    }

    /// For each dependant waiting on `id`, check whether all of its
    /// dependencies are now finished and, if so, publish it. Returns the
    /// ids that were published.
    fn release_dependants(&self, guard: &mut Inner, id: JobId) -> Result<Vec<JobId>> {
        let mut released = Vec::new();
        for dependant_id in guard.dependants.take(id) {
            let dependant_record = match self.store.read(dependant_id).map_err(QueueError::StorageFailure)? {
                Some(r) => r,
                None => {
                    tracing::warn!(job_id = %dependant_id, "dependant disappeared from store before release");
                    continue;
                }
            };
            let mut finished_count = 0usize;
            for dep in &dependant_record.dependencies {
                let dep_finished = self
                    .store
                    .read(*dep)
                    .map_err(QueueError::StorageFailure)?
                    .map(|r| r.is_finished())
                    .unwrap_or(true);
                if dep_finished {
                    finished_count += 1;
                }
            }
            if finished_count == dependant_record.dependencies.len() {
                guard.pending.push(&dependant_record.job_type, dependant_id);
                released.push(dependant_id);
            }
        }
        Ok(released)
    }

    /// Read a job's current lifecycle timestamps and, once finished, its
    /// decoded result. Never takes the queue lock.
    pub fn status<R: DeserializeOwned>(&self, id: JobId) -> Result<JobStatus<R>> {
        let record = self
            .store
            .read(id)
            .map_err(QueueError::StorageFailure)?
            .ok_or(QueueError::UnknownJob(id))?;

        let result = match &record.result {
            Some(bytes) => Some(
                serde_json::from_slice(bytes).map_err(|e| QueueError::Corrupt(id, e.into()))?,
            ),
            None => None,
        };

        Ok(JobStatus {
            queued_at: record.queued_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            result,
        })
    }

    /// Number of ids currently ready (not yet dequeued) for `job_type`.
    pub fn len_pending(&self, job_type: &str) -> usize {
        self.state.lock_unpoisoned().pending.len(job_type)
    }

    /// Whether `id` has a persisted record at all.
    pub fn is_known(&self, id: JobId) -> bool {
        self.store.exists(id)
    }
}

fn dedup_preserve_order(ids: &mut Vec<JobId>) {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.retain(|id| seen.insert(*id));
}

#[cfg(test)]
#[path = "queue/tests/mod.rs"]
mod tests;
