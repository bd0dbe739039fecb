use std::collections::{HashMap, VecDeque};

use crate::id::JobId;

/// Default bound on the number of ready-but-undispatched ids held per job
/// type. A tunable knob, not a contract (see Design Notes on the per-type
/// channel bound).
pub const DEFAULT_PENDING_CAPACITY: usize = 100;

/// Per-type bounded FIFO registry of ids ready for dispatch.
///
/// Channels are created lazily on first reference to a type, mirroring the
/// teacher's lazily-populated per-type dispatch structures. All mutation
/// happens under the queue's single mutex; this type carries no locking of
/// its own.
pub struct PendingRegistry {
    capacity: usize,
    channels: HashMap<String, VecDeque<JobId>>,
}

impl PendingRegistry {
    pub fn new(capacity: usize) -> Self {
        PendingRegistry {
            capacity,
            channels: HashMap::new(),
        }
    }

    /// Ensure a channel exists for `job_type`, without adding anything to it.
    /// Needed so a `Dequeue` call with no matching producers yet still has
    /// something to observe once Enqueue arrives.
    pub fn ensure_channel(&mut self, job_type: &str) {
        self.channels
            .entry(job_type.to_string())
            .or_insert_with(VecDeque::new);
    }

    /// True if the channel for `job_type` is at capacity.
    pub fn is_full(&self, job_type: &str) -> bool {
        self.channels
            .get(job_type)
            .is_some_and(|c| c.len() >= self.capacity)
    }

    /// Publish `id` to the back of its type's channel. Caller must have
    /// already checked `is_full` (or be willing to exceed capacity, e.g.
    /// during recovery where backpressure does not apply).
    pub fn push(&mut self, job_type: &str, id: JobId) {
        self.channels
            .entry(job_type.to_string())
            .or_insert_with(VecDeque::new)
            .push_back(id);
    }

    /// Pop the next ready id for any of `types`, in the caller-supplied
    /// order. Returns the first non-empty channel found.
    pub fn pop_any(&mut self, types: &[String]) -> Option<JobId> {
        for t in types {
            if let Some(channel) = self.channels.get_mut(t) {
                if let Some(id) = channel.pop_front() {
                    return Some(id);
                }
            }
        }
        None
    }

    pub fn len(&self, job_type: &str) -> usize {
        self.channels.get(job_type).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_within_a_single_type() {
        let mut reg = PendingRegistry::new(10);
        let a = JobId::new();
        let b = JobId::new();
        reg.push("build", a);
        reg.push("build", b);

        assert_eq!(reg.pop_any(&["build".to_string()]), Some(a));
        assert_eq!(reg.pop_any(&["build".to_string()]), Some(b));
        assert_eq!(reg.pop_any(&["build".to_string()]), None);
    }

    #[test]
    fn is_full_respects_capacity() {
        let mut reg = PendingRegistry::new(1);
        let a = JobId::new();
        reg.push("build", a);
        assert!(reg.is_full("build"));
        assert!(!reg.is_full("ship"));
    }

    #[test]
    fn pop_any_checks_types_in_order() {
        let mut reg = PendingRegistry::new(10);
        let a = JobId::new();
        reg.push("ship", a);
        let popped = reg.pop_any(&["build".to_string(), "ship".to_string()]);
        assert_eq!(popped, Some(a));
    }
}
