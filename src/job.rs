use serde::{Deserialize, Serialize};

use crate::id::JobId;

/// Persisted representation of a job.
///
/// This is the only thing the [`crate::store::RecordStore`] ever writes or
/// reads; `forge_queue::Queue` treats it as a transient read-through view,
/// never a long-lived cache entry (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default = "JobRecord::current_version")]
    pub version: u32,
    pub id: JobId,
    pub job_type: String,
    /// Opaque, caller-defined payload. The queue never interprets this.
    pub args: Vec<u8>,
    /// Deduplicated, deterministically ordered dependency ids.
    pub dependencies: Vec<JobId>,
    /// Opaque result payload, present once the job is finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<u8>>,
    pub queued_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
}

impl JobRecord {
    pub const CURRENT_VERSION: u32 = 1;

    const fn current_version() -> u32 {
        Self::CURRENT_VERSION
    }

    pub fn new(id: JobId, job_type: String, args: Vec<u8>, dependencies: Vec<JobId>, now_ms: u64) -> Self {
        JobRecord {
            version: Self::CURRENT_VERSION,
            id,
            job_type,
            args,
            dependencies,
            result: None,
            queued_at: Some(now_ms),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_none()
    }
}

/// Snapshot returned by [`crate::Queue::status`], with the result payload
/// already decoded into the caller's chosen type.
#[derive(Debug, Clone)]
pub struct JobStatus<R> {
    pub queued_at: Option<u64>,
    pub started_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub result: Option<R>,
}

/// Milliseconds since the Unix epoch, matching the teacher's
/// `current_time_millis()` convention.
pub fn current_time_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
