use crate::id::JobId;

/// Errors returned by [`crate::Queue`] operations.
///
/// Every variant corresponds to a distinguishable failure a caller can react
/// to; internal plumbing errors (serialization details, I/O error kinds) are
/// folded into the appropriate variant rather than leaked as-is.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("unknown dependency {0}")]
    UnknownDependency(JobId),

    #[error("job {0} is not running")]
    NotRunning(JobId),

    #[error("dequeue was cancelled")]
    Cancelled,

    #[error("internal pending channel closed unexpectedly")]
    ChannelClosed,

    #[error("bad arguments payload: {0}")]
    BadArguments(#[source] anyhow::Error),

    #[error("bad result payload: {0}")]
    BadResult(#[source] anyhow::Error),

    #[error("corrupt record for job {0}: {1}")]
    Corrupt(JobId, #[source] anyhow::Error),

    #[error("corrupt store: {0}")]
    CorruptStore(#[source] anyhow::Error),

    #[error("storage failure: {0}")]
    StorageFailure(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
