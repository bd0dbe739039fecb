mod cancel;
mod dependants;
mod error;
mod id;
mod job;
mod pending;
mod queue;
mod recovery;
mod store;
mod sync_ext;

pub use crate::cancel::CancelToken;
pub use crate::error::{QueueError, Result};
pub use crate::id::JobId;
pub use crate::job::JobStatus;
pub use crate::pending::DEFAULT_PENDING_CAPACITY;
pub use crate::queue::Queue;
