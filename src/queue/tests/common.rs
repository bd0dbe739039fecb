use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::queue::Queue;

fn init_tracing() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A fresh queue over a scratch directory that is cleaned up when the
/// returned `TempDir` is dropped.
pub(super) fn make_queue() -> (Queue, TempDir) {
    init_tracing();
    let dir = tempfile::tempdir().expect("create scratch storage directory");
    let queue = Queue::open(dir.path()).expect("open queue");
    (queue, dir)
}

/// Run `f` on a background thread and assert it completes within `timeout`,
/// returning its result. Used to assert a blocking `dequeue` call actually
/// unblocks instead of hanging forever.
pub(super) fn assert_completes_within<T: Send + 'static>(
    timeout: Duration,
    f: impl FnOnce() -> T + Send + 'static,
) -> T {
    let (tx, rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });

    let deadline = Instant::now() + timeout;
    loop {
        match rx.try_recv() {
            Ok(value) => return value,
            Err(std::sync::mpsc::TryRecvError::Empty) => {
                if Instant::now() >= deadline {
                    panic!("operation did not complete within {timeout:?}");
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                panic!("worker thread dropped its sender without sending a result");
            }
        }
    }
}
