//! Deferred deallocation for reference matrices
//!
//! Every matrix the audio thread holds lives in a `basedrop::Owned<T>`.
//! When a topology change or preset swaps a stream's matrix, the old one is
//! dropped on the audio thread; that drop only enqueues the pointer, and a
//! background collector frees the weights later.
//!
//! There is one collector per process. Its reclaim interval comes from
//! [`ReferencingConfig::gc_interval_ms`](crate::config::ReferencingConfig)
//! of whichever state is created first.

use std::sync::{mpsc, OnceLock};
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// Reclaim interval used when no config is involved
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_millis(100);

struct MatrixCollector {
    handle: Handle,
    interval: Duration,
}

static COLLECTOR: OnceLock<MatrixCollector> = OnceLock::new();

/// Start the collector thread and hand its `Handle` back to the caller
///
/// `Collector` is `!Sync`, so it is created on and never leaves its thread.
fn spawn_collector(interval: Duration) -> MatrixCollector {
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("vref-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Matrix collector started ({:?} interval)", interval);

            loop {
                thread::sleep(interval);
                collector.collect();
            }
        })
        .expect("Failed to spawn matrix collector thread");

    let handle = rx.recv().expect("Matrix collector exited before handing out its handle");
    MatrixCollector { handle, interval }
}

/// Handle to the process-wide collector, starting it with `interval` if it
/// isn't running yet
pub fn gc_handle_with_interval(interval: Duration) -> Handle {
    let collector = COLLECTOR.get_or_init(|| spawn_collector(interval));
    if collector.interval != interval {
        log::debug!(
            "Matrix collector already running at {:?}, ignoring {:?}",
            collector.interval,
            interval
        );
    }
    collector.handle.clone()
}

/// Handle to the process-wide collector
pub fn gc_handle() -> Handle {
    gc_handle_with_interval(DEFAULT_COLLECT_INTERVAL)
}

/// Interval of the running collector, if one has been started
pub fn collect_interval() -> Option<Duration> {
    COLLECTOR.get().map(|c| c.interval)
}
