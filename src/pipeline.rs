//! Pipeline supervisor: owns the capture queue and the three long-lived
//! threads (capture, analyzer, persistence worker) and drives the
//! `Running -> Stopping -> Stopped` shutdown sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::capture::{self, CaptureHandle};
use crate::config;
use crate::decode;
use crate::emit::Emitter;
use crate::queue::CaptureQueue;
use crate::stats::persist::{PersistenceWorker, ShutdownEvent};
use crate::stats::CounterRegistry;

/// Pipeline lifecycle; transitions are monotonic and never move backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Stopping,
    Stopped,
}

pub struct Pipeline {
    queue: Arc<CaptureQueue>,
    counters: Arc<CounterRegistry>,
    stop_flag: Arc<AtomicBool>,
    state: Mutex<PipelineState>,
    capture_handle: Option<JoinHandle<()>>,
    analyzer_handle: Option<JoinHandle<()>>,
    persistence_worker: Option<PersistenceWorker>,
    persist_shutdown: Arc<ShutdownEvent>,
}

impl Pipeline {
    /// Spawns the capture, analyzer and persistence-worker threads and
    /// transitions to `Running`.
    pub fn start(
        capture_handle: CaptureHandle,
        emitter: Arc<Emitter>,
        counters: Arc<CounterRegistry>,
        json_path: String,
        db_path: Option<String>,
    ) -> Self {
        let queue = Arc::new(CaptureQueue::new(config::QUEUE_CAPACITY));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let persist_shutdown = ShutdownEvent::new();

        let capture_thread = {
            let queue = queue.clone();
            let stop_flag = stop_flag.clone();
            thread::Builder::new()
                .name("capture".into())
                .spawn(move || capture::run(capture_handle, queue, stop_flag))
                .expect("failed to spawn capture thread")
        };

        let analyzer_thread = {
            let queue = queue.clone();
            let counters = counters.clone();
            let stop_flag = stop_flag.clone();
            thread::Builder::new()
                .name("analyzer".into())
                .spawn(move || run_analyzer(queue, counters, emitter, stop_flag))
                .expect("failed to spawn analyzer thread")
        };

        let persistence_worker =
            PersistenceWorker::spawn(counters.clone(), json_path, db_path, persist_shutdown.clone());

        Pipeline {
            queue,
            counters,
            stop_flag,
            state: Mutex::new(PipelineState::Running),
            capture_handle: Some(capture_thread),
            analyzer_handle: Some(analyzer_thread),
            persistence_worker: Some(persistence_worker),
            persist_shutdown,
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap()
    }

    pub fn counters(&self) -> &Arc<CounterRegistry> {
        &self.counters
    }

    /// Signals shutdown and waits for the analyzer to drain the queue, up
    /// to a timeout scaled by remaining queue depth
    /// (`SHUTDOWN_TIMEOUT_BASE_SECS + SHUTDOWN_TIMEOUT_PER_ENTRY_MS * depth`,
    /// capped at `SHUTDOWN_TIMEOUT_MAX_SECS`). On timeout the analyzer is
    /// abandoned rather than allowed to delay exit indefinitely.
    pub fn shutdown(mut self) {
        *self.state.lock().unwrap() = PipelineState::Stopping;
        self.stop_flag.store(true, Ordering::SeqCst);
        self.queue.notify_shutdown();

        if let Some(h) = self.capture_handle.take() {
            let _ = h.join();
        }

        let depth = self.queue.depth() as u64;
        let timeout = drain_timeout(depth);
        let deadline = Instant::now() + timeout;

        if let Some(h) = self.analyzer_handle.take() {
            let joined = join_with_deadline(h, deadline);
            if !joined {
                warn!(
                    "analyzer did not drain within {:?}, abandoning it and declaring remaining frames lost",
                    timeout
                );
            }
        }

        self.persist_shutdown.signal();
        if let Some(w) = self.persistence_worker.take() {
            w.join();
        }

        *self.state.lock().unwrap() = PipelineState::Stopped;
        info!("pipeline stopped");
    }
}

/// `SHUTDOWN_TIMEOUT_BASE_SECS + SHUTDOWN_TIMEOUT_PER_ENTRY_MS * depth`,
/// capped at `SHUTDOWN_TIMEOUT_MAX_SECS`.
fn drain_timeout(depth: u64) -> Duration {
    let millis = config::SHUTDOWN_TIMEOUT_BASE_SECS * 1000
        + config::SHUTDOWN_TIMEOUT_PER_ENTRY_MS * depth;
    let cap_millis = config::SHUTDOWN_TIMEOUT_MAX_SECS * 1000;
    Duration::from_millis(millis.min(cap_millis))
}

/// Joins `handle`, polling so the caller can give up at `deadline` without
/// blocking the supervisor thread indefinitely. Returns `true` if the
/// thread finished before the deadline.
fn join_with_deadline(handle: JoinHandle<()>, deadline: Instant) -> bool {
    if handle.is_finished() {
        let _ = handle.join();
        return true;
    }
    while Instant::now() < deadline {
        if handle.is_finished() {
            let _ = handle.join();
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    // Detach: the thread keeps running but we stop waiting on it.
    drop(handle);
    false
}

fn run_analyzer(
    queue: Arc<CaptureQueue>,
    counters: Arc<CounterRegistry>,
    emitter: Arc<Emitter>,
    stop_flag: Arc<AtomicBool>,
) {
    info!("analyzer thread started");
    loop {
        match queue.pop(|| stop_flag.load(Ordering::SeqCst)) {
            Some(frame) => decode::decode_frame(&frame, &counters, &emitter),
            None => break,
        }
    }
    info!("analyzer thread exiting, queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_timeout_scales_with_depth_and_caps() {
        assert_eq!(drain_timeout(0), Duration::from_secs(10));
        assert_eq!(drain_timeout(500), Duration::from_millis(10_000 + 5_000));
        let huge = drain_timeout(10_000_000);
        assert_eq!(huge, Duration::from_secs(config::SHUTDOWN_TIMEOUT_MAX_SECS));
    }

    #[test]
    fn shutdown_drains_five_hundred_queued_frames_before_stopping() {
        use std::time::UNIX_EPOCH;

        let queue = Arc::new(CaptureQueue::new(config::QUEUE_CAPACITY));
        for i in 0..500u32 {
            queue.push(i, UNIX_EPOCH, &[0u8; 14]);
        }
        assert_eq!(queue.depth(), 500);

        let counters = Arc::new(CounterRegistry::new());
        let emitter = Arc::new(Emitter::new(crate::emit::Verbosity::Error));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let analyzer = {
            let queue = queue.clone();
            let counters = counters.clone();
            let emitter = emitter.clone();
            let stop_flag = stop_flag.clone();
            thread::spawn(move || run_analyzer(queue, counters, emitter, stop_flag))
        };

        // Give the analyzer a moment to start draining, then request shutdown.
        thread::sleep(Duration::from_millis(50));
        stop_flag.store(true, Ordering::SeqCst);
        queue.notify_shutdown();

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(join_with_deadline(analyzer, deadline));
        assert_eq!(queue.depth(), 0);
        // All 14-byte all-zero frames still count as Ethernet attempts even
        // though EtherType 0x0000 is unsupported, so only ETH bumps happen.
        assert_eq!(counters.get(crate::stats::Tag::Eth), 500);
    }
}
