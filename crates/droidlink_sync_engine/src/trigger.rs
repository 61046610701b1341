//! Sync trigger: hands sync requests to a single background worker.

use crate::engine::SyncRunner;
use crate::error::{SyncError, SyncResult};
use crate::state::{SyncCycleResult, SyncRequest, SyncStrategy};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Accepts sync requests without running them on the caller's thread.
pub trait SyncRequester: Send + Sync {
    /// Queues `request`.
    fn request(&self, request: SyncRequest) -> SyncResult<()>;
}

/// A bounded queue in front of one worker thread running sync cycles.
///
/// At most one cycle runs at a time. Requests arriving while the queue is
/// full are dropped and counted; the engine's own gates decide whether a
/// queued request does any work.
pub struct SyncTrigger {
    sender: Mutex<Option<SyncSender<SyncRequest>>>,
    subscribers: Arc<Mutex<Vec<Sender<SyncCycleResult>>>>,
    dropped: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncTrigger {
    /// Starts the worker with a queue of `capacity` pending requests.
    pub fn start(runner: Arc<dyn SyncRunner>, capacity: usize) -> SyncResult<Self> {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let subscribers: Arc<Mutex<Vec<Sender<SyncCycleResult>>>> = Arc::default();

        let worker_subscribers = subscribers.clone();
        let worker = std::thread::Builder::new()
            .name("droidlink-sync".into())
            .spawn(move || run_worker(runner, receiver, worker_subscribers))
            .map_err(|e| SyncError::transport_fatal(format!("failed to start sync worker: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            subscribers,
            dropped: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Fire-and-forget entry point: queues a sync and logs a rejection.
    pub fn sync(&self, account: &str, strategy: SyncStrategy, sync_token: Option<String>) {
        let request = SyncRequest {
            account: account.to_string(),
            strategy,
            sync_token,
        };
        if let Err(e) = self.request(request) {
            tracing::warn!(account, error = %e, "sync request rejected");
        }
    }

    /// Handles a push message from another device: a full sync carrying
    /// the broadcast token.
    pub fn on_push_message(&self, account: &str, sync_token: Option<String>) {
        tracing::debug!(account, token = ?sync_token, "push message received");
        self.sync(account, SyncStrategy::Full, sync_token);
    }

    /// Receives the result of every cycle the worker runs from now on.
    pub fn subscribe(&self) -> Receiver<SyncCycleResult> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of requests dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Stops accepting requests, runs the queued ones and joins the worker.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::error!("sync worker panicked");
            }
        }
    }
}

impl SyncRequester for SyncTrigger {
    fn request(&self, request: SyncRequest) -> SyncResult<()> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(SyncError::Stopped)?;
        match sender.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(strategy = ?request.strategy, "sync queue full, request dropped");
                Err(SyncError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(SyncError::Stopped),
        }
    }
}

impl Drop for SyncTrigger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    runner: Arc<dyn SyncRunner>,
    receiver: Receiver<SyncRequest>,
    subscribers: Arc<Mutex<Vec<Sender<SyncCycleResult>>>>,
) {
    while let Ok(request) = receiver.recv() {
        let result = runner.run(&request);
        subscribers
            .lock()
            .retain(|subscriber| subscriber.send(result.clone()).is_ok());
    }
    tracing::debug!("sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CycleOutcome;
    use std::sync::mpsc::RecvTimeoutError;
    use std::time::Duration;

    /// Blocks each cycle until released.
    struct GatedRunner {
        gate: Mutex<Receiver<()>>,
        runs: Mutex<Vec<SyncRequest>>,
    }

    impl SyncRunner for GatedRunner {
        fn run(&self, request: &SyncRequest) -> SyncCycleResult {
            let _ = self.gate.lock().recv();
            self.runs.lock().push(request.clone());
            let mut result = SyncCycleResult::new(request.strategy);
            result.outcome = CycleOutcome::Completed;
            result
        }
    }

    fn gated() -> (Arc<GatedRunner>, Sender<()>) {
        let (release, gate) = mpsc::channel();
        let runner = Arc::new(GatedRunner {
            gate: Mutex::new(gate),
            runs: Mutex::new(Vec::new()),
        });
        (runner, release)
    }

    #[test]
    fn runs_requests_in_order() {
        let (runner, release) = gated();
        let trigger = SyncTrigger::start(runner.clone(), 4).unwrap();
        let results = trigger.subscribe();

        trigger.sync("me", SyncStrategy::Light, None);
        trigger.on_push_message("me", Some("tok".into()));
        release.send(()).unwrap();
        release.send(()).unwrap();

        let first = results.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = results.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.strategy, SyncStrategy::Light);
        assert_eq!(second.strategy, SyncStrategy::Full);

        trigger.shutdown();
        let runs = runner.runs.lock();
        assert_eq!(runs[1].sync_token.as_deref(), Some("tok"));
    }

    #[test]
    fn full_queue_drops_requests() {
        let (runner, release) = gated();
        let trigger = SyncTrigger::start(runner.clone(), 1).unwrap();
        let results = trigger.subscribe();

        // The first request is taken by the worker, which blocks on the gate.
        trigger.request(SyncRequest::full("me")).unwrap();
        let mut queued = false;
        for _ in 0..100 {
            if trigger.request(SyncRequest::light("me")).is_ok() {
                queued = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(queued);
        assert!(matches!(
            trigger.request(SyncRequest::light("me")),
            Err(SyncError::QueueFull)
        ));
        assert!(trigger.dropped_count() >= 1);

        release.send(()).unwrap();
        release.send(()).unwrap();
        results.recv_timeout(Duration::from_secs(5)).unwrap();
        results.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            results.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Timeout)
        ));
        trigger.shutdown();
        assert_eq!(runner.runs.lock().len(), 2);
    }

    #[test]
    fn requests_after_shutdown_are_rejected() {
        let (runner, release) = gated();
        drop(release);
        let trigger = SyncTrigger::start(runner, 1).unwrap();
        trigger.shutdown();
        assert!(matches!(
            trigger.request(SyncRequest::full("me")),
            Err(SyncError::Stopped)
        ));
    }
}
