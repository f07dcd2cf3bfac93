//! Periodic refresh on a dedicated worker thread.
//!
//! [`start`] runs an initial cycle, then one every `interval`. Cycles are
//! serialized on the worker: manual triggers that arrive while a cycle runs
//! are coalesced into a single follow-up cycle. [`RefreshHandle::stop`]
//! cancels the in-flight cycle at its next phase boundary and hands the
//! dashboard back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};

use crate::api::Backend;
use crate::controller::{CancelToken, Dashboard, Trigger};
use crate::display::DisplayTarget;

/// Default refresh period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

enum Command {
    Refresh,
    Stop,
}

/// Control handle for a running schedule.
pub struct RefreshHandle<B, D> {
    commands: Sender<Command>,
    cancel: CancelToken,
    completed: Arc<AtomicU64>,
    worker: Option<JoinHandle<Dashboard<B, D>>>,
}

/// Start refreshing `dashboard` every `interval`, beginning immediately.
pub fn start<B, D>(dashboard: Dashboard<B, D>, interval: Duration) -> RefreshHandle<B, D>
where
    B: Backend + 'static,
    D: DisplayTarget + 'static,
{
    let (commands, receiver) = mpsc::channel();
    let cancel = CancelToken::new();
    let completed = Arc::new(AtomicU64::new(0));

    let worker = {
        let cancel = cancel.clone();
        let completed = Arc::clone(&completed);
        thread::Builder::new()
            .name("segdash-refresh".to_string())
            .spawn(move || run_worker(dashboard, interval, receiver, cancel, completed))
    };

    let worker = match worker {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("[segdash] failed to spawn refresh worker: {e}");
            None
        }
    };

    RefreshHandle {
        commands,
        cancel,
        completed,
        worker,
    }
}

/// Stop a running schedule. See [`RefreshHandle::stop`].
pub fn stop<B, D>(handle: RefreshHandle<B, D>) -> Result<Dashboard<B, D>> {
    handle.stop()
}

impl<B, D> RefreshHandle<B, D> {
    /// Request an immediate cycle. Returns `false` if the worker is gone.
    pub fn trigger(&self) -> bool {
        self.is_running() && self.commands.send(Command::Refresh).is_ok()
    }

    /// Number of cycles finished so far, cancelled ones included.
    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Block until at least `count` cycles have finished or `timeout` elapses.
    pub fn wait_for_cycles(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.completed_cycles() < count {
            if Instant::now() >= deadline || !self.is_running() {
                return self.completed_cycles() >= count;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Cancel the schedule and the in-flight cycle, join the worker and
    /// return the dashboard.
    pub fn stop(mut self) -> Result<Dashboard<B, D>> {
        self.cancel.cancel();
        let _ = self.commands.send(Command::Stop);
        self.join_worker()
    }

    /// Wait for the worker without stopping it.
    pub fn join(mut self) -> Result<Dashboard<B, D>> {
        self.join_worker()
    }

    fn join_worker(&mut self) -> Result<Dashboard<B, D>> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("refresh worker is not running"))?;
        worker
            .join()
            .map_err(|_| anyhow!("refresh worker panicked"))
    }
}

impl<B, D> Drop for RefreshHandle<B, D> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
            let _ = self.commands.send(Command::Stop);
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn run_worker<B, D>(
    mut dashboard: Dashboard<B, D>,
    interval: Duration,
    commands: Receiver<Command>,
    cancel: CancelToken,
    completed: Arc<AtomicU64>,
) -> Dashboard<B, D>
where
    B: Backend,
    D: DisplayTarget,
{
    let mut trigger = Trigger::Startup;
    let mut next_tick = Instant::now() + interval;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        dashboard.run_cycle(trigger, &cancel);
        completed.fetch_add(1, Ordering::SeqCst);

        let wait = next_tick.saturating_duration_since(Instant::now());
        match commands.recv_timeout(wait) {
            Ok(Command::Refresh) => {
                if drain_pending(&commands) {
                    break;
                }
                trigger = Trigger::Manual;
            }
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if drain_pending(&commands) {
                    break;
                }
                trigger = Trigger::Timer;
                let now = Instant::now();
                next_tick += interval;
                // Missed ticks collapse into the one about to run.
                if next_tick <= now {
                    next_tick = now + interval;
                }
            }
        }
    }

    dashboard
}

/// Swallow queued refresh requests. Returns `true` if a stop was queued.
fn drain_pending(commands: &Receiver<Command>) -> bool {
    while let Ok(command) = commands.try_recv() {
        if let Command::Stop = command {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::api::FetchError;
    use crate::display::{SharedDisplay, Slot};
    use crate::model::{ChartKind, ChartPayload, SegmentDetails};

    /// Serves a one-segment mapping whose size grows with every call.
    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl Backend for CountingBackend {
        fn segment_details(&self) -> Result<SegmentDetails, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let body = format!(
                r#"{{"1": {{"size": {n}, "percentage": 100.0,
                    "mean_values": {{"age": 30, "montant_consommation": 10}},
                    "offer": {{"reduction": 0.05, "services_additionnels": []}}}}}}"#
            );
            SegmentDetails::from_json(&body).map_err(|e| FetchError::malformed("details", e.to_string()))
        }

        fn chart(&self, _kind: ChartKind) -> Result<ChartPayload, FetchError> {
            Ok(ChartPayload {
                data: Vec::new(),
                layout: serde_json::Map::new(),
            })
        }
    }

    #[test]
    fn runs_initial_cycle_and_stops() {
        let display = SharedDisplay::new();
        let dashboard = Dashboard::new(CountingBackend::default(), display.clone());
        let handle = start(dashboard, Duration::from_secs(3600));

        assert!(handle.wait_for_cycles(1, Duration::from_secs(5)));
        let dashboard = handle.stop().unwrap();
        assert_eq!(dashboard.backend().calls.load(Ordering::SeqCst), 1);
        assert_eq!(display.snapshot().slot(Slot::TotalClients), Some("1"));
        assert!(!display.snapshot().loading);
    }

    #[test]
    fn trigger_runs_another_cycle_and_latest_wins() {
        let display = SharedDisplay::new();
        let dashboard = Dashboard::new(CountingBackend::default(), display.clone());
        let handle = start(dashboard, Duration::from_secs(3600));

        assert!(handle.wait_for_cycles(1, Duration::from_secs(5)));
        assert!(handle.trigger());
        assert!(handle.wait_for_cycles(2, Duration::from_secs(5)));

        stop(handle).unwrap();
        assert_eq!(display.snapshot().slot(Slot::TotalClients), Some("2"));
    }

    #[test]
    fn timer_fires_repeatedly() {
        let dashboard = Dashboard::new(CountingBackend::default(), SharedDisplay::new());
        let handle = start(dashboard, Duration::from_millis(20));
        assert!(handle.wait_for_cycles(3, Duration::from_secs(5)));
        handle.stop().unwrap();
    }

    #[test]
    fn drain_reports_queued_stop() {
        let (tx, rx) = mpsc::channel();
        tx.send(Command::Refresh).unwrap();
        tx.send(Command::Refresh).unwrap();
        assert!(!drain_pending(&rx));

        tx.send(Command::Refresh).unwrap();
        tx.send(Command::Stop).unwrap();
        assert!(drain_pending(&rx));
    }
}
