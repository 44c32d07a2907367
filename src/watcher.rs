//! Cancellable periodic scanning.
//!
//! The watcher runs [`Integrator::scan_once`] on a blocking thread, then waits
//! `interval` from the end of that pass before the next one (no fixed-rate
//! clock, drift under long passes is accepted). A failed pass waits the
//! shorter `retry` instead. The wait ends early on [`Watcher::trigger`] or on
//! cancellation; a pass already in flight always runs to completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::integrator::Integrator;
use crate::progress::IntegrationReporter;
use crate::scan;

/// Timing of the background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSchedule {
    pub interval: Duration,
    pub retry: Duration,
}

impl WatchSchedule {
    pub fn from_config(config: &WatchConfig) -> Self {
        Self {
            interval: config.interval(),
            retry: config.retry(),
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Watcher {
    integrator: Arc<Integrator>,
    schedule: WatchSchedule,
    reporter: Arc<dyn IntegrationReporter>,
    trigger: Arc<Notify>,
    passes: watch::Sender<u64>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("schedule", &self.schedule)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Watcher {
    pub fn new(
        integrator: Arc<Integrator>,
        schedule: WatchSchedule,
        reporter: Box<dyn IntegrationReporter>,
    ) -> Self {
        let (passes, _) = watch::channel(0);
        Self {
            integrator,
            schedule,
            reporter: Arc::from(reporter),
            trigger: Arc::new(Notify::new()),
            passes,
            running: Mutex::new(None),
        }
    }

    pub fn integrator(&self) -> &Arc<Integrator> {
        &self.integrator
    }

    /// Spawns the background loop on the current Tokio runtime.
    ///
    /// Returns `Ok(false)` without spawning anything if the loop is already
    /// running. A missing or non-directory root is fatal and reported here,
    /// before any task exists.
    pub fn start(&self) -> Result<bool, WatchError> {
        let mut running = self.lock_running();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Ok(false);
        }

        scan::check_root(self.integrator.watched_root())?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.integrator.clone(),
            self.schedule,
            self.reporter.clone(),
            self.trigger.clone(),
            self.passes.clone(),
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        Ok(true)
    }

    /// Stops the loop, waits for any in-flight pass, then flushes state.
    /// Calling it when nothing is running only flushes.
    pub async fn stop(&self) -> Result<(), WatchError> {
        let running = self.lock_running().take();
        if let Some(Running { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "watcher task ended abnormally");
            }
        }

        let integrator = self.integrator.clone();
        match tokio::task::spawn_blocking(move || integrator.persist()).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "final persist panicked");
                Ok(())
            }
        }
    }

    /// Requests a pass now instead of waiting out the current interval.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Counter of completed passes (successful or not).
    pub fn passes(&self) -> watch::Receiver<u64> {
        self.passes.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.lock_running()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|p| p.into_inner())
    }
}

async fn run_loop(
    integrator: Arc<Integrator>,
    schedule: WatchSchedule,
    reporter: Arc<dyn IntegrationReporter>,
    trigger: Arc<Notify>,
    passes: watch::Sender<u64>,
    cancel: CancellationToken,
) {
    info!(
        root = %integrator.watched_root().display(),
        interval_secs = schedule.interval.as_secs(),
        "watcher started"
    );

    while !cancel.is_cancelled() {
        let pass = integrator.clone();
        let delay = match tokio::task::spawn_blocking(move || pass.scan_once()).await {
            Ok(Ok(result)) => {
                reporter.report(&result);
                schedule.interval
            }
            Ok(Err(e)) => {
                warn!(error = %e, retry_secs = schedule.retry.as_secs(), "scan pass failed");
                schedule.retry
            }
            Err(e) => {
                error!(error = %e, "scan pass panicked");
                schedule.retry
            }
        };
        passes.send_modify(|n| *n += 1);

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
            _ = trigger.notified() => {}
        }
    }

    info!("watcher stopped");
}
