//! Background re-evaluation loop.
//!
//! Overdue status changes with nothing but the passage of time, so something
//! has to poll. Stopping the loop only stops future passes; gate state stays
//! with the service and a new monitor picks it up as is.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::service::TrackerService;

pub struct Monitor;

impl Monitor {
    /// Runs one pass immediately, then one per `interval` until stopped.
    pub fn spawn(service: Arc<TrackerService>, interval: Duration) -> Result<MonitorHandle> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker = thread::Builder::new()
            .name("cadence-monitor".into())
            .spawn(move || {
                tracing::info!(interval_secs = interval.as_secs(), "monitor started");
                let mut passes: u64 = 0;
                loop {
                    match service.evaluate() {
                        Ok(summary) => {
                            passes += 1;
                            if !summary.notified.is_empty() {
                                tracing::info!(
                                    notified = summary.notified.len(),
                                    overdue = summary.overdue,
                                    "overdue activities alerted"
                                );
                            }
                        }
                        Err(err) => tracing::warn!(error = %err, "evaluation pass failed"),
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::info!(passes, "monitor stopped");
                passes
            })
            .context("failed to spawn monitor thread")?;
        Ok(MonitorHandle {
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }
}

pub struct MonitorHandle {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<u64>>,
}

impl MonitorHandle {
    /// Signals the loop and waits for it. Returns the number of passes run.
    pub fn stop(mut self) -> Result<u64> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<u64> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| anyhow!("monitor thread panicked")),
            None => Ok(0),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::warn!(error = %err, "monitor did not shut down cleanly");
        }
    }
}
