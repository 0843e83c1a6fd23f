//! Fixed-interval notification polling as a cancellable background task.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::models::Notification;
use crate::api::{ApiClient, GatewayError, Instance};
use crate::config::Settings;

#[derive(Debug)]
pub enum PollEvent {
    Received(Notification),
    /// Too many consecutive failures; the poller has stopped for good.
    Failed(GatewayError),
}

/// Stops the poller when dropped.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Poll now instead of waiting for the next tick. Coalesces while a poll is running.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Debug, Clone)]
pub struct Poller {
    client: ApiClient,
    instance: Instance,
    interval: Duration,
    max_failures: u32,
}

impl Poller {
    pub fn new(client: ApiClient, instance: Instance, settings: &Settings) -> Self {
        Self {
            client,
            instance,
            interval: settings.poll_interval(),
            max_failures: settings.max_poll_failures,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> (PollHandle, mpsc::UnboundedReceiver<PollEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(tx, cancel.clone(), refresh.clone()));
        (
            PollHandle {
                cancel,
                refresh,
                task,
            },
            rx,
        )
    }

    // Polls never overlap: a tick that comes due mid-request is skipped.
    async fn run(self, tx: mpsc::UnboundedSender<PollEvent>, cancel: CancellationToken, refresh: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let max_failures = self.max_failures.max(1);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = refresh.notified() => ticker.reset(),
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                r = self.client.poll_next_notification(&self.instance) => r,
            };

            match result {
                Ok(Some(notification)) => {
                    failures = 0;
                    if tx.send(PollEvent::Received(notification)).is_err() {
                        break;
                    }
                }
                Ok(None) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!("poll failed ({failures}/{max_failures}): {e}");
                    if failures >= max_failures {
                        let _ = tx.send(PollEvent::Failed(e));
                        break;
                    }
                }
            }
        }
        debug!("poller for instance {} stopped", self.instance.id);
    }
}
