use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::{
    aggregator::Aggregator,
    partition::partition,
    publisher::{Publisher, StepReport},
    record::Batch,
    registry::Registry,
};

/// Errors that could occur while starting the exporter.
#[derive(Debug, Error)]
pub enum StartError {
    /// The exporter was started outside of a Tokio runtime.
    #[error("no Tokio runtime available to drive the exporter")]
    NoRuntime,
}

/// Everything a single publish pass needs.
struct Pipeline {
    aggregator: Aggregator,
    publisher: Publisher,
    max_batch_size: NonZeroUsize,
}

impl Pipeline {
    fn prepare(&self) -> Vec<Batch> {
        if let Some(telemetry) = self.publisher.telemetry() {
            telemetry.track_step();
        }

        let records = self.aggregator.snapshot_all();
        let num_records = records.len();
        let batches = partition(records, self.max_batch_size);
        debug!(
            namespace = self.publisher.namespace(),
            num_records,
            num_batches = batches.len(),
            "Prepared step."
        );

        batches
    }

    async fn publish_once(&self) -> StepReport {
        self.publisher.publish_all(self.prepare()).await
    }
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// A step exporter.
///
/// Once started, the exporter wakes up just after every step boundary, flattens every meter in its [`Registry`] into
/// records, partitions them into batches, and publishes each batch on its own task. Batches from one step may still be
/// in flight when the next step fires.
///
/// Exporters are created with [`StepExporterBuilder`][crate::StepExporterBuilder].
pub struct StepExporter {
    registry: Arc<Registry>,
    pipeline: Arc<Pipeline>,
    enabled: bool,
    running: Mutex<Option<Running>>,
}

impl StepExporter {
    pub(crate) fn new(
        registry: Arc<Registry>,
        aggregator: Aggregator,
        publisher: Publisher,
        max_batch_size: NonZeroUsize,
        enabled: bool,
    ) -> Self {
        StepExporter {
            registry,
            pipeline: Arc::new(Pipeline { aggregator, publisher, max_batch_size }),
            enabled,
            running: Mutex::new(None),
        }
    }

    /// Registry the exporter publishes from.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Step duration.
    pub fn step(&self) -> Duration {
        self.registry.step_clock().step()
    }

    /// Namespace every batch is published under.
    pub fn namespace(&self) -> &str {
        self.pipeline.publisher.namespace()
    }

    /// Returns `true` if the exporter is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` if the background step loop is running.
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Starts publishing in the background.
    ///
    /// The first step fires just after the next step boundary. Calling `start` on a disabled exporter, or on one that
    /// is already running, does nothing.
    ///
    /// # Errors
    ///
    /// If the exporter is not started from within a Tokio runtime, an error will be returned.
    pub fn start(&self) -> Result<(), StartError> {
        if !self.enabled {
            info!(namespace = self.namespace(), "Exporter disabled, not publishing metrics.");
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|_| StartError::NoRuntime)?;

        let mut running = self.running.lock();
        if running.is_some() {
            warn!(namespace = self.namespace(), "Exporter already running.");
            return Ok(());
        }

        let step = self.step();
        let initial_delay = self.registry.step_clock().initial_delay();
        info!(namespace = self.namespace(), ?initial_delay, "Publishing metrics every {:?}.", step);

        let token = CancellationToken::new();
        let pipeline = Arc::clone(&self.pipeline);
        let handle = runtime.spawn(run(pipeline, token.clone(), initial_delay, step));
        *running = Some(Running { token, handle });

        Ok(())
    }

    /// Stops publishing.
    ///
    /// No further steps fire once this is called. Batches already handed to the transport are not aborted: this waits
    /// for all of them to finish.
    pub async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(Running { token, handle }) = running else {
            return;
        };

        token.cancel();
        if let Err(e) = handle.await {
            error!(
                error = %e,
                namespace = self.namespace(),
                "Step loop did not shut down cleanly."
            );
        }

        info!(namespace = self.namespace(), "Stopped publishing metrics.");
    }

    /// Stops publishing, then publishes one final step.
    ///
    /// Returns the report for the final step, or `None` if the exporter is disabled.
    pub async fn close(&self) -> Option<StepReport> {
        self.stop().await;

        if !self.enabled {
            return None;
        }

        Some(self.pipeline.publish_once().await)
    }

    /// Publishes one step immediately, outside of the regular schedule, and waits for every batch to finish.
    ///
    /// This works whether or not the exporter is running or enabled.
    pub async fn publish_now(&self) -> StepReport {
        self.pipeline.publish_once().await
    }
}

impl Drop for StepExporter {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.token.cancel();
        }
    }
}

async fn run(
    pipeline: Arc<Pipeline>,
    token: CancellationToken,
    initial_delay: Duration,
    step: Duration,
) {
    let tracker = TaskTracker::new();

    let mut ticker = interval_at(Instant::now() + initial_delay, step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let batches = pipeline.prepare();
                if batches.is_empty() {
                    continue;
                }

                // The transport is only ever called from batch tasks, never from the loop.
                let publisher = pipeline.publisher.clone();
                tracker.spawn(async move {
                    let report = publisher.publish_all(batches).await;
                    debug!(
                        namespace = publisher.namespace(),
                        batches_succeeded = report.batches_succeeded,
                        batches_failed = report.batches_failed,
                        "Published step."
                    );
                });
            }
        }
    }

    tracker.close();
    debug!(
        namespace = pipeline.publisher.namespace(),
        in_flight_steps = tracker.len(),
        "Waiting for in-flight batches."
    );
    tracker.wait().await;
}
