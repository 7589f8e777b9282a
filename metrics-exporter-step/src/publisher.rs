use std::{future::Future, sync::Arc};

use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::{
    record::Batch,
    telemetry::Telemetry,
    transport::{Transport, TransportError},
};

/// Result of a single batch publish.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The transport accepted the batch.
    Succeeded {
        /// Number of records in the batch.
        records: usize,
    },

    /// The transport failed to send the batch.
    ///
    /// The batch is dropped: it is not retried within this step or any later one.
    Failed {
        /// Number of records in the batch.
        records: usize,

        /// Error reported by the transport.
        error: TransportError,
    },
}

impl PublishOutcome {
    /// Returns `true` if the batch was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Succeeded { .. })
    }

    /// Number of records in the batch.
    pub fn records(&self) -> usize {
        match self {
            PublishOutcome::Succeeded { records }
            | PublishOutcome::Failed { records, .. } => *records,
        }
    }
}

/// Summary of every batch published in a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Batches the transport accepted.
    pub batches_succeeded: usize,

    /// Batches that failed, including any whose publish task panicked.
    pub batches_failed: usize,

    /// Records in accepted batches.
    pub records_published: usize,

    /// Records in failed batches.
    pub records_dropped: usize,
}

impl StepReport {
    /// Total number of batches attempted.
    pub fn batches(&self) -> usize {
        self.batches_succeeded + self.batches_failed
    }

    fn track(&mut self, outcome: &PublishOutcome) {
        match outcome {
            PublishOutcome::Succeeded { records } => {
                self.batches_succeeded += 1;
                self.records_published += records;
            }
            PublishOutcome::Failed { records, .. } => {
                self.batches_failed += 1;
                self.records_dropped += records;
            }
        }
    }
}

/// Publishes batches through a [`Transport`], isolating failures per batch.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    namespace: Arc<str>,
    telemetry: Option<Telemetry>,
}

impl Publisher {
    /// Creates a new `Publisher`.
    pub fn new(
        transport: Arc<dyn Transport>,
        namespace: impl Into<Arc<str>>,
        telemetry: Option<Telemetry>,
    ) -> Self {
        Publisher { transport, namespace: namespace.into(), telemetry }
    }

    /// Namespace every batch is published under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_ref()
    }

    /// Publishes a single batch.
    ///
    /// The transport is not called until the returned future is first polled, so the whole publish, including any
    /// synchronous work the transport does, runs wherever the future is driven. The future owns everything it needs,
    /// so it can be spawned onto its own task. Transport errors are logged and reported in the outcome; they are never
    /// propagated.
    pub fn publish(&self, batch: Batch) -> impl Future<Output = PublishOutcome> + Send + 'static {
        let records = batch.len();
        let transport = Arc::clone(&self.transport);
        let namespace = Arc::clone(&self.namespace);
        let telemetry = self.telemetry.clone();

        async move {
            match transport.send_batch(&namespace, batch).await {
                Ok(()) => {
                    debug!(namespace = &*namespace, records, "Published batch.");
                    if let Some(telemetry) = &telemetry {
                        telemetry.track_batch_sent(records);
                    }
                    PublishOutcome::Succeeded { records }
                }
                Err(e) => {
                    error!(
                        error = %e,
                        namespace = &*namespace,
                        records,
                        "Failed to publish batch."
                    );
                    if let Some(telemetry) = &telemetry {
                        telemetry.track_batch_failed(records);
                    }
                    PublishOutcome::Failed { records, error: e }
                }
            }
        }
    }

    /// Publishes every batch concurrently and waits for all of them to finish.
    ///
    /// Each batch is published on its own task. A batch whose task panics, whether inside the transport call or in the
    /// future it returned, is counted as failed; the panic does not escape.
    pub async fn publish_all(&self, batches: Vec<Batch>) -> StepReport {
        let mut report = StepReport::default();
        let mut tasks = JoinSet::new();
        let total_records: usize = batches.iter().map(Batch::len).sum();

        for batch in batches {
            tasks.spawn(self.publish(batch));
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(outcome) => report.track(&outcome),
                Err(e) => {
                    error!(
                        error = %e,
                        namespace = self.namespace(),
                        "Batch publish task did not complete."
                    );
                    report.batches_failed += 1;
                    if let Some(telemetry) = &self.telemetry {
                        telemetry.track_batch_failed(0);
                    }
                }
            }
        }

        // Records in batches whose task never produced an outcome.
        let lost = total_records - report.records_published - report.records_dropped;
        if lost > 0 {
            report.records_dropped += lost;
            if let Some(telemetry) = &self.telemetry {
                telemetry.track_records_lost(lost);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::{
        num::NonZeroUsize,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    use super::{PublishOutcome, Publisher, StepReport};
    use crate::{
        partition::partition,
        record::{Batch, Record},
        transport::{Transport, TransportError, TransportFuture},
        unit::StandardUnit,
    };

    fn batches(count: usize, size: usize) -> Vec<Batch> {
        let records = (0..count * size)
            .map(|i| {
                Record::new(format!("m.{i}"), StandardUnit::None, 0, i as f64, Vec::new()).unwrap()
            })
            .collect();
        partition(records, NonZeroUsize::new(size).unwrap())
    }

    /// Fails any batch whose first record has the given name.
    struct FailOn {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl Transport for FailOn {
        fn send_batch(&self, _: &str, batch: Batch) -> TransportFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = batch.records()[0].name() == self.name;
            Box::pin(async move {
                if fail {
                    Err(TransportError::Rejected { reason: "nope".into() })
                } else {
                    Ok(())
                }
            })
        }
    }

    struct Panics;

    impl Transport for Panics {
        fn send_batch(&self, _: &str, _: Batch) -> TransportFuture {
            Box::pin(async { panic!("transport blew up") })
        }
    }

    /// Panics before it ever returns a future.
    struct PanicsEagerly;

    impl Transport for PanicsEagerly {
        fn send_batch(&self, _: &str, _: Batch) -> TransportFuture {
            panic!("encoder blew up")
        }
    }

    /// Blocks the calling thread for a while before returning, like an expensive encoder would.
    struct SlowEncoder {
        delay: Duration,
    }

    impl Transport for SlowEncoder {
        fn send_batch(&self, _: &str, _: Batch) -> TransportFuture {
            std::thread::sleep(self.delay);
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn single_publish_outcomes() {
        let transport = Arc::new(FailOn { name: "m.0", calls: AtomicUsize::new(0) });
        let publisher = Publisher::new(transport.clone(), "app", None);

        let mut batches = batches(2, 3).into_iter();
        let failed = publisher.publish(batches.next().unwrap()).await;
        assert!(matches!(
            failed,
            PublishOutcome::Failed { records: 3, error: TransportError::Rejected { .. } }
        ));

        let ok = publisher.publish(batches.next().unwrap()).await;
        assert!(ok.is_success());
        assert_eq!(ok.records(), 3);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let transport = Arc::new(FailOn { name: "m.20", calls: AtomicUsize::new(0) });
        let publisher = Publisher::new(transport.clone(), "app", None);

        let report = publisher.publish_all(batches(5, 10)).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            report,
            StepReport {
                batches_succeeded: 4,
                batches_failed: 1,
                records_published: 40,
                records_dropped: 10
            }
        );
    }

    #[tokio::test]
    async fn panicking_transport_counts_as_failure() {
        let publisher = Publisher::new(Arc::new(Panics), "app", None);

        let report = publisher.publish_all(batches(3, 2)).await;

        assert_eq!(report.batches(), 3);
        assert_eq!(report.batches_failed, 3);
        assert_eq!(report.records_dropped, 6);
    }

    #[tokio::test]
    async fn transport_is_not_called_until_polled() {
        let transport = Arc::new(FailOn { name: "", calls: AtomicUsize::new(0) });
        let publisher = Publisher::new(transport.clone(), "app", None);

        let publish = publisher.publish(batches(1, 1).remove(0));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

        assert!(publish.await.is_success());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eager_transport_panic_counts_as_failure() {
        let publisher = Publisher::new(Arc::new(PanicsEagerly), "app", None);

        let report = publisher.publish_all(batches(2, 4)).await;

        assert_eq!(
            report,
            StepReport {
                batches_succeeded: 0,
                batches_failed: 2,
                records_published: 0,
                records_dropped: 8
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn slow_transport_calls_run_concurrently() {
        let delay = Duration::from_millis(200);
        let publisher = Publisher::new(Arc::new(SlowEncoder { delay }), "app", None);

        let started = Instant::now();
        let report = publisher.publish_all(batches(4, 1)).await;
        let elapsed = started.elapsed();

        assert_eq!(report.batches_succeeded, 4);
        // Back to back, four calls would take at least 800ms.
        assert!(elapsed < delay * 3, "took {elapsed:?}");
    }

    #[tokio::test]
    async fn no_batches_no_calls() {
        let transport = Arc::new(FailOn { name: "", calls: AtomicUsize::new(0) });
        let publisher = Publisher::new(transport.clone(), "app", None);

        assert_eq!(publisher.publish_all(Vec::new()).await, StepReport::default());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
