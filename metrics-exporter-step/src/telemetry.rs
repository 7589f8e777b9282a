use metrics::{counter, Counter};

/// Exporter telemetry.
///
/// `Telemetry` collects information about the exporter's own behavior: how many steps were published, and how many
/// batches and records were sent or dropped. It is recorded through the `metrics` facade, so it ends up wherever the
/// application's global recorder sends it.
///
/// All counters are under the `metrics.step.exporter` namespace and are labelled with the exporter's namespace.
#[derive(Clone)]
pub struct Telemetry {
    steps: Counter,
    batches_sent: Counter,
    batches_failed: Counter,
    records_sent: Counter,
    records_dropped: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance, registering its counters with the current recorder.
    pub fn new(namespace: &str) -> Self {
        let labels = telemetry_labels!(namespace);

        Self {
            steps: counter!("metrics.step.exporter.steps", labels.iter()),
            batches_sent: counter!("metrics.step.exporter.batches_sent", labels.iter()),
            batches_failed: counter!("metrics.step.exporter.batches_failed", labels.iter()),
            records_sent: counter!("metrics.step.exporter.records_sent", labels.iter()),
            records_dropped: counter!("metrics.step.exporter.records_dropped", labels.iter()),
        }
    }

    /// Tracks the start of a publish pass.
    pub fn track_step(&self) {
        self.steps.increment(1);
    }

    /// Tracks a batch the transport accepted.
    pub fn track_batch_sent(&self, records: usize) {
        self.batches_sent.increment(1);
        self.records_sent.increment(records as u64);
    }

    /// Tracks a batch the transport failed to send.
    pub fn track_batch_failed(&self, records: usize) {
        self.batches_failed.increment(1);
        self.records_dropped.increment(records as u64);
    }

    /// Tracks records from batches whose publish task never produced an outcome.
    pub fn track_records_lost(&self, records: usize) {
        self.records_dropped.increment(records as u64);
    }
}

macro_rules! _telemetry_labels {
    ($namespace:expr) => {
        [
            ::metrics::Label::from_static_parts("exporter_version", env!("CARGO_PKG_VERSION")),
            ::metrics::Label::new("namespace", $namespace.to_string()),
        ]
    };
}

pub(crate) use _telemetry_labels as telemetry_labels;
