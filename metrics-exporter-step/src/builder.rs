use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    aggregator::Aggregator,
    clock::{Clock, StepClock, SystemClock},
    config::StepConfig,
    naming::{Identity, NamingConvention},
    publisher::Publisher,
    registry::Registry,
    scheduler::StepExporter,
    telemetry::Telemetry,
    transport::Transport,
    unit::TimeUnit,
};

pub(crate) const DEFAULT_STEP: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_BATCH_SIZE: usize = 20;

/// Errors that could occur while building a step exporter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The maximum batch size was zero.
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    /// No namespace was configured, or it was blank.
    #[error("a non-blank namespace is required")]
    MissingNamespace,

    /// The step was shorter than one millisecond.
    #[error("step must be at least 1ms, got {0:?}")]
    InvalidStep(Duration),
}

/// Builder for a step exporter.
pub struct StepExporterBuilder {
    step: Duration,
    batch_size: usize,
    namespace: Option<String>,
    enabled: bool,
    base_time_unit: TimeUnit,
    naming: Arc<dyn NamingConvention>,
    clock: Arc<dyn Clock>,
    telemetry: bool,
}

impl StepExporterBuilder {
    /// Creates a builder from a deserialized configuration.
    ///
    /// Settings not covered by [`StepConfig`] keep their defaults and can still be changed afterwards.
    #[must_use]
    pub fn from_config(config: StepConfig) -> Self {
        let builder = StepExporterBuilder::default()
            .with_step(config.step)
            .with_batch_size(config.batch_size)
            .with_enabled(config.enabled)
            .with_base_time_unit(config.base_time_unit);

        match config.namespace {
            Some(namespace) => builder.with_namespace(namespace),
            None => builder,
        }
    }

    /// Sets the step duration.
    ///
    /// Every step, the exporter publishes whatever was recorded during the previous step. Steps are aligned to the
    /// Unix epoch, so exporters in different processes with the same step publish at roughly the same time.
    ///
    /// Defaults to 60 seconds.
    #[must_use]
    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Sets the maximum number of records sent to the transport in a single batch.
    ///
    /// This should match the per-request limit of the backend.
    ///
    /// Defaults to 20.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the namespace batches are published under.
    ///
    /// This is required.
    #[must_use]
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets whether or not the exporter publishes at all.
    ///
    /// A disabled exporter still has a working registry, so instrumented code does not need to change, but starting it
    /// does nothing.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the time unit durations are reported in.
    ///
    /// Defaults to milliseconds.
    #[must_use]
    pub fn with_base_time_unit(mut self, unit: TimeUnit) -> Self {
        self.base_time_unit = unit;
        self
    }

    /// Sets the naming convention applied to record names and tags.
    ///
    /// Defaults to [`Identity`].
    #[must_use]
    pub fn with_naming_convention<N>(mut self, naming: N) -> Self
    where
        N: NamingConvention + 'static,
    {
        self.naming = Arc::new(naming);
        self
    }

    /// Sets the clock used for step boundaries and record timestamps.
    ///
    /// Defaults to [`SystemClock`].
    #[must_use]
    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets whether or not to enable telemetry for the exporter.
    ///
    /// When enabled, the exporter records counters about its own operation, such as the number of steps run and how
    /// many batches and records were sent or dropped, through the global `metrics` recorder.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the exporter.
    ///
    /// The exporter is returned stopped. Call [`StepExporter::start`] to begin publishing.
    ///
    /// # Errors
    ///
    /// If the batch size is zero, the step is shorter than one millisecond, or no non-blank namespace was set, an
    /// error will be returned.
    pub fn build<T>(self, transport: T) -> Result<StepExporter, BuildError>
    where
        T: Transport,
    {
        let max_batch_size =
            NonZeroUsize::new(self.batch_size).ok_or(BuildError::InvalidBatchSize)?;

        if self.step < Duration::from_millis(1) {
            return Err(BuildError::InvalidStep(self.step));
        }

        let namespace = match self.namespace {
            Some(namespace) if !namespace.trim().is_empty() => namespace,
            _ => return Err(BuildError::MissingNamespace),
        };

        let registry = Arc::new(Registry::new(StepClock::new(self.clock, self.step)));
        let aggregator = Aggregator::new(Arc::clone(&registry), self.naming, self.base_time_unit);
        let telemetry = self.telemetry.then(|| Telemetry::new(&namespace));
        let publisher = Publisher::new(Arc::new(transport), namespace, telemetry);

        Ok(StepExporter::new(registry, aggregator, publisher, max_batch_size, self.enabled))
    }
}

impl Default for StepExporterBuilder {
    fn default() -> Self {
        StepExporterBuilder {
            step: DEFAULT_STEP,
            batch_size: DEFAULT_BATCH_SIZE,
            namespace: None,
            enabled: true,
            base_time_unit: TimeUnit::default(),
            naming: Arc::new(Identity),
            clock: Arc::new(SystemClock::new()),
            telemetry: true,
        }
    }
}
