use std::time::Duration;

use serde::Deserialize;

use crate::{
    builder::{DEFAULT_BATCH_SIZE, DEFAULT_STEP},
    unit::TimeUnit,
};

/// Exporter settings that can be loaded from a configuration file.
///
/// Every field is optional when deserializing, falling back to the same defaults as [`StepExporterBuilder`]. The step
/// is written in human-readable form, such as `"30s"` or `"1m"`.
///
/// [`StepExporterBuilder`]: crate::StepExporterBuilder
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepConfig {
    /// Step duration.
    #[serde(with = "humantime_serde")]
    pub step: Duration,

    /// Maximum number of records per batch.
    pub batch_size: usize,

    /// Namespace batches are published under.
    pub namespace: Option<String>,

    /// Whether or not the exporter publishes at all.
    pub enabled: bool,

    /// Time unit durations are reported in.
    pub base_time_unit: TimeUnit,
}

impl Default for StepConfig {
    fn default() -> Self {
        StepConfig {
            step: DEFAULT_STEP,
            batch_size: DEFAULT_BATCH_SIZE,
            namespace: None,
            enabled: true,
            base_time_unit: TimeUnit::default(),
        }
    }
}
