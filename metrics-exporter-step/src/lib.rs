//! A step-windowed exporter for publishing meter snapshots to push-based backends in batches.
//!
//! # Usage
//!
//! Using the exporter is straightforward:
//!
//! ```no_run
//! # use metrics_exporter_step::{Id, LogTransport, MeterType, StepExporterBuilder};
//! # use std::time::Duration;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! // First, create a builder.
//! //
//! // The builder can configure the step duration, the maximum number of records per batch, the naming convention
//! // applied to records, and more. A namespace is always required.
//! let builder = StepExporterBuilder::default()
//!     .with_namespace("checkout")
//!     .with_step(Duration::from_secs(30));
//!
//! // Building the exporter requires a transport, which is what actually talks to the backend.
//! let exporter = builder.build(LogTransport::default()).expect("failed to build exporter");
//!
//! // Meters are registered through the exporter's registry, and can be recorded to from anywhere.
//! let requests = exporter.registry().counter(Id::new("http.requests", MeterType::Counter)).expect("kind mismatch");
//! requests.increment();
//!
//! // Starting the exporter spawns a background task that publishes once per step.
//! exporter.start().expect("no runtime");
//!
//! // Closing the exporter stops the background task and publishes a final step.
//! exporter.close().await;
//! # }
//! ```
//!
//! # How it works
//!
//! ## Step windows
//!
//! Time is divided into fixed-duration steps aligned to the Unix epoch. Instruments accumulate into the current step
//! and report the last completed one, so every snapshot taken during a step sees the same values, no matter how many
//! times it is read.
//!
//! ## Flattening
//!
//! Just after each step boundary, every meter in the registry is flattened into [`Record`]s: a timer becomes `sum`,
//! `count`, `avg` and `max` records, a counter becomes a single record, and so on. Records whose value is NaN are
//! dropped. All records from one step share a timestamp, and timestamps never go backwards between steps.
//!
//! ## Batching
//!
//! Records are split, in order, into batches no larger than the configured batch size, matching the per-request limit
//! of the backend.
//!
//! ## Publishing
//!
//! Each batch is handed to the [`Transport`] on its own task. A batch that fails is logged and dropped: it never affects
//! the other batches of the step, and is never retried.
//!
//! ## Telemetry
//!
//! The exporter records counters about its own operation through the `metrics` facade, under the
//! `metrics.step.exporter` namespace: steps run, and batches and records sent or dropped.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod aggregator;
pub use self::aggregator::Aggregator;

mod builder;
pub use self::builder::{BuildError, StepExporterBuilder};

mod clock;
pub use self::clock::{Clock, MockClock, StepClock, SystemClock};

mod config;
pub use self::config::StepConfig;

mod id;
pub use self::id::{Id, MeterType, Tag};

pub mod instruments;

mod meter;
pub use self::meter::{Measurement, Meter, Snapshot, Statistic};

pub mod naming;
pub use self::naming::NamingConvention;

mod partition;
pub use self::partition::partition;

mod publisher;
pub use self::publisher::{PublishOutcome, Publisher, StepReport};

mod record;
pub use self::record::{Batch, Record};

mod registry;
pub use self::registry::{MeterHandle, Registry, RegistryError};

mod scheduler;
pub use self::scheduler::{StartError, StepExporter};

mod telemetry;
pub use self::telemetry::Telemetry;

mod transport;
pub use self::transport::{LogTransport, Transport, TransportError, TransportFuture};

mod unit;
pub use self::unit::{StandardUnit, TimeUnit};
