use std::time::Duration;

use crate::{id::Id, unit::TimeUnit};

/// The kind of statistic a [`Measurement`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statistic {
    /// The sum of the amounts recorded.
    Total,

    /// The sum of the times recorded.
    TotalTime,

    /// The number of times a value was recorded.
    Count,

    /// The maximum amount recorded.
    Max,

    /// A point-in-time value.
    Value,

    /// An unknown statistic.
    Unknown,

    /// The number of currently active tasks.
    ActiveTasks,

    /// The duration of currently active tasks.
    Duration,
}

impl Statistic {
    /// Suffix appended to the meter name for records carrying this statistic.
    ///
    /// [`Statistic::Total`] and [`Statistic::TotalTime`] share the `total` suffix.
    pub const fn suffix(&self) -> &'static str {
        match self {
            Statistic::Total | Statistic::TotalTime => "total",
            Statistic::Count => "count",
            Statistic::Max => "max",
            Statistic::Value => "value",
            Statistic::Unknown => "unknown",
            Statistic::ActiveTasks => "active",
            Statistic::Duration => "duration",
        }
    }

    /// Value of the `statistic` tag used to tell records with the same suffix apart.
    pub const fn tag_value(&self) -> &'static str {
        match self {
            Statistic::Total => "total",
            Statistic::TotalTime => "totalTime",
            Statistic::Count => "count",
            Statistic::Max => "max",
            Statistic::Value => "value",
            Statistic::Unknown => "unknown",
            Statistic::ActiveTasks => "activeTasks",
            Statistic::Duration => "duration",
        }
    }
}

/// A single (statistic, value) pair read from a meter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    statistic: Statistic,
    value: f64,
}

impl Measurement {
    /// Creates a new `Measurement`.
    pub const fn new(statistic: Statistic, value: f64) -> Self {
        Measurement { statistic, value }
    }

    /// Statistic of this measurement.
    pub const fn statistic(&self) -> Statistic {
        self.statistic
    }

    /// Value of this measurement.
    pub const fn value(&self) -> f64 {
        self.value
    }
}

/// A read-only view of a meter's current state.
///
/// Each variant carries exactly the data the aggregator needs for the corresponding family of instruments. Meters that
/// don't fit one of the dedicated shapes report their raw [`Measurement`]s instead.
#[derive(Clone, Debug, PartialEq)]
pub enum Snapshot {
    /// A single value, as reported by counters and gauges.
    Value(f64),

    /// Timer statistics.
    Timer {
        /// Number of recorded events.
        count: u64,

        /// Total time of all recorded events.
        total: Duration,

        /// Longest recorded event.
        max: Duration,
    },

    /// Distribution summary statistics.
    Summary {
        /// Number of recorded amounts.
        count: u64,

        /// Sum of all recorded amounts.
        total: f64,

        /// Largest recorded amount.
        max: f64,
    },

    /// Function-backed timer statistics.
    ///
    /// There is no maximum: nothing beyond the count and total is derivable from a pair of functions.
    FunctionTimer {
        /// Number of events.
        count: f64,

        /// Total time of all events, expressed in `unit`.
        total: f64,

        /// Unit of `total`.
        unit: TimeUnit,
    },

    /// Function-backed counter statistics.
    FunctionCounter {
        /// Current count.
        count: f64,
    },

    /// Arbitrary measurements.
    Measurements(Vec<Measurement>),
}

impl Snapshot {
    /// Returns this snapshot as a flat list of measurements, with times expressed in `base_time_unit`.
    pub fn measurements(&self, base_time_unit: TimeUnit) -> Vec<Measurement> {
        match self {
            Snapshot::Value(value) => vec![Measurement::new(Statistic::Value, *value)],
            Snapshot::Timer { count, total, max } => vec![
                Measurement::new(Statistic::Count, *count as f64),
                Measurement::new(Statistic::TotalTime, base_time_unit.express(*total)),
                Measurement::new(Statistic::Max, base_time_unit.express(*max)),
            ],
            Snapshot::Summary { count, total, max } => vec![
                Measurement::new(Statistic::Count, *count as f64),
                Measurement::new(Statistic::Total, *total),
                Measurement::new(Statistic::Max, *max),
            ],
            Snapshot::FunctionTimer { count, total, unit } => vec![
                Measurement::new(Statistic::Count, *count),
                Measurement::new(Statistic::TotalTime, base_time_unit.convert(*total, *unit)),
            ],
            Snapshot::FunctionCounter { count } => vec![Measurement::new(Statistic::Count, *count)],
            Snapshot::Measurements(measurements) => measurements.clone(),
        }
    }
}

/// A named, tagged instrument whose state can be read.
///
/// Implementations must not block or perform I/O in [`snapshot`](Meter::snapshot): it is called from the publishing
/// task once per step, for every registered meter.
pub trait Meter: Send + Sync {
    /// Identity of this meter.
    fn id(&self) -> &Id;

    /// Reads the current state of this meter.
    fn snapshot(&self) -> Snapshot;
}
