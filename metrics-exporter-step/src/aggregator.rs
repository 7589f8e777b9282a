use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tracing::{debug, trace};

use crate::{
    id::{Id, Tag},
    meter::{Measurement, Snapshot},
    naming::NamingConvention,
    record::Record,
    registry::Registry,
    unit::{StandardUnit, TimeUnit},
};

const STATISTIC_TAG: &str = "statistic";

/// Flattens every registered meter into [`Record`]s.
pub struct Aggregator {
    registry: Arc<Registry>,
    naming: Arc<dyn NamingConvention>,
    base_time_unit: TimeUnit,
    last_timestamp: AtomicU64,
}

/// Records produced for a single meter, all sharing one timestamp.
struct MeterRecords<'a> {
    id: &'a Id,
    naming: &'a dyn NamingConvention,
    timestamp: u64,
    tags: Vec<Tag>,
    records: &'a mut Vec<Record>,
    dropped: usize,
}

impl MeterRecords<'_> {
    fn push(&mut self, suffix: Option<&str>, unit_hint: Option<&str>, value: f64) {
        self.push_with_tags(suffix, unit_hint, value, self.tags.clone());
    }

    fn push_with_tags(
        &mut self,
        suffix: Option<&str>,
        unit_hint: Option<&str>,
        value: f64,
        tags: Vec<Tag>,
    ) {
        let name = match suffix {
            Some(suffix) => self.naming.name(
                &format!("{}.{}", self.id.name(), suffix),
                self.id.meter_type(),
                self.id.base_unit(),
            ),
            None => self.naming.name(self.id.name(), self.id.meter_type(), self.id.base_unit()),
        };

        match Record::new(name, StandardUnit::from_hint(unit_hint), self.timestamp, value, tags) {
            Some(record) => self.records.push(record),
            None => self.dropped += 1,
        }
    }
}

fn mean(total: f64, count: f64) -> f64 {
    if count == 0.0 {
        0.0
    } else {
        total / count
    }
}

impl Aggregator {
    /// Creates a new `Aggregator` over the given registry.
    pub fn new(
        registry: Arc<Registry>,
        naming: Arc<dyn NamingConvention>,
        base_time_unit: TimeUnit,
    ) -> Self {
        Aggregator { registry, naming, base_time_unit, last_timestamp: AtomicU64::new(0) }
    }

    /// Captures the timestamp for a pass.
    ///
    /// Never goes backwards relative to a previous pass, even if the wall clock does.
    fn pass_timestamp(&self) -> u64 {
        let now = self.registry.step_clock().clock().wall_time();
        let previous = self.last_timestamp.fetch_max(now, Ordering::AcqRel);
        previous.max(now)
    }

    /// Produces the records for every meter currently in the registry.
    ///
    /// Records are returned in registry order, with the records of each meter kept together in a fixed order. All
    /// records share the same timestamp, captured once at the start of the pass. NaN values are dropped.
    pub fn snapshot_all(&self) -> Vec<Record> {
        let timestamp = self.pass_timestamp();
        let meters = self.registry.meters();

        let mut records = Vec::with_capacity(meters.len());
        let mut dropped = 0;
        for handle in &meters {
            let meter = handle.meter();
            let id = meter.id();
            let mut out = MeterRecords {
                id,
                naming: self.naming.as_ref(),
                timestamp,
                tags: self.convention_tags(id),
                records: &mut records,
                dropped: 0,
            };

            self.flatten(&mut out, meter.snapshot());

            if out.dropped > 0 {
                trace!(meter = %id, dropped = out.dropped, "Dropped NaN-valued records.");
            }
            dropped += out.dropped;
        }

        debug!(
            meters = meters.len(),
            records = records.len(),
            dropped,
            timestamp,
            "Aggregated meters."
        );

        records
    }

    fn convention_tags(&self, id: &Id) -> Vec<Tag> {
        id.tags()
            .iter()
            .map(|tag| Tag::new(self.naming.tag_key(tag.key()), self.naming.tag_value(tag.value())))
            .collect()
    }

    fn flatten(&self, out: &mut MeterRecords<'_>, snapshot: Snapshot) {
        let time_unit = Some(self.base_time_unit.as_str());
        match snapshot {
            Snapshot::Value(value) => out.push(None, None, value),
            Snapshot::Timer { count, total, max } => {
                let total = self.base_time_unit.express(total);
                let count = count as f64;
                out.push(Some("sum"), time_unit, total);
                out.push(Some("count"), Some("count"), count);
                out.push(Some("avg"), time_unit, mean(total, count));
                out.push(Some("max"), time_unit, self.base_time_unit.express(max));
            }
            Snapshot::Summary { count, total, max } => {
                let count = count as f64;
                out.push(Some("sum"), None, total);
                out.push(Some("count"), None, count);
                out.push(Some("avg"), None, mean(total, count));
                out.push(Some("max"), None, max);
            }
            Snapshot::FunctionTimer { count, total, unit } => {
                let total = self.base_time_unit.convert(total, unit);
                out.push(Some("count"), None, count);
                out.push(Some("avg"), None, mean(total, count));
            }
            Snapshot::FunctionCounter { count } => out.push(Some("count"), None, count),
            Snapshot::Measurements(measurements) => flatten_measurements(out, &measurements),
        }
    }
}

fn flatten_measurements(out: &mut MeterRecords<'_>, measurements: &[Measurement]) {
    for measurement in measurements {
        let suffix = measurement.statistic().suffix();
        let shared = measurements.iter().filter(|m| m.statistic().suffix() == suffix).count() > 1;
        if shared {
            let mut tags = out.tags.clone();
            tags.push(Tag::new(STATISTIC_TAG, measurement.statistic().tag_value()));
            out.push_with_tags(Some(suffix), None, measurement.value(), tags);
        } else {
            out.push(Some(suffix), None, measurement.value());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use approx::assert_relative_eq;

    use super::Aggregator;
    use crate::{
        clock::{MockClock, StepClock},
        id::{Id, MeterType, Tag},
        meter::{Measurement, Meter, Snapshot, Statistic},
        naming::{Identity, SnakeCase},
        record::Record,
        registry::Registry,
        unit::{StandardUnit, TimeUnit},
    };

    struct Fixed(Id, Snapshot);

    impl Meter for Fixed {
        fn id(&self) -> &Id {
            &self.0
        }

        fn snapshot(&self) -> Snapshot {
            self.1.clone()
        }
    }

    fn setup() -> (MockClock, Arc<Registry>, Aggregator) {
        let clock = MockClock::new(1_700_000_000_000);
        let step_clock = StepClock::new(Arc::new(clock.clone()), Duration::from_secs(60));
        let registry = Arc::new(Registry::new(step_clock));
        let aggregator =
            Aggregator::new(Arc::clone(&registry), Arc::new(Identity), TimeUnit::Milliseconds);
        (clock, registry, aggregator)
    }

    fn register(
        registry: &Registry,
        name: &'static str,
        meter_type: MeterType,
        snapshot: Snapshot,
    ) {
        registry.register(Arc::new(Fixed(Id::new(name, meter_type), snapshot))).unwrap();
    }

    fn summarize(records: &[Record]) -> Vec<(&str, StandardUnit, f64)> {
        records.iter().map(|r| (r.name(), r.unit(), r.value())).collect()
    }

    #[test]
    fn timer_yields_four_records() {
        let (_, registry, aggregator) = setup();
        register(
            &registry,
            "db.query",
            MeterType::Timer,
            Snapshot::Timer {
                count: 5,
                total: Duration::from_millis(500),
                max: Duration::from_millis(200),
            },
        );

        let records = aggregator.snapshot_all();
        assert_eq!(
            summarize(&records),
            vec![
                ("db.query.sum", StandardUnit::Milliseconds, 500.0),
                ("db.query.count", StandardUnit::Count, 5.0),
                ("db.query.avg", StandardUnit::Milliseconds, 100.0),
                ("db.query.max", StandardUnit::Milliseconds, 200.0),
            ]
        );
        assert!(records.iter().all(|r| r.timestamp() == 1_700_000_000_000));
    }

    #[test]
    fn registered_instruments_report_last_step() {
        let (clock, registry, aggregator) = setup();
        let latency = Id::new("http.latency", MeterType::Timer).with_tag(("uri", "/"));
        let timer = registry.timer(latency).unwrap();
        let counter = registry.counter(Id::new("http.requests", MeterType::Counter)).unwrap();

        for ms in [100, 50, 200, 100, 50] {
            timer.record(Duration::from_millis(ms));
            counter.increment();
        }
        assert_eq!(
            summarize(&aggregator.snapshot_all()),
            vec![
                ("http.latency.sum", StandardUnit::Milliseconds, 0.0),
                ("http.latency.count", StandardUnit::Count, 0.0),
                ("http.latency.avg", StandardUnit::Milliseconds, 0.0),
                ("http.latency.max", StandardUnit::Milliseconds, 0.0),
                ("http.requests", StandardUnit::None, 0.0),
            ]
        );

        clock.advance(Duration::from_secs(60));
        assert_eq!(
            summarize(&aggregator.snapshot_all()),
            vec![
                ("http.latency.sum", StandardUnit::Milliseconds, 500.0),
                ("http.latency.count", StandardUnit::Count, 5.0),
                ("http.latency.avg", StandardUnit::Milliseconds, 100.0),
                ("http.latency.max", StandardUnit::Milliseconds, 200.0),
                ("http.requests", StandardUnit::None, 5.0),
            ]
        );
    }

    #[test]
    fn summary_yields_four_records_without_units() {
        let (_, registry, aggregator) = setup();
        register(
            &registry,
            "payload.size",
            MeterType::DistributionSummary,
            Snapshot::Summary { count: 4, total: 10.0, max: 7.0 },
        );

        assert_eq!(
            summarize(&aggregator.snapshot_all()),
            vec![
                ("payload.size.sum", StandardUnit::None, 10.0),
                ("payload.size.count", StandardUnit::None, 4.0),
                ("payload.size.avg", StandardUnit::None, 2.5),
                ("payload.size.max", StandardUnit::None, 7.0),
            ]
        );
    }

    #[test]
    fn function_timer_never_yields_max() {
        let (_, registry, aggregator) = setup();
        register(
            &registry,
            "pool.acquire",
            MeterType::FunctionTimer,
            Snapshot::FunctionTimer { count: 4.0, total: 2.0, unit: TimeUnit::Seconds },
        );

        let records = aggregator.snapshot_all();
        assert_eq!(
            summarize(&records),
            vec![
                ("pool.acquire.count", StandardUnit::None, 4.0),
                ("pool.acquire.avg", StandardUnit::None, 500.0),
            ]
        );
        assert!(records.iter().all(|r| !r.name().ends_with(".max")));
    }

    #[test]
    fn single_value_and_function_counter() {
        let (_, registry, aggregator) = setup();
        register(&registry, "queue.depth", MeterType::Gauge, Snapshot::Value(12.0));
        register(
            &registry,
            "evictions",
            MeterType::FunctionCounter,
            Snapshot::FunctionCounter { count: 3.0 },
        );

        assert_eq!(
            summarize(&aggregator.snapshot_all()),
            vec![
                ("queue.depth", StandardUnit::None, 12.0),
                ("evictions.count", StandardUnit::None, 3.0),
            ]
        );
    }

    #[test]
    fn empty_timer_has_zero_average() {
        let (_, registry, aggregator) = setup();
        register(
            &registry,
            "idle",
            MeterType::Timer,
            Snapshot::Timer { count: 0, total: Duration::ZERO, max: Duration::ZERO },
        );

        let records = aggregator.snapshot_all();
        assert_eq!(records.len(), 4);
        assert_relative_eq!(records[2].value(), 0.0);
    }

    #[test]
    fn nan_records_are_dropped_and_siblings_kept() {
        let (_, registry, aggregator) = setup();
        register(&registry, "gone", MeterType::Gauge, Snapshot::Value(f64::NAN));
        register(
            &registry,
            "partial",
            MeterType::DistributionSummary,
            Snapshot::Summary { count: 2, total: 4.0, max: f64::NAN },
        );
        register(
            &registry,
            "fn.timer",
            MeterType::FunctionTimer,
            Snapshot::FunctionTimer {
                count: f64::NAN,
                total: f64::NAN,
                unit: TimeUnit::Milliseconds,
            },
        );

        let records = aggregator.snapshot_all();
        assert_eq!(
            summarize(&records),
            vec![
                ("partial.sum", StandardUnit::None, 4.0),
                ("partial.count", StandardUnit::None, 2.0),
                ("partial.avg", StandardUnit::None, 2.0),
            ]
        );
        assert!(records.iter().all(|r| !r.value().is_nan()));
    }

    #[test]
    fn generic_measurements_disambiguate_shared_suffixes() {
        let (_, registry, aggregator) = setup();
        registry
            .register(Arc::new(Fixed(
                Id::new("tasks", MeterType::Other).with_tag(("pool", "io")),
                Snapshot::Measurements(vec![
                    Measurement::new(Statistic::ActiveTasks, 3.0),
                    Measurement::new(Statistic::Total, 10.0),
                    Measurement::new(Statistic::TotalTime, 250.0),
                    Measurement::new(Statistic::Duration, 1.5),
                ]),
            )))
            .unwrap();

        let records = aggregator.snapshot_all();
        let flattened: Vec<_> =
            records.iter().map(|r| (r.name(), r.value(), r.tags().to_vec())).collect();
        let pool = Tag::new("pool", "io");
        let statistic = |name| Tag::new("statistic", name);
        assert_eq!(
            flattened,
            vec![
                ("tasks.active", 3.0, vec![pool.clone()]),
                ("tasks.total", 10.0, vec![pool.clone(), statistic("total")]),
                ("tasks.total", 250.0, vec![pool.clone(), statistic("totalTime")]),
                ("tasks.duration", 1.5, vec![pool]),
            ]
        );
    }

    #[test]
    fn naming_convention_applies_to_names_and_tags() {
        let (clock, _, _) = setup();
        let registry =
            Arc::new(Registry::new(StepClock::new(Arc::new(clock), Duration::from_secs(60))));
        let aggregator =
            Aggregator::new(Arc::clone(&registry), Arc::new(SnakeCase), TimeUnit::Seconds);
        registry
            .register(Arc::new(Fixed(
                Id::new("http.server.requests", MeterType::Timer).with_tag(("status.code", "200")),
                Snapshot::Timer {
                    count: 1,
                    total: Duration::from_millis(250),
                    max: Duration::from_millis(250),
                },
            )))
            .unwrap();

        let records = aggregator.snapshot_all();
        assert_eq!(records[0].name(), "http_server_requests_sum");
        assert_eq!(records[0].tags(), &[Tag::new("status_code", "200")]);
        assert_eq!(records[0].unit(), StandardUnit::Seconds);
        assert_relative_eq!(records[0].value(), 0.25);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let (clock, registry, aggregator) = setup();
        register(&registry, "g", MeterType::Gauge, Snapshot::Value(1.0));

        let first = aggregator.snapshot_all()[0].timestamp();
        clock.advance(Duration::from_secs(60));
        let second = aggregator.snapshot_all()[0].timestamp();
        assert!(second > first);

        clock.set_wall_time(first - 5_000);
        let third = aggregator.snapshot_all()[0].timestamp();
        assert_eq!(third, second);
    }
}
