use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use super::window::{StepDelta, StepWindow};
use crate::{
    clock::StepClock,
    id::Id,
    meter::{Meter, Snapshot},
    unit::TimeUnit,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct TimerStats {
    count: u64,
    total: Duration,
    max: Duration,
}

/// A step timer.
///
/// Tracks the count, total time, and maximum time of events recorded during each step. Snapshots report the last
/// completed step.
pub struct Timer {
    id: Id,
    step_clock: StepClock,
    window: StepWindow<TimerStats>,
}

impl Timer {
    pub(crate) fn new(id: Id, step_clock: StepClock) -> Self {
        Timer { id, window: StepWindow::new(step_clock.clone()), step_clock }
    }

    /// Records a single event of the given duration.
    pub fn record(&self, duration: Duration) {
        self.window.record(|stats| {
            stats.count += 1;
            stats.total += duration;
            stats.max = stats.max.max(duration);
        });
    }

    /// Runs `f`, recording how long it took.
    pub fn record_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let clock = self.step_clock.clock();
        let start = clock.monotonic_time();
        let result = f();
        let end = clock.monotonic_time();
        self.record(Duration::from_nanos(end.saturating_sub(start)));
        result
    }
}

impl Meter for Timer {
    fn id(&self) -> &Id {
        &self.id
    }

    fn snapshot(&self) -> Snapshot {
        let stats = self.window.poll();
        Snapshot::Timer { count: stats.count, total: stats.total, max: stats.max }
    }
}

type CountFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// A timer whose cumulative count and total time are read from functions.
///
/// Snapshots report how much each grew over the last completed step.
pub struct FunctionTimer {
    id: Id,
    count_fn: CountFn,
    total_fn: CountFn,
    unit: TimeUnit,
    delta: StepDelta<(f64, f64)>,
}

impl FunctionTimer {
    pub(crate) fn new<C, T>(
        id: Id,
        step_clock: StepClock,
        count_fn: C,
        total_fn: T,
        unit: TimeUnit,
    ) -> Self
    where
        C: Fn() -> f64 + Send + Sync + 'static,
        T: Fn() -> f64 + Send + Sync + 'static,
    {
        FunctionTimer {
            id,
            count_fn: Box::new(count_fn),
            total_fn: Box::new(total_fn),
            unit,
            delta: StepDelta::new(step_clock),
        }
    }

    pub(crate) fn from_weak<O, C, T>(
        id: Id,
        step_clock: StepClock,
        obj: &Arc<O>,
        count_fn: C,
        total_fn: T,
        unit: TimeUnit,
    ) -> Self
    where
        O: Send + Sync + 'static,
        C: Fn(&O) -> f64 + Send + Sync + 'static,
        T: Fn(&O) -> f64 + Send + Sync + 'static,
    {
        let count_obj: Weak<O> = Arc::downgrade(obj);
        let total_obj = Weak::clone(&count_obj);
        Self::new(
            id,
            step_clock,
            move || count_obj.upgrade().map_or(f64::NAN, |obj| count_fn(&obj)),
            move || total_obj.upgrade().map_or(f64::NAN, |obj| total_fn(&obj)),
            unit,
        )
    }
}

impl Meter for FunctionTimer {
    fn id(&self) -> &Id {
        &self.id
    }

    fn snapshot(&self) -> Snapshot {
        let (count, total) = self.delta.poll(
            || ((self.count_fn)(), (self.total_fn)()),
            |(last_count, last_total), (count, total)| {
                if count.is_nan() || total.is_nan() {
                    ((f64::NAN, f64::NAN), (*last_count, *last_total))
                } else {
                    ((count - last_count, total - last_total), (count, total))
                }
            },
        );
        Snapshot::FunctionTimer { count, total, unit: self.unit }
    }
}
