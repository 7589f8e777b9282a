use std::sync::{Arc, Weak};

use super::window::{StepDelta, StepWindow};
use crate::{
    clock::StepClock,
    id::Id,
    meter::{Meter, Snapshot},
};

/// A step counter.
///
/// Increments accumulate into the current step; snapshots report the total of the last completed step.
pub struct Counter {
    id: Id,
    window: StepWindow<f64>,
}

impl Counter {
    pub(crate) fn new(id: Id, step_clock: StepClock) -> Self {
        Counter { id, window: StepWindow::new(step_clock) }
    }

    /// Increments the counter by one.
    pub fn increment(&self) {
        self.increment_by(1.0);
    }

    /// Increments the counter by `amount`.
    ///
    /// Negative and NaN amounts are ignored.
    pub fn increment_by(&self, amount: f64) {
        if amount.is_nan() || amount < 0.0 {
            return;
        }
        self.window.record(|total| *total += amount);
    }

    /// Total of the last completed step.
    pub fn count(&self) -> f64 {
        self.window.poll()
    }
}

impl Meter for Counter {
    fn id(&self) -> &Id {
        &self.id
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Value(self.count())
    }
}

type CountFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// A counter whose cumulative value is read from a function.
///
/// Snapshots report how much the cumulative value grew over the last completed step.
pub struct FunctionCounter {
    id: Id,
    f: CountFn,
    delta: StepDelta<f64>,
}

impl FunctionCounter {
    pub(crate) fn new<F>(id: Id, step_clock: StepClock, f: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        FunctionCounter { id, f: Box::new(f), delta: StepDelta::new(step_clock) }
    }

    pub(crate) fn from_weak<T, F>(id: Id, step_clock: StepClock, obj: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let obj: Weak<T> = Arc::downgrade(obj);
        Self::new(id, step_clock, move || obj.upgrade().map_or(f64::NAN, |obj| f(&obj)))
    }

    /// Growth of the cumulative value over the last completed step.
    ///
    /// Returns NaN once the underlying object has been dropped.
    pub fn count(&self) -> f64 {
        self.delta.poll(|| (self.f)(), |last, current| {
            if current.is_nan() {
                (f64::NAN, *last)
            } else {
                (current - last, current)
            }
        })
    }
}

impl Meter for FunctionCounter {
    fn id(&self) -> &Id {
        &self.id
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::FunctionCounter { count: self.count() }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::{Counter, FunctionCounter};
    use crate::{
        clock::{MockClock, StepClock},
        id::{Id, MeterType},
        meter::{Meter, Snapshot},
    };

    fn step_clock(clock: &MockClock) -> StepClock {
        StepClock::new(Arc::new(clock.clone()), Duration::from_secs(60))
    }

    #[test]
    fn counter_reports_last_step() {
        let clock = MockClock::new(0);
        let counter = Counter::new(Id::new("jobs", MeterType::Counter), step_clock(&clock));

        counter.increment();
        counter.increment_by(2.5);
        counter.increment_by(-10.0);
        counter.increment_by(f64::NAN);
        assert_eq!(counter.snapshot(), Snapshot::Value(0.0));

        clock.advance(Duration::from_secs(60));
        assert_eq!(counter.snapshot(), Snapshot::Value(3.5));

        clock.advance(Duration::from_secs(60));
        assert_eq!(counter.snapshot(), Snapshot::Value(0.0));
    }

    #[test]
    fn function_counter_reports_growth() {
        let clock = MockClock::new(0);
        let source = Arc::new(AtomicU64::new(0));
        let counter = FunctionCounter::from_weak(
            Id::new("cache.evictions", MeterType::FunctionCounter),
            step_clock(&clock),
            &source,
            |v| v.load(Ordering::Relaxed) as f64,
        );

        source.store(4, Ordering::Relaxed);
        clock.advance(Duration::from_secs(60));
        assert_eq!(counter.count(), 4.0);

        source.store(10, Ordering::Relaxed);
        clock.advance(Duration::from_secs(60));
        assert_eq!(counter.count(), 6.0);

        drop(source);
        clock.advance(Duration::from_secs(60));
        assert!(counter.count().is_nan());
    }
}
