use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;

use crate::{
    clock::StepClock,
    id::{Id, MeterType},
    instruments::{Counter, DistributionSummary, FunctionCounter, FunctionTimer, Gauge, Timer},
    meter::Meter,
    unit::TimeUnit,
};

/// Errors that could occur while registering a meter.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A meter with the same identity but a different kind is already registered.
    #[error("meter '{id}' is already registered as a {existing}")]
    KindMismatch {
        /// Identity of the conflicting meter.
        id: String,

        /// Kind of the meter already registered.
        existing: &'static str,
    },
}

/// A registered meter.
#[derive(Clone)]
pub enum MeterHandle {
    /// A step counter.
    Counter(Arc<Counter>),

    /// A gauge.
    Gauge(Arc<Gauge>),

    /// A step timer.
    Timer(Arc<Timer>),

    /// A step distribution summary.
    DistributionSummary(Arc<DistributionSummary>),

    /// A function-backed counter.
    FunctionCounter(Arc<FunctionCounter>),

    /// A function-backed timer.
    FunctionTimer(Arc<FunctionTimer>),

    /// A user-provided meter.
    Custom(Arc<dyn Meter>),
}

impl MeterHandle {
    /// Returns the handle as a [`Meter`].
    pub fn meter(&self) -> &dyn Meter {
        match self {
            MeterHandle::Counter(m) => m.as_ref(),
            MeterHandle::Gauge(m) => m.as_ref(),
            MeterHandle::Timer(m) => m.as_ref(),
            MeterHandle::DistributionSummary(m) => m.as_ref(),
            MeterHandle::FunctionCounter(m) => m.as_ref(),
            MeterHandle::FunctionTimer(m) => m.as_ref(),
            MeterHandle::Custom(m) => m.as_ref(),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            MeterHandle::Counter(_) => "counter",
            MeterHandle::Gauge(_) => "gauge",
            MeterHandle::Timer(_) => "timer",
            MeterHandle::DistributionSummary(_) => "distribution summary",
            MeterHandle::FunctionCounter(_) => "function counter",
            MeterHandle::FunctionTimer(_) => "function timer",
            MeterHandle::Custom(_) => "custom meter",
        }
    }
}

/// A thread-safe collection of meters.
///
/// Meters are keyed by [`Id`] and iterated in registration order. Registering a meter whose identity is already present
/// returns the existing meter, as long as it is of the same kind.
///
/// The registry is shared between the application, which registers and records against meters, and the exporter, which
/// reads [`meters`](Registry::meters) once per step. Reading clones the current handles out under a short read lock, so
/// recording is never blocked for the duration of a publish.
pub struct Registry {
    step_clock: StepClock,
    meters: RwLock<IndexMap<Id, MeterHandle>>,
}

macro_rules! get_or_register {
    ($self:ident, $id:expr, $variant:ident, $create:expr) => {{
        let id: Id = $id;
        if let Some(existing) = $self.meters.read().get(&id) {
            return match existing {
                MeterHandle::$variant(m) => Ok(Arc::clone(m)),
                other => {
                    Err(RegistryError::KindMismatch { id: id.to_string(), existing: other.kind() })
                }
            };
        }

        let mut meters = $self.meters.write();
        match meters.entry(id) {
            indexmap::map::Entry::Occupied(entry) => match entry.get() {
                MeterHandle::$variant(m) => Ok(Arc::clone(m)),
                other => Err(RegistryError::KindMismatch {
                    id: entry.key().to_string(),
                    existing: other.kind(),
                }),
            },
            indexmap::map::Entry::Vacant(entry) => {
                let create = $create;
                let meter = Arc::new(create(entry.key().clone()));
                entry.insert(MeterHandle::$variant(Arc::clone(&meter)));
                Ok(meter)
            }
        }
    }};
}

impl Registry {
    /// Creates an empty `Registry` whose step instruments roll over on the windows of `step_clock`.
    pub fn new(step_clock: StepClock) -> Self {
        Registry { step_clock, meters: RwLock::new(IndexMap::new()) }
    }

    /// Returns the step clock shared by this registry's instruments.
    pub fn step_clock(&self) -> &StepClock {
        &self.step_clock
    }

    /// Gets or registers a counter.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn counter(&self, id: Id) -> Result<Arc<Counter>, RegistryError> {
        let step_clock = self.step_clock.clone();
        get_or_register!(self, id.with_meter_type(MeterType::Counter), Counter, |id| Counter::new(
            id, step_clock
        ))
    }

    /// Gets or registers a timer.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn timer(&self, id: Id) -> Result<Arc<Timer>, RegistryError> {
        let step_clock = self.step_clock.clone();
        get_or_register!(self, id.with_meter_type(MeterType::Timer), Timer, |id| {
            Timer::new(id, step_clock)
        })
    }

    /// Gets or registers a distribution summary.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn summary(&self, id: Id) -> Result<Arc<DistributionSummary>, RegistryError> {
        let step_clock = self.step_clock.clone();
        get_or_register!(
            self,
            id.with_meter_type(MeterType::DistributionSummary),
            DistributionSummary,
            |id| DistributionSummary::new(id, step_clock)
        )
    }

    /// Gets or registers a gauge reading `f`.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn gauge<F>(&self, id: Id, f: F) -> Result<Arc<Gauge>, RegistryError>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        get_or_register!(self, id.with_meter_type(MeterType::Gauge), Gauge, |id| Gauge::new(id, f))
    }

    /// Gets or registers a gauge observing `obj` through a weak reference.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn gauge_weak<T, F>(&self, id: Id, obj: &Arc<T>, f: F) -> Result<Arc<Gauge>, RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        get_or_register!(self, id.with_meter_type(MeterType::Gauge), Gauge, |id| {
            Gauge::from_weak(id, obj, f)
        })
    }

    /// Gets or registers a counter reading a cumulative value from `obj` through a weak reference.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn function_counter<T, F>(
        &self,
        id: Id,
        obj: &Arc<T>,
        f: F,
    ) -> Result<Arc<FunctionCounter>, RegistryError>
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let step_clock = self.step_clock.clone();
        get_or_register!(
            self,
            id.with_meter_type(MeterType::FunctionCounter),
            FunctionCounter,
            |id| FunctionCounter::from_weak(id, step_clock, obj, f)
        )
    }

    /// Gets or registers a timer reading a cumulative count and total time from `obj` through a weak reference.
    ///
    /// `total_fn` reports time in `unit`.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn function_timer<T, C, F>(
        &self,
        id: Id,
        obj: &Arc<T>,
        count_fn: C,
        total_fn: F,
        unit: TimeUnit,
    ) -> Result<Arc<FunctionTimer>, RegistryError>
    where
        T: Send + Sync + 'static,
        C: Fn(&T) -> f64 + Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let step_clock = self.step_clock.clone();
        get_or_register!(
            self,
            id.with_meter_type(MeterType::FunctionTimer),
            FunctionTimer,
            |id| FunctionTimer::from_weak(id, step_clock, obj, count_fn, total_fn, unit)
        )
    }

    /// Registers a user-provided meter.
    ///
    /// If a custom meter with the same identity is already registered, it is returned instead and `meter` is dropped.
    ///
    /// # Errors
    ///
    /// If a meter of a different kind is registered under the same identity, an error is returned.
    pub fn register(&self, meter: Arc<dyn Meter>) -> Result<Arc<dyn Meter>, RegistryError> {
        let id = meter.id().clone();
        let mut meters = self.meters.write();
        match meters.entry(id) {
            indexmap::map::Entry::Occupied(entry) => match entry.get() {
                MeterHandle::Custom(m) => Ok(Arc::clone(m)),
                other => Err(RegistryError::KindMismatch {
                    id: entry.key().to_string(),
                    existing: other.kind(),
                }),
            },
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(MeterHandle::Custom(Arc::clone(&meter)));
                Ok(meter)
            }
        }
    }

    /// Removes the meter with the given identity, returning it if it was present.
    ///
    /// Registration order of the remaining meters is preserved.
    pub fn remove(&self, id: &Id) -> Option<MeterHandle> {
        self.meters.write().shift_remove(id)
    }

    /// Returns all currently registered meters, in registration order.
    pub fn meters(&self) -> Vec<MeterHandle> {
        self.meters.read().values().cloned().collect()
    }

    /// Returns the number of registered meters.
    pub fn len(&self) -> usize {
        self.meters.read().len()
    }

    /// Returns `true` if no meters are registered.
    pub fn is_empty(&self) -> bool {
        self.meters.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::{MeterHandle, Registry, RegistryError};
    use crate::{
        clock::{MockClock, StepClock},
        id::{Id, MeterType},
        meter::{Meter, Snapshot},
    };

    fn registry() -> Registry {
        Registry::new(StepClock::new(Arc::new(MockClock::new(0)), Duration::from_secs(60)))
    }

    struct Fixed(Id);

    impl Meter for Fixed {
        fn id(&self) -> &Id {
            &self.0
        }

        fn snapshot(&self) -> Snapshot {
            Snapshot::Value(1.0)
        }
    }

    #[test]
    fn get_or_register_returns_existing() {
        let registry = registry();
        let jobs = |meter_type, queue| Id::new("jobs", meter_type).with_tag(("queue", queue));
        let a = registry.counter(jobs(MeterType::Other, "a")).unwrap();
        let b = registry.counter(jobs(MeterType::Counter, "a")).unwrap();
        let c = registry.counter(jobs(MeterType::Counter, "b")).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.id().meter_type(), MeterType::Counter);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let registry = registry();
        registry.timer(Id::new("latency", MeterType::Timer)).unwrap();

        let result = registry.counter(Id::new("latency", MeterType::Counter));
        assert!(matches!(result, Err(RegistryError::KindMismatch { existing: "timer", .. })));

        let result = registry.register(Arc::new(Fixed(Id::new("latency", MeterType::Other))));
        assert!(matches!(result, Err(RegistryError::KindMismatch { existing: "timer", .. })));
    }

    #[test]
    fn meters_are_listed_in_registration_order() {
        let registry = registry();
        registry.counter(Id::new("c", MeterType::Counter)).unwrap();
        registry.gauge(Id::new("a", MeterType::Gauge), || 1.0).unwrap();
        registry.register(Arc::new(Fixed(Id::new("b", MeterType::Other)))).unwrap();
        registry.summary(Id::new("d", MeterType::DistributionSummary)).unwrap();

        let names = |registry: &Registry| -> Vec<String> {
            registry.meters().iter().map(|m| m.meter().id().name().to_string()).collect()
        };
        assert_eq!(names(&registry), ["c", "a", "b", "d"]);

        let removed = registry.remove(&Id::new("a", MeterType::Gauge));
        assert!(matches!(removed, Some(MeterHandle::Gauge(_))));
        assert_eq!(names(&registry), ["c", "b", "d"]);
    }
}
