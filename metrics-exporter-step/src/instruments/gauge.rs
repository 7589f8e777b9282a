use std::sync::{Arc, Weak};

use crate::{
    id::Id,
    meter::{Meter, Snapshot},
};

type ValueFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// A gauge whose value is read from a function at snapshot time.
pub struct Gauge {
    id: Id,
    f: ValueFn,
}

impl Gauge {
    pub(crate) fn new<F>(id: Id, f: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Gauge { id, f: Box::new(f) }
    }

    /// Creates a gauge observing `obj` without keeping it alive.
    ///
    /// Once `obj` is dropped, the gauge reads as NaN and stops contributing records.
    pub(crate) fn from_weak<T, F>(id: Id, obj: &Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        let obj: Weak<T> = Arc::downgrade(obj);
        Self::new(id, move || obj.upgrade().map_or(f64::NAN, |obj| f(&obj)))
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        (self.f)()
    }
}

impl Meter for Gauge {
    fn id(&self) -> &Id {
        &self.id
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::Value(self.value())
    }
}
