//! Step-windowed instrument implementations.
//!
//! These are the instruments handed out by [`Registry`](crate::Registry). Each one accumulates into the current step
//! and reports the last completed step, so every snapshot taken within a step observes the same values.

mod counter;
pub use self::counter::{Counter, FunctionCounter};

mod gauge;
pub use self::gauge::Gauge;

mod summary;
pub use self::summary::DistributionSummary;

mod timer;
pub use self::timer::{FunctionTimer, Timer};

mod window;
