use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

/// A source of wall and monotonic time.
pub trait Clock: Send + Sync + 'static {
    /// Current wall time, in milliseconds since the Unix epoch.
    fn wall_time(&self) -> u64;

    /// Current monotonic time, in nanoseconds from an arbitrary origin.
    fn monotonic_time(&self) -> u64;
}

/// A [`Clock`] backed by the system clock.
///
/// Monotonic time comes from [`quanta`], which is substantially cheaper to query than [`std::time::Instant`] on most
/// platforms.
#[derive(Clone)]
pub struct SystemClock {
    inner: quanta::Clock,
    origin: quanta::Instant,
}

impl SystemClock {
    /// Creates a new `SystemClock`.
    pub fn new() -> Self {
        let inner = quanta::Clock::new();
        let origin = inner.now();
        SystemClock { inner, origin }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn wall_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn monotonic_time(&self) -> u64 {
        self.inner.now().duration_since(self.origin).as_nanos() as u64
    }
}

impl fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClock").finish_non_exhaustive()
    }
}

/// A manually driven [`Clock`].
///
/// Clones share the same underlying time, so a test can hand one clone to the code under test and advance time through
/// another. Wall and monotonic time always move together.
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    wall_ms: Arc<AtomicU64>,
    monotonic_ns: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a new `MockClock` starting at the given wall time, in milliseconds since the Unix epoch.
    pub fn new(wall_ms: u64) -> Self {
        MockClock {
            wall_ms: Arc::new(AtomicU64::new(wall_ms)),
            monotonic_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advances the clock by `amount`.
    pub fn advance(&self, amount: Duration) {
        self.wall_ms.fetch_add(amount.as_millis() as u64, Ordering::AcqRel);
        self.monotonic_ns.fetch_add(amount.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Sets the wall time, in milliseconds since the Unix epoch, without touching monotonic time.
    ///
    /// Wall time may be moved backwards.
    pub fn set_wall_time(&self, wall_ms: u64) {
        self.wall_ms.store(wall_ms, Ordering::Release);
    }
}

impl Clock for MockClock {
    fn wall_time(&self) -> u64 {
        self.wall_ms.load(Ordering::Acquire)
    }

    fn monotonic_time(&self) -> u64 {
        self.monotonic_ns.load(Ordering::Acquire)
    }
}

/// A clock paired with a step duration, defining the boundaries of fixed-size windows.
///
/// Windows are aligned to the Unix epoch: window `n` covers wall times `[n * step, (n + 1) * step)`.
#[derive(Clone)]
pub struct StepClock {
    clock: Arc<dyn Clock>,
    step_ms: u64,
}

impl StepClock {
    /// Creates a new `StepClock`.
    ///
    /// Steps are tracked at millisecond resolution, with a minimum of one millisecond.
    pub fn new(clock: Arc<dyn Clock>, step: Duration) -> Self {
        let step_ms = (step.as_millis() as u64).max(1);
        StepClock { clock, step_ms }
    }

    /// Returns the underlying clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the step duration.
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    /// Index of the window containing `wall_ms`.
    pub fn step_index(&self, wall_ms: u64) -> u64 {
        wall_ms / self.step_ms
    }

    /// Index of the window containing the current wall time.
    pub fn current_step(&self) -> u64 {
        self.step_index(self.clock.wall_time())
    }

    /// Start of the window containing `wall_ms`, in milliseconds since the Unix epoch.
    pub fn window_start(&self, wall_ms: u64) -> u64 {
        self.step_index(wall_ms) * self.step_ms
    }

    /// Time remaining until just past the next window boundary.
    ///
    /// The extra millisecond ensures a tick fired after this delay observes the new window rather than racing the
    /// boundary.
    pub fn initial_delay(&self) -> Duration {
        let now = self.clock.wall_time();
        let next_boundary = self.window_start(now) + self.step_ms;
        Duration::from_millis(next_boundary - now + 1)
    }
}

impl fmt::Debug for StepClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepClock").field("step_ms", &self.step_ms).finish_non_exhaustive()
    }
}
