use parking_lot::Mutex;

use crate::clock::StepClock;

struct WindowState<T> {
    step: u64,
    current: T,
    previous: T,
}

/// A value accumulated over fixed-duration windows.
///
/// Writers accumulate into the current window. Readers see the value of the last *completed* window, so every read
/// within a window returns the same, stable value. When more than one window boundary has passed since the last
/// access, the completed window saw no activity and reads as `T::default()`.
pub(crate) struct StepWindow<T> {
    step_clock: StepClock,
    state: Mutex<WindowState<T>>,
}

impl<T: Default + Clone> StepWindow<T> {
    pub fn new(step_clock: StepClock) -> Self {
        let step = step_clock.current_step();
        StepWindow {
            step_clock,
            state: Mutex::new(WindowState { step, current: T::default(), previous: T::default() }),
        }
    }

    fn roll(&self, state: &mut WindowState<T>) {
        let now = self.step_clock.current_step();
        if now <= state.step {
            return;
        }

        let current = std::mem::take(&mut state.current);
        state.previous = if now == state.step + 1 { current } else { T::default() };
        state.step = now;
    }

    /// Updates the current window.
    pub fn record<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut state = self.state.lock();
        self.roll(&mut state);
        f(&mut state.current);
    }

    /// Returns the value of the last completed window.
    pub fn poll(&self) -> T {
        let mut state = self.state.lock();
        self.roll(&mut state);
        state.previous.clone()
    }
}

/// Turns a cumulative reading into per-window deltas.
///
/// The reading is sampled at most once per window, the first time the window is polled. The delta reported for a
/// window is the difference between that sample and the previous one.
pub(crate) struct StepDelta<T> {
    step_clock: StepClock,
    state: Mutex<DeltaState<T>>,
}

struct DeltaState<T> {
    step: u64,
    last: T,
    delta: T,
}

impl<T: Default + Clone> StepDelta<T> {
    pub fn new(step_clock: StepClock) -> Self {
        let step = step_clock.current_step();
        let state = DeltaState { step, last: T::default(), delta: T::default() };
        StepDelta { step_clock, state: Mutex::new(state) }
    }

    /// Returns the delta for the last completed window.
    ///
    /// `read` is only called when a new window has started since the last poll. `diff` computes `(delta, new_last)`
    /// from the previous and current readings.
    pub fn poll<R, D>(&self, read: R, diff: D) -> T
    where
        R: FnOnce() -> T,
        D: FnOnce(&T, T) -> (T, T),
    {
        let mut state = self.state.lock();
        let now = self.step_clock.current_step();
        if now > state.step {
            let (delta, last) = diff(&state.last, read());
            state.delta = delta;
            state.last = last;
            state.step = now;
        }
        state.delta.clone()
    }
}
