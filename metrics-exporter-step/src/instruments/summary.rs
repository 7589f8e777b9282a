use super::window::StepWindow;
use crate::{
    clock::StepClock,
    id::Id,
    meter::{Meter, Snapshot},
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SummaryStats {
    count: u64,
    total: f64,
    max: f64,
}

/// A step distribution summary.
///
/// Tracks the count, sum, and maximum of amounts recorded during each step, such as payload sizes. Snapshots report
/// the last completed step.
pub struct DistributionSummary {
    id: Id,
    window: StepWindow<SummaryStats>,
}

impl DistributionSummary {
    pub(crate) fn new(id: Id, step_clock: StepClock) -> Self {
        DistributionSummary { id, window: StepWindow::new(step_clock) }
    }

    /// Records a single amount.
    ///
    /// Negative and NaN amounts are ignored.
    pub fn record(&self, amount: f64) {
        if amount.is_nan() || amount < 0.0 {
            return;
        }

        self.window.record(|stats| {
            stats.count += 1;
            stats.total += amount;
            stats.max = stats.max.max(amount);
        });
    }
}

impl Meter for DistributionSummary {
    fn id(&self) -> &Id {
        &self.id
    }

    fn snapshot(&self) -> Snapshot {
        let stats = self.window.poll();
        Snapshot::Summary { count: stats.count, total: stats.total, max: stats.max }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::DistributionSummary;
    use crate::{
        clock::{MockClock, StepClock},
        id::{Id, MeterType},
        meter::{Meter, Snapshot},
    };

    #[test]
    fn summary_tracks_amounts() {
        let clock = MockClock::new(0);
        let summary = DistributionSummary::new(
            Id::new("http.response.size", MeterType::DistributionSummary).with_base_unit("bytes"),
            StepClock::new(Arc::new(clock.clone()), Duration::from_secs(60)),
        );

        summary.record(512.0);
        summary.record(2048.0);
        summary.record(-1.0);
        clock.advance(Duration::from_secs(60));

        assert_eq!(summary.snapshot(), Snapshot::Summary { count: 2, total: 2560.0, max: 2048.0 });
    }
}
