use std::{fmt, time::Duration};

use serde::Deserialize;

/// Time unit used to express durations as plain numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,

    /// Microseconds.
    Microseconds,

    /// Milliseconds.
    #[default]
    Milliseconds,

    /// Seconds.
    Seconds,
}

impl TimeUnit {
    /// Returns the canonical lowercase name of this unit, e.g. `milliseconds`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "nanoseconds",
            TimeUnit::Microseconds => "microseconds",
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
        }
    }

    const fn nanos_per_unit(&self) -> f64 {
        match self {
            TimeUnit::Nanoseconds => 1.0,
            TimeUnit::Microseconds => 1_000.0,
            TimeUnit::Milliseconds => 1_000_000.0,
            TimeUnit::Seconds => 1_000_000_000.0,
        }
    }

    /// Expresses `duration` as a number of this unit.
    pub fn express(&self, duration: Duration) -> f64 {
        duration.as_nanos() as f64 / self.nanos_per_unit()
    }

    /// Converts `value`, expressed in `source`, into this unit.
    pub fn convert(&self, value: f64, source: TimeUnit) -> f64 {
        value * source.nanos_per_unit() / self.nanos_per_unit()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of units a record can carry downstream.
///
/// Unit hints are free-form strings; anything that is not recognized maps to [`StandardUnit::None`] rather than
/// failing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StandardUnit {
    /// Seconds.
    Seconds,

    /// Microseconds.
    Microseconds,

    /// Milliseconds.
    Milliseconds,

    /// Bytes.
    Bytes,

    /// A plain count.
    Count,

    /// No unit, or a unit that could not be mapped.
    #[default]
    None,
}

impl StandardUnit {
    /// Maps a unit hint to a standard unit.
    ///
    /// Matching is case-insensitive. `None` and unrecognized hints map to [`StandardUnit::None`].
    pub fn from_hint(hint: Option<&str>) -> Self {
        let Some(hint) = hint else {
            return StandardUnit::None;
        };

        match hint.to_ascii_lowercase().as_str() {
            "seconds" => StandardUnit::Seconds,
            "microseconds" => StandardUnit::Microseconds,
            "milliseconds" => StandardUnit::Milliseconds,
            "bytes" => StandardUnit::Bytes,
            "count" => StandardUnit::Count,
            _ => StandardUnit::None,
        }
    }

    /// Returns the canonical name of this unit, e.g. `Milliseconds`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StandardUnit::Seconds => "Seconds",
            StandardUnit::Microseconds => "Microseconds",
            StandardUnit::Milliseconds => "Milliseconds",
            StandardUnit::Bytes => "Bytes",
            StandardUnit::Count => "Count",
            StandardUnit::None => "None",
        }
    }
}

impl fmt::Display for StandardUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;

    use super::{StandardUnit, TimeUnit};

    #[test]
    fn unit_hints() {
        let cases = [
            (None, StandardUnit::None),
            (Some("bytes"), StandardUnit::Bytes),
            (Some("Milliseconds"), StandardUnit::Milliseconds),
            (Some("COUNT"), StandardUnit::Count),
            (Some("seconds"), StandardUnit::Seconds),
            (Some("microseconds"), StandardUnit::Microseconds),
            // CloudWatch-style backends have no nanosecond unit.
            (Some("nanoseconds"), StandardUnit::None),
            (Some("furlongs"), StandardUnit::None),
            (Some(""), StandardUnit::None),
        ];

        for (hint, expected) in cases {
            assert_eq!(StandardUnit::from_hint(hint), expected, "hint: {hint:?}");
        }
    }

    #[test]
    fn time_unit_conversions() {
        let d = Duration::from_millis(1500);
        assert_relative_eq!(TimeUnit::Milliseconds.express(d), 1500.0);
        assert_relative_eq!(TimeUnit::Seconds.express(d), 1.5);
        assert_relative_eq!(TimeUnit::Microseconds.express(d), 1_500_000.0);
        assert_relative_eq!(TimeUnit::Milliseconds.convert(2.0, TimeUnit::Seconds), 2000.0);
        assert_relative_eq!(TimeUnit::Seconds.convert(250.0, TimeUnit::Milliseconds), 0.25);
    }
}
