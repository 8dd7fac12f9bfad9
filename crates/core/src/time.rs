use chrono::{DateTime, Duration, Utc};

/// Source of "now" for session timestamps and answer timings.
///
/// Front ends use `System`; tests pin time with `Fixed` and step it with `advance`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Step a fixed clock forward, e.g. to simulate thinking time between
    /// presentation and answer. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Seconds elapsed from `from` to `to`, clamped at zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    millis as f64 / 1000.0
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_ignores_advance() {
        let mut clock = Clock::system();
        clock.advance(Duration::hours(1));
        assert_eq!(clock, Clock::System);
        assert!(!clock.is_fixed());
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = Clock::fixed(fixed_now());
        clock.advance(Duration::seconds(12));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(12));
        assert!(clock.is_fixed());
    }

    #[test]
    fn elapsed_is_clamped() {
        let now = fixed_now();
        let later = now + Duration::milliseconds(1500);
        assert!((elapsed_seconds(now, later) - 1.5).abs() < f64::EPSILON);
        assert!(elapsed_seconds(later, now).abs() < f64::EPSILON);
    }
}
