//! Time-window rules. Each check takes exact durations, so a screening
//! 6 days 23 hours away is not "7 days" and 59 minutes is not "1 hour".

use chrono::{Duration, NaiveDateTime};

use crate::config::BookingConfig;
use crate::error::{CinemaError, CinemaResult};

// Lengths past what a Duration can hold saturate instead of panicking.
fn saturating(n: i64, to_delta: fn(i64) -> Option<Duration>) -> Duration {
    to_delta(n).unwrap_or(if n < 0 { Duration::MIN } else { Duration::MAX })
}

fn days(n: i64) -> Duration {
    saturating(n, Duration::try_days)
}

fn hours(n: i64) -> Duration {
    saturating(n, Duration::try_hours)
}

/// A screening may only be scheduled between `min_ahead` and `max_ahead`
/// from now, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreeningDatePolicy {
    min_ahead: Duration,
    max_ahead: Duration,
}

impl ScreeningDatePolicy {
    pub fn new(min_days: i64, max_days: i64) -> Self {
        Self {
            min_ahead: days(min_days),
            max_ahead: days(max_days),
        }
    }

    pub fn check(&self, now: NaiveDateTime, proposed_start: NaiveDateTime) -> CinemaResult<()> {
        let difference = (proposed_start - now).abs();
        if difference < self.min_ahead || difference > self.max_ahead {
            return Err(CinemaError::DateOutOfRange);
        }
        Ok(())
    }
}

impl Default for ScreeningDatePolicy {
    fn default() -> Self {
        Self::from(&BookingConfig::default())
    }
}

impl From<&BookingConfig> for ScreeningDatePolicy {
    fn from(config: &BookingConfig) -> Self {
        Self::new(config.min_days_ahead, config.max_days_ahead)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketBookingPolicy {
    min_before: Duration,
}

impl TicketBookingPolicy {
    pub fn new(min_hours: i64) -> Self {
        Self {
            min_before: hours(min_hours),
        }
    }

    pub fn check(&self, time_to_screening: Duration) -> CinemaResult<()> {
        if time_to_screening < self.min_before {
            return Err(CinemaError::TicketBookTooLate);
        }
        Ok(())
    }
}

impl Default for TicketBookingPolicy {
    fn default() -> Self {
        Self::from(&BookingConfig::default())
    }
}

impl From<&BookingConfig> for TicketBookingPolicy {
    fn from(config: &BookingConfig) -> Self {
        Self::new(config.book_min_hours_before)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketCancellingPolicy {
    min_before: Duration,
}

impl TicketCancellingPolicy {
    pub fn new(min_hours: i64) -> Self {
        Self {
            min_before: hours(min_hours),
        }
    }

    pub fn check(&self, time_to_screening: Duration) -> CinemaResult<()> {
        if time_to_screening < self.min_before {
            return Err(CinemaError::TicketCancelTooLate);
        }
        Ok(())
    }
}

impl Default for TicketCancellingPolicy {
    fn default() -> Self {
        Self::from(&BookingConfig::default())
    }
}

impl From<&BookingConfig> for TicketCancellingPolicy {
    fn from(config: &BookingConfig) -> Self {
        Self::new(config.cancel_min_hours_before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn screening_date_bounds_are_inclusive() {
        let policy = ScreeningDatePolicy::default();
        assert!(policy.check(now(), now() + Duration::days(7)).is_ok());
        assert!(policy.check(now(), now() + Duration::days(21)).is_ok());
        assert!(policy.check(now(), now() + Duration::days(14)).is_ok());
    }

    #[test]
    fn screening_date_just_outside_bounds_is_rejected() {
        let policy = ScreeningDatePolicy::default();
        let too_soon = now() + Duration::days(6) + Duration::hours(23);
        let too_far = now() + Duration::days(21) + Duration::hours(1);
        assert!(matches!(policy.check(now(), too_soon), Err(CinemaError::DateOutOfRange)));
        assert!(matches!(policy.check(now(), too_far), Err(CinemaError::DateOutOfRange)));
        assert!(matches!(policy.check(now(), now()), Err(CinemaError::DateOutOfRange)));
    }

    #[test]
    fn screening_date_difference_is_absolute() {
        let policy = ScreeningDatePolicy::default();
        assert!(policy.check(now(), now() - Duration::days(10)).is_ok());
    }

    #[test]
    fn booking_allowed_at_exactly_one_hour() {
        let policy = TicketBookingPolicy::default();
        assert!(policy.check(Duration::hours(1)).is_ok());
        assert!(matches!(
            policy.check(Duration::minutes(59) + Duration::seconds(24)),
            Err(CinemaError::TicketBookTooLate)
        ));
    }

    #[test]
    fn cancelling_needs_a_full_day() {
        let policy = TicketCancellingPolicy::default();
        assert!(policy.check(Duration::hours(24)).is_ok());
        assert!(matches!(
            policy.check(Duration::hours(23) + Duration::minutes(59)),
            Err(CinemaError::TicketCancelTooLate)
        ));
    }

    #[test]
    fn oversized_windows_saturate() {
        let dates = ScreeningDatePolicy::new(i64::MAX / 2, i64::MAX);
        assert!(matches!(
            dates.check(now(), now() + Duration::days(30)),
            Err(CinemaError::DateOutOfRange)
        ));
        assert!(matches!(
            TicketBookingPolicy::new(i64::MAX).check(Duration::days(365)),
            Err(CinemaError::TicketBookTooLate)
        ));
        assert!(TicketCancellingPolicy::new(i64::MIN).check(Duration::zero()).is_ok());
    }

    #[test]
    fn windows_follow_configuration() {
        let config = BookingConfig {
            min_days_ahead: 1,
            max_days_ahead: 2,
            book_min_hours_before: 3,
            cancel_min_hours_before: 48,
        };
        assert!(ScreeningDatePolicy::from(&config)
            .check(now(), now() + Duration::days(1))
            .is_ok());
        assert!(TicketBookingPolicy::from(&config)
            .check(Duration::hours(2))
            .is_err());
        assert!(TicketCancellingPolicy::from(&config)
            .check(Duration::hours(30))
            .is_err());
    }
}
