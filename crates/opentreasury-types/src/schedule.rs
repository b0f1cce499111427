//! Scheduled distribution model.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{constants, AccountId, ScheduleId};

/// A recurring, interval-based distribution to one recipient.
///
/// `next_due` always advances by whole intervals from its previous value,
/// never from the execution instant, so late executions do not accumulate
/// drift across missed cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledDistribution {
    /// Engine-assigned handle.
    pub id: ScheduleId,
    /// Payout recipient.
    pub recipient: AccountId,
    /// Amount per cycle.
    pub amount: Decimal,
    /// Seconds between cycles.
    pub interval_secs: u64,
    /// When the next cycle becomes due.
    pub next_due: DateTime<Utc>,
    /// Cumulative amount moved by this schedule.
    pub total_distributed: Decimal,
    /// Deactivation pauses the schedule without touching `next_due`.
    pub active: bool,
}

impl ScheduledDistribution {
    /// Whether this schedule is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && now >= self.next_due
    }

    /// The interval as a chrono duration, clamped to the engine-wide
    /// interval bound so the conversion can never leave `Duration` range.
    #[must_use]
    pub fn interval(&self) -> Duration {
        let secs = self.interval_secs.min(constants::MAX_INTERVAL_SECS);
        Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(next_due: DateTime<Utc>) -> ScheduledDistribution {
        ScheduledDistribution {
            id: ScheduleId(1),
            recipient: AccountId::from_bytes([1; 20]),
            amount: Decimal::new(200, 0),
            interval_secs: 86_400,
            next_due,
            total_distributed: Decimal::ZERO,
            active: true,
        }
    }

    #[test]
    fn due_exactly_at_next_due() {
        let now = Utc::now();
        let s = schedule(now);
        assert!(s.is_due(now));
        assert!(!s.is_due(now - Duration::seconds(1)));
    }

    #[test]
    fn inactive_schedule_is_never_due() {
        let now = Utc::now();
        let mut s = schedule(now);
        s.active = false;
        assert!(!s.is_due(now + Duration::days(10)));
    }

    #[test]
    fn interval_conversion() {
        let s = schedule(Utc::now());
        assert_eq!(s.interval(), Duration::days(1));
    }
}
