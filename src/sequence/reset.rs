//! Periodic counter resets.

use chrono::{DateTime, Duration, Months, Utc};

use crate::model::{NumberingConfig, ResetInterval};

/// Reset policy state carried between attempts of one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetState {
    /// Policy.
    pub interval: ResetInterval,
    /// Next moment a reset fires.
    pub reset_date: Option<DateTime<Utc>>,
    /// Reset date that last fired.
    pub last_reset_date: Option<DateTime<Utc>>,
    /// Value the counter takes on reset.
    pub reset_index: i64,
}

/// What a reset check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Nothing to do.
    Unchanged,
    /// The policy is `Never` and a stale reset date should be cleared.
    ClearDate,
    /// A reset fired; the counter takes `value`.
    Fired {
        /// New counter value.
        value: i64,
        /// The reset date that fired, now the last reset date.
        fired_at: DateTime<Utc>,
        /// Where the reset date moves to.
        next_date: DateTime<Utc>,
    },
}

impl ResetState {
    /// Captures the reset fields of a config.
    #[must_use]
    pub fn from_config(config: &NumberingConfig) -> Self {
        Self {
            interval: config.reset_interval,
            reset_date: config.reset_date,
            last_reset_date: config.last_reset_date,
            reset_index: config.reset_index.unwrap_or(0),
        }
    }

    /// Decides whether a reset fires at `now` and, if so, moves the dates
    /// forward so the same reset date never fires twice.
    pub fn check(&mut self, now: DateTime<Utc>) -> ResetOutcome {
        if self.interval == ResetInterval::Never {
            if self.reset_date.take().is_some() {
                return ResetOutcome::ClearDate;
            }
            return ResetOutcome::Unchanged;
        }

        let Some(due) = self.reset_date else {
            return ResetOutcome::Unchanged;
        };
        if now < due || self.last_reset_date.is_some_and(|last| last >= due) {
            return ResetOutcome::Unchanged;
        }

        let next_date = advance(due, self.interval);
        self.last_reset_date = Some(due);
        self.reset_date = Some(next_date);
        ResetOutcome::Fired { value: self.reset_index, fired_at: due, next_date }
    }
}

fn advance(date: DateTime<Utc>, interval: ResetInterval) -> DateTime<Utc> {
    let next = match interval {
        ResetInterval::Never | ResetInterval::Once => None,
        ResetInterval::Daily => date.checked_add_signed(Duration::days(1)),
        ResetInterval::Monthly => date.checked_add_months(Months::new(1)),
        ResetInterval::Yearly => date.checked_add_months(Months::new(12)),
    };
    next.unwrap_or(date)
}
