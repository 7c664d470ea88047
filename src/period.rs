use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{GenerationError, Result};
use crate::types::BillFrequency;

/// boundaries of one billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub period_from: NaiveDate,
    pub period_to: NaiveDate,
    pub due_date: NaiveDate,
    pub next_bill_date: NaiveDate,
}

impl BillingPeriod {
    /// number of calendar days covered, both ends inclusive
    pub fn length_days(&self) -> i64 {
        (self.period_to - self.period_from).num_days() + 1
    }

    /// whether `date` falls inside the period
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.period_from && date <= self.period_to
    }

    /// whether `[from, to]` overlaps the period; open ends are unbounded
    pub fn overlaps(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
        let starts_before_end = from.map_or(true, |f| f <= self.period_to);
        let ends_after_start = to.map_or(true, |t| t >= self.period_from);
        starts_before_end && ends_after_start
    }
}

/// last day of the month a period may start on
///
/// Every month has this day, so stepping by whole months never clamps and
/// a society keeps the same anchor day for good.
pub const MAX_ANCHOR_DAY: u32 = 28;

/// Derives period boundaries from a society's frequency and anchor date.
pub struct PeriodCalculator;

impl PeriodCalculator {
    /// period starting at `period_from`, which must fall on or before the
    /// 28th of its month
    ///
    /// `period_to` is one frequency interval later minus a day, the due date
    /// is `due_offset_days` after `period_to`, and the next bill starts the
    /// day after `period_to`.
    pub fn compute(
        frequency: BillFrequency,
        period_from: NaiveDate,
        due_offset_days: u32,
    ) -> Result<BillingPeriod> {
        if period_from.day() > MAX_ANCHOR_DAY {
            return Err(GenerationError::InvalidPeriod {
                message: format!(
                    "period cannot start on {}: anchor day must be between 1 and {}",
                    period_from, MAX_ANCHOR_DAY
                ),
            });
        }

        let period_end_exclusive = period_from
            .checked_add_months(Months::new(frequency.months()))
            .ok_or_else(|| GenerationError::InvalidPeriod {
                message: format!("{} period from {} overflows the calendar", frequency, period_from),
            })?;
        let period_to = period_end_exclusive - Duration::days(1);
        let due_date = period_to
            .checked_add_signed(Duration::days(due_offset_days as i64))
            .ok_or_else(|| GenerationError::InvalidPeriod {
                message: format!("due date offset {} from {} overflows the calendar", due_offset_days, period_to),
            })?;

        Ok(BillingPeriod {
            period_from,
            period_to,
            due_date,
            next_bill_date: period_end_exclusive,
        })
    }

    /// same as [`PeriodCalculator::compute`] for a raw frequency tag
    pub fn compute_from_tag(tag: &str, period_from: NaiveDate, due_offset_days: u32) -> Result<BillingPeriod> {
        Self::compute(tag.parse()?, period_from, due_offset_days)
    }

    /// the period immediately following `current`
    pub fn advance(
        frequency: BillFrequency,
        current: &BillingPeriod,
        due_offset_days: u32,
    ) -> Result<BillingPeriod> {
        Self::compute(frequency, current.next_bill_date, due_offset_days)
    }

    /// signed whole days from `from` to `to`
    pub fn elapsed_days(from: NaiveDate, to: NaiveDate) -> i64 {
        (to - from).num_days()
    }
}
