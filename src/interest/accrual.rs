use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::config::{RateBasis, RoundingPolicy};
use crate::decimal::{Money, Rate};
use crate::errors::{GenerationError, Result};
use crate::interest::{InterestCalculation, InterestInput, InterestPolicy};
use crate::types::{CalculationPeriod, InterestType};

/// day count convention for interest calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DayCountConvention {
    /// actual days / 365
    Actual365,
    /// actual days / 360
    Actual360,
    /// 30 days per month / 360 days per year
    Thirty360,
    /// actual days / actual days in year (handles leap years)
    ActualActual,
}

/// engine for accruing interest on overdue society dues
#[derive(Debug, Clone)]
pub struct AccrualEngine {
    pub convention: DayCountConvention,
    pub rate_basis: RateBasis,
    pub rounding: RoundingPolicy,
}

impl AccrualEngine {
    pub fn new(convention: DayCountConvention, rate_basis: RateBasis, rounding: RoundingPolicy) -> Self {
        Self {
            convention,
            rate_basis,
            rounding,
        }
    }

    /// signed days between dates based on convention
    pub fn calculate_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        match self.convention {
            DayCountConvention::Actual365
            | DayCountConvention::Actual360
            | DayCountConvention::ActualActual => (end - start).num_days(),
            DayCountConvention::Thirty360 => days_30_360(start, end),
        }
    }

    /// get year basis for the convention
    pub fn year_basis(&self, year: i32) -> u32 {
        match self.convention {
            DayCountConvention::Actual365 => 365,
            DayCountConvention::Actual360 | DayCountConvention::Thirty360 => 360,
            DayCountConvention::ActualActual => {
                if is_leap_year(year) {
                    366
                } else {
                    365
                }
            }
        }
    }

    /// annual rate implied by the society's quoted rate
    pub fn annual_rate(&self, quoted: Rate) -> Rate {
        match self.rate_basis {
            RateBasis::Annual => quoted,
            RateBasis::Monthly => quoted.annualized_from_monthly(),
        }
    }

    /// calculate simple interest (no compounding)
    pub fn calculate_simple_interest(
        &self,
        principal: Money,
        annual_rate: Rate,
        days: u32,
        year_basis: u32,
    ) -> Money {
        let daily_rate = annual_rate.as_decimal() / Decimal::from(year_basis);
        let interest = principal.as_decimal() * daily_rate * Decimal::from(days);
        Money::from_decimal(interest)
    }

    /// interest for whole months at a twelfth of the annual rate
    pub fn calculate_monthly_interest(&self, principal: Money, annual_rate: Rate, months: u32) -> Money {
        let monthly_rate = annual_rate.as_decimal() / Decimal::from(12);
        Money::from_decimal(principal.as_decimal() * monthly_rate * Decimal::from(months))
    }

    /// interest owed on overdue arrears for the elapsed window
    pub fn accrue(&self, policy: &InterestPolicy, input: &InterestInput) -> Result<InterestCalculation> {
        let days = self.calculate_days(input.from, input.to);
        if days < 0 {
            return Err(GenerationError::negative_elapsed(input.from, input.to));
        }
        if policy.rate.is_negative() {
            return Err(GenerationError::InvalidConfiguration {
                message: format!("negative interest rate: {}", policy.rate),
            });
        }
        if input.principal_arrears.is_negative() || input.interest_arrears.is_negative() {
            return Err(GenerationError::InvalidConfiguration {
                message: "interest base cannot be negative".to_string(),
            });
        }

        let base = match policy.interest_type {
            InterestType::Simple => input.principal_arrears,
            InterestType::Reducing => input.principal_arrears + input.interest_arrears,
        };
        let annual_rate = self.annual_rate(policy.rate);
        let days = days as u32;
        let months = whole_months_between(input.from, input.to);

        let interest = if base.is_zero() || days == 0 {
            Money::ZERO
        } else {
            match policy.calculation_period {
                CalculationPeriod::Daily => {
                    let year_basis = self.year_basis(input.to.year());
                    self.calculate_simple_interest(base, annual_rate, days, year_basis)
                }
                CalculationPeriod::Monthly => self.calculate_monthly_interest(base, annual_rate, months),
            }
        };

        Ok(InterestCalculation {
            interest_amount: interest.round_with(&self.rounding),
            accrual_base: base,
            annual_rate,
            days,
            months,
            calculation_method: format!("{:?}/{:?}/{:?}", policy.interest_type, policy.calculation_period, self.convention),
        })
    }
}

/// calculate 30/360 days between dates, signed
fn days_30_360(start: NaiveDate, end: NaiveDate) -> i64 {
    let y1 = start.year() as i64;
    let y2 = end.year() as i64;
    let m1 = start.month() as i64;
    let m2 = end.month() as i64;
    let d1 = start.day().min(30) as i64;
    let d2 = if d1 == 30 { end.day().min(30) as i64 } else { end.day() as i64 };

    360 * (y2 - y1) + 30 * (m2 - m1) + (d2 - d1)
}

/// completed calendar months from `start` to `end`, zero when `end` precedes `start`
fn whole_months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

/// check if year is a leap year
fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
