pub mod accrual;

use chrono::NaiveDate;

use crate::decimal::{Money, Rate};
use crate::types::{CalculationPeriod, InterestType};

pub use accrual::{AccrualEngine, DayCountConvention};

/// interest terms taken from the society snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestPolicy {
    pub interest_type: InterestType,
    /// rate as quoted by the society, see [`crate::config::RateBasis`]
    pub rate: Rate,
    pub calculation_period: CalculationPeriod,
}

/// opening balances and the overdue window they accrue over
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterestInput {
    pub principal_arrears: Money,
    pub interest_arrears: Money,
    /// previous due date
    pub from: NaiveDate,
    /// start of the period being billed
    pub to: NaiveDate,
}

/// interest calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct InterestCalculation {
    pub interest_amount: Money,
    pub accrual_base: Money,
    pub annual_rate: Rate,
    pub days: u32,
    pub months: u32,
    pub calculation_method: String,
}

impl InterestCalculation {
    /// nothing overdue: no window, no base, no interest
    pub fn none() -> Self {
        Self {
            interest_amount: Money::ZERO,
            accrual_base: Money::ZERO,
            annual_rate: Rate::ZERO,
            days: 0,
            months: 0,
            calculation_method: "none".to_string(),
        }
    }

    /// adds the accrual of another slice of the same balance
    pub fn merge(self, other: InterestCalculation) -> Self {
        if self.calculation_method == "none" {
            return other;
        }

        Self {
            interest_amount: self.interest_amount + other.interest_amount,
            accrual_base: self.accrual_base + other.accrual_base,
            annual_rate: self.annual_rate,
            days: self.days.max(other.days),
            months: self.months.max(other.months),
            calculation_method: self.calculation_method,
        }
    }
}
