use serde::{Deserialize, Serialize};
use std::iter::Sum;

use crate::config::RoundingPolicy;
use crate::decimal::Money;
use crate::errors::{GenerationError, Result};

/// the four amounts that make up a member bill
///
/// Each component is rounded once on its own; the total is the sum of the
/// rounded components so printed lines always add up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillComponents {
    pub principal_arrears: Money,
    pub interest_arrears: Money,
    pub interest_amount: Money,
    pub bill_amount: Money,
}

impl BillComponents {
    pub const ZERO: BillComponents = BillComponents {
        principal_arrears: Money::ZERO,
        interest_arrears: Money::ZERO,
        interest_amount: Money::ZERO,
        bill_amount: Money::ZERO,
    };

    pub fn new(
        principal_arrears: Money,
        interest_arrears: Money,
        interest_amount: Money,
        bill_amount: Money,
    ) -> Self {
        Self {
            principal_arrears,
            interest_arrears,
            interest_amount,
            bill_amount,
        }
    }

    pub fn total(&self) -> Money {
        self.principal_arrears + self.interest_arrears + self.interest_amount + self.bill_amount
    }

    /// principal side: old principal plus this period's charges
    pub fn principal_part(&self) -> Money {
        self.principal_arrears + self.bill_amount
    }

    /// interest side: old interest plus interest accrued this period
    pub fn interest_part(&self) -> Money {
        self.interest_arrears + self.interest_amount
    }

    pub fn rounded(&self, policy: &RoundingPolicy) -> Self {
        Self {
            principal_arrears: self.principal_arrears.round_with(policy),
            interest_arrears: self.interest_arrears.round_with(policy),
            interest_amount: self.interest_amount.round_with(policy),
            bill_amount: self.bill_amount.round_with(policy),
        }
    }

    /// componentwise sum
    pub fn combine(self, other: BillComponents) -> Self {
        Self {
            principal_arrears: self.principal_arrears + other.principal_arrears,
            interest_arrears: self.interest_arrears + other.interest_arrears,
            interest_amount: self.interest_amount + other.interest_amount,
            bill_amount: self.bill_amount + other.bill_amount,
        }
    }

    /// every component must be zero or positive
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("principal_arrears", self.principal_arrears),
            ("interest_arrears", self.interest_arrears),
            ("interest_amount", self.interest_amount),
            ("bill_amount", self.bill_amount),
        ];
        for (name, value) in fields {
            if value.is_negative() {
                return Err(GenerationError::InvalidConfiguration {
                    message: format!("{} is negative: {}", name, value),
                });
            }
        }
        Ok(())
    }
}

impl Sum for BillComponents {
    fn sum<I: Iterator<Item = BillComponents>>(iter: I) -> Self {
        iter.fold(BillComponents::ZERO, BillComponents::combine)
    }
}

impl<'a> Sum<&'a BillComponents> for BillComponents {
    fn sum<I: Iterator<Item = &'a BillComponents>>(iter: I) -> Self {
        iter.fold(BillComponents::ZERO, |acc, c| acc.combine(*c))
    }
}
