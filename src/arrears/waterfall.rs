use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::CreditAdjustment;

/// waterfall priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WaterfallPriority {
    First = 1,
    Second = 2,
}

/// order in which a payment settles the two sides of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditWaterfall {
    pub interest_priority: WaterfallPriority,
    pub principal_priority: WaterfallPriority,
}

impl CreditWaterfall {
    /// interest -> principal
    pub fn interest_first() -> Self {
        Self {
            interest_priority: WaterfallPriority::First,
            principal_priority: WaterfallPriority::Second,
        }
    }

    /// principal -> interest
    pub fn principal_first() -> Self {
        Self {
            interest_priority: WaterfallPriority::Second,
            principal_priority: WaterfallPriority::First,
        }
    }

    pub fn for_order(order: CreditAdjustment) -> Self {
        match order {
            CreditAdjustment::InterestFirst => Self::interest_first(),
            CreditAdjustment::PrincipalFirst => Self::principal_first(),
        }
    }

    /// apply `payment` against the given balances in priority order
    pub fn allocate(&self, payment: Money, principal: Money, interest: Money) -> CreditAllocation {
        let mut remaining = payment.non_negative();
        let mut allocation = CreditAllocation::default();

        let mut priorities = [
            (self.interest_priority, Component::Interest),
            (self.principal_priority, Component::Principal),
        ];
        priorities.sort_by_key(|&(priority, _)| priority);

        for (_, component) in priorities {
            let (balance, applied) = match component {
                Component::Interest => (interest, &mut allocation.to_interest),
                Component::Principal => (principal, &mut allocation.to_principal),
            };
            let portion = remaining.min(balance.non_negative());
            *applied = portion;
            remaining -= portion;

            if remaining.is_zero() {
                break;
            }
        }

        allocation.excess = remaining;
        allocation
    }
}

#[derive(Debug, Clone, Copy)]
enum Component {
    Interest,
    Principal,
}

/// how a payment was applied to a prior bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreditAllocation {
    pub to_interest: Money,
    pub to_principal: Money,
    /// paid beyond the bill total
    pub excess: Money,
}

impl CreditAllocation {
    pub fn total_applied(&self) -> Money {
        self.to_interest + self.to_principal
    }
}
