pub mod waterfall;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{CreditAdjustmentMode, RoundingPolicy};
use crate::decimal::Money;
use crate::member::{Member, MemberBill, PaymentMade};
use crate::types::CreditAdjustment;

pub use waterfall::{CreditAllocation, CreditWaterfall, WaterfallPriority};

/// what a member owed going into the new period, before payments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorBalance {
    pub principal: Money,
    pub interest: Money,
    /// dated parts of the balance, oldest first
    ///
    /// Interest runs on a slice from its `since` date. A part of the balance
    /// no slice covers never accrues.
    pub slices: Vec<ArrearsSlice>,
}

/// part of a balance and the date interest on it runs from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrearsSlice {
    pub principal: Money,
    pub interest: Money,
    pub since: NaiveDate,
}

impl ArrearsSlice {
    pub fn is_zero(&self) -> bool {
        self.principal.is_zero() && self.interest.is_zero()
    }

    /// interest on the slice has started running before `date`
    pub fn is_overdue_at(&self, date: NaiveDate) -> bool {
        self.since < date
    }
}

/// sorts slices oldest first, merges slices sharing a date and drops empty ones
pub fn normalize_slices(mut slices: Vec<ArrearsSlice>) -> Vec<ArrearsSlice> {
    slices.sort_by_key(|slice| slice.since);

    let mut merged: Vec<ArrearsSlice> = Vec::with_capacity(slices.len());
    for slice in slices.into_iter().filter(|slice| !slice.is_zero()) {
        match merged.last_mut() {
            Some(last) if last.since == slice.since => {
                last.principal = last.principal + slice.principal;
                last.interest = last.interest + slice.interest;
            }
            _ => merged.push(slice),
        }
    }
    merged
}

/// slices to store on a new bill starting at `period_from`
///
/// Slices that accrued during the run are charged through `period_from`.
/// Slices not yet due keep their own date.
pub fn carry_forward(unpaid: &[ArrearsSlice], period_from: NaiveDate) -> Vec<ArrearsSlice> {
    normalize_slices(
        unpaid
            .iter()
            .map(|slice| ArrearsSlice {
                since: slice.since.max(period_from),
                ..*slice
            })
            .collect(),
    )
}

impl PriorBalance {
    /// balance carried by the member's previous bill
    ///
    /// The bill's dated arrears keep their slices. The rest of the balance,
    /// the bill's own charges and interest included, falls due on its
    /// `due_date`.
    pub fn from_bill(bill: &MemberBill) -> Self {
        let components = bill.components();
        let principal = components.principal_part();
        let interest = components.interest_part();

        let mut slices = bill.arrears_slices.clone();
        let dated_principal: Money = slices.iter().map(|slice| slice.principal).sum();
        let dated_interest: Money = slices.iter().map(|slice| slice.interest).sum();
        slices.push(ArrearsSlice {
            principal: (principal - dated_principal).non_negative(),
            interest: (interest - dated_interest).non_negative(),
            since: bill.due_date,
        });

        Self {
            principal,
            interest,
            slices: normalize_slices(slices),
        }
    }

    /// opening balances of a member that has never been billed
    ///
    /// Undated opening arrears first accrue once the first bill falls due.
    pub fn opening(member: &Member) -> Self {
        let principal = member.principal_arrears.non_negative();
        let interest = member.interest_arrears.non_negative();
        let slices = member
            .arrears_since
            .map(|since| vec![ArrearsSlice { principal, interest, since }])
            .unwrap_or_default();

        Self {
            principal,
            interest,
            slices: normalize_slices(slices),
        }
    }

    pub fn total(&self) -> Money {
        self.principal + self.interest
    }
}

/// opening arrears of the new bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrearsResolution {
    pub principle_arrears: Money,
    pub interest_arrears: Money,
    pub allocation: CreditAllocation,
}

impl ArrearsResolution {
    pub fn total(&self) -> Money {
        self.principle_arrears + self.interest_arrears
    }

    /// what is still unpaid of each slice, oldest first
    ///
    /// Remaining arrears are attributed to the oldest slices before newer
    /// ones, so a part payment clears the most recent charges first.
    pub fn unpaid_slices(&self, slices: &[ArrearsSlice]) -> Vec<ArrearsSlice> {
        let mut principal = self.principle_arrears;
        let mut interest = self.interest_arrears;

        slices
            .iter()
            .map(|slice| {
                let part = ArrearsSlice {
                    principal: principal.min(slice.principal),
                    interest: interest.min(slice.interest),
                    since: slice.since,
                };
                principal = principal - part.principal;
                interest = interest - part.interest;
                part
            })
            .filter(|slice| !slice.is_zero())
            .collect()
    }
}

/// Splits what is still unpaid on a prior bill into principal and interest
/// arrears for the next one.
#[derive(Debug, Clone)]
pub struct ArrearsResolver {
    order: CreditAdjustment,
    mode: CreditAdjustmentMode,
    rounding: RoundingPolicy,
}

impl ArrearsResolver {
    pub fn new(order: CreditAdjustment, mode: CreditAdjustmentMode, rounding: RoundingPolicy) -> Self {
        Self { order, mode, rounding }
    }

    pub fn resolve(&self, prior: &PriorBalance, payment: &PaymentMade) -> ArrearsResolution {
        let allocation = CreditWaterfall::for_order(self.order).allocate(
            payment.total(),
            prior.principal,
            prior.interest,
        );

        let (principal, interest) = match self.mode {
            CreditAdjustmentMode::Waterfall => (
                (prior.principal - allocation.to_principal).non_negative(),
                (prior.interest - allocation.to_interest).non_negative(),
            ),
            CreditAdjustmentMode::Proportional => self.split_proportionally(prior, payment.total()),
        };

        ArrearsResolution {
            principle_arrears: principal.round_with(&self.rounding),
            interest_arrears: interest.round_with(&self.rounding),
            allocation,
        }
    }

    /// unpaid amount split by the prior principal/interest mix; the interest
    /// share takes the rounding remainder so the parts add up to the unpaid total
    fn split_proportionally(&self, prior: &PriorBalance, paid: Money) -> (Money, Money) {
        let total = prior.total();
        if total.is_zero() {
            return (Money::ZERO, Money::ZERO);
        }

        let unpaid = (total - paid).non_negative().round_with(&self.rounding);
        let principal = Money::from_decimal(unpaid.as_decimal() * prior.principal.as_decimal() / total.as_decimal())
            .round_with(&self.rounding)
            .min(unpaid);

        (principal, (unpaid - principal).non_negative())
    }
}
