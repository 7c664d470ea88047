use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Rate;
use crate::errors::{GenerationError, Result};
use crate::interest::InterestPolicy;
use crate::period::BillingPeriod;
use crate::types::{
    BillFrequency, BillLot, BillStatus, BillType, CalculationPeriod, CreditAdjustment, HeadingId,
    InterestType, SocietyBillId, SocietyId,
};

/// society row as kept by the data store
///
/// Tag fields are stored loosely typed and parsed once per generation run
/// into a [`SocietySnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Society {
    pub id: SocietyId,
    pub name: String,
    pub bill_frequency: String,
    pub bill_type: String,
    pub interest_type: String,
    /// percentage, e.g. 18 for 18%
    pub interest_rate: Decimal,
    /// days after period end the bill falls due
    pub payment_due_date: u32,
    pub credit_adj_first: String,
    pub period_of_calculation: String,
    /// first day of the open period the next lot bills
    pub cur_period_from: NaiveDate,
    pub cur_period_to: NaiveDate,
    pub next_bill_date: NaiveDate,
    pub gst_enabled: bool,
    /// bumped on every write; generation commits against the version it read
    pub version: u64,
}

/// society-wide charge heading (maintenance, sinking fund, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocietyHeading {
    pub id: HeadingId,
    pub id_society: SocietyId,
    pub name: String,
    pub is_gst: bool,
    pub is_active: bool,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

impl SocietyHeading {
    pub fn new(id_society: SocietyId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            id_society,
            name: name.into(),
            is_gst: false,
            is_active: true,
            effective_from: None,
            effective_to: None,
        }
    }

    pub fn with_gst(mut self) -> Self {
        self.is_gst = true;
        self
    }

    /// active and in effect for some day of `period`
    pub fn applies_to(&self, period: &BillingPeriod) -> bool {
        self.is_active && period.overlaps(self.effective_from, self.effective_to)
    }
}

/// parsed, versioned billing configuration of a society, read once per run
#[derive(Debug, Clone, PartialEq)]
pub struct SocietySnapshot {
    pub id_society: SocietyId,
    pub version: u64,
    pub frequency: BillFrequency,
    pub bill_type: BillType,
    pub interest: InterestPolicy,
    pub credit_adjustment: CreditAdjustment,
    pub payment_due_offset: u32,
    pub gst_enabled: bool,
    pub cur_period_from: NaiveDate,
    pub cur_period_to: NaiveDate,
    pub next_bill_date: NaiveDate,
}

impl SocietySnapshot {
    pub fn from_society(society: &Society) -> Result<Self> {
        if society.cur_period_to <= society.cur_period_from {
            return Err(GenerationError::InvalidPeriod {
                message: format!(
                    "society {} period ends {} on or before it starts {}",
                    society.id, society.cur_period_to, society.cur_period_from
                ),
            });
        }
        if society.next_bill_date <= society.cur_period_to {
            return Err(GenerationError::InvalidPeriod {
                message: format!(
                    "society {} next bill date {} is not after period end {}",
                    society.id, society.next_bill_date, society.cur_period_to
                ),
            });
        }
        if society.interest_rate < Decimal::ZERO {
            return Err(GenerationError::InvalidConfiguration {
                message: format!("society {} has negative interest rate", society.id),
            });
        }

        Ok(Self {
            id_society: society.id,
            version: society.version,
            frequency: society.bill_frequency.parse()?,
            bill_type: society.bill_type.parse()?,
            interest: InterestPolicy {
                interest_type: society.interest_type.parse::<InterestType>()?,
                rate: Rate::from_percent_decimal(society.interest_rate),
                calculation_period: society.period_of_calculation.parse::<CalculationPeriod>()?,
            },
            credit_adjustment: society.credit_adj_first.parse()?,
            payment_due_offset: society.payment_due_date,
            gst_enabled: society.gst_enabled,
            cur_period_from: society.cur_period_from,
            cur_period_to: society.cur_period_to,
            next_bill_date: society.next_bill_date,
        })
    }
}

/// header of one generation run, keyed by `(id_society, bill_lot)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocietyBill {
    pub id: SocietyBillId,
    pub id_society: SocietyId,
    pub bill_lot: BillLot,
    pub bill_date: NaiveDate,
    pub bill_period_from: NaiveDate,
    pub bill_period_to: NaiveDate,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub interest_rate: Rate,
    pub interest_type: InterestType,
    pub credit_adj_first: CreditAdjustment,
    pub bill_type: BillType,
    pub start_bill_no: u64,
    pub end_bill_no: Option<u64>,
    pub member_count: usize,
    pub comments: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl SocietyBill {
    pub fn is_published(&self) -> bool {
        self.status == BillStatus::Published
    }
}

/// period fields written back to the society after a lot is published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocietyAdvance {
    pub id_society: SocietyId,
    /// version read at snapshot time
    pub expected_version: u64,
    pub cur_period_from: NaiveDate,
    pub cur_period_to: NaiveDate,
    pub next_bill_date: NaiveDate,
}
