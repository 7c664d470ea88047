use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::arrears::ArrearsSlice;
use crate::components::BillComponents;
use crate::decimal::Money;
use crate::types::{BillLot, BillStatus, HeadingId, MemberBillId, MemberId, SocietyBillId, SocietyId};

/// billing subject (flat, shop, unit) of a society
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub id_society: SocietyId,
    /// ordering key for bill numbering
    pub unit_no: String,
    pub name: String,
    /// opening principal balance, used until the member has a bill
    pub principal_arrears: Money,
    /// opening interest balance, used until the member has a bill
    pub interest_arrears: Money,
    /// date the opening balances fell due; no interest accrues on them without one
    pub arrears_since: Option<NaiveDate>,
    pub headings: Vec<MemberHeading>,
}

impl Member {
    pub fn new(id_society: SocietyId, unit_no: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            id_society,
            unit_no: unit_no.into(),
            name: name.into(),
            principal_arrears: Money::ZERO,
            interest_arrears: Money::ZERO,
            arrears_since: None,
            headings: Vec::new(),
        }
    }

    pub fn with_heading(mut self, id_society_heading: HeadingId, amount: Money) -> Self {
        self.headings.push(MemberHeading::new(id_society_heading, amount));
        self
    }

    pub fn with_opening_arrears(mut self, principal: Money, interest: Money, since: NaiveDate) -> Self {
        self.principal_arrears = principal;
        self.interest_arrears = interest;
        self.arrears_since = Some(since);
        self
    }
}

/// recurring charge line of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberHeading {
    pub id_society_heading: HeadingId,
    pub curr_amount: Money,
    /// amount taking effect from the next published bill
    pub next_amount: Money,
}

impl MemberHeading {
    pub fn new(id_society_heading: HeadingId, amount: Money) -> Self {
        Self {
            id_society_heading,
            curr_amount: amount,
            next_amount: amount,
        }
    }

    /// schedule a rate change for the following cycle
    pub fn schedule(mut self, next_amount: Money) -> Self {
        self.next_amount = next_amount;
        self
    }
}

/// payments received against a bill, supplied by receipt reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentMade {
    pub before_due_date: Money,
    pub after_due_date: Money,
}

impl PaymentMade {
    pub fn new(before_due_date: Money, after_due_date: Money) -> Self {
        Self {
            before_due_date,
            after_due_date,
        }
    }

    pub fn total(&self) -> Money {
        self.before_due_date + self.after_due_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeKind {
    Heading,
    Gst,
}

/// one printed line of the new-period charges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeLine {
    pub id_society_heading: HeadingId,
    pub name: String,
    pub kind: ChargeKind,
    pub amount: Money,
}

/// one member's bill within a lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBill {
    pub id: MemberBillId,
    pub id_society_bill: SocietyBillId,
    pub id_society: SocietyId,
    pub id_member: MemberId,
    pub bill_lot: BillLot,
    pub bill_no: u64,
    pub principle_arrears: Money,
    pub interest_arrears: Money,
    pub interest_amount: Money,
    pub bill_amount: Money,
    pub total_bill_amount: Money,
    pub status: BillStatus,
    pub due_date: NaiveDate,
    /// dated parts of the opening arrears, oldest first; the rest of the
    /// balance falls due on `due_date`
    pub arrears_slices: Vec<ArrearsSlice>,
    /// read-only here; kept current by receipt reconciliation
    pub payment_made: PaymentMade,
    pub charges: Vec<ChargeLine>,
}

impl MemberBill {
    pub fn components(&self) -> BillComponents {
        BillComponents::new(
            self.principle_arrears,
            self.interest_arrears,
            self.interest_amount,
            self.bill_amount,
        )
    }

    /// total still owed after recorded payments, never negative
    pub fn unpaid(&self) -> Money {
        (self.total_bill_amount - self.payment_made.total()).non_negative()
    }
}

/// `curr_amount <- next_amount` for one member heading after publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingAdvance {
    pub id_member: MemberId,
    pub id_society_heading: HeadingId,
    pub from_amount: Money,
    pub to_amount: Money,
}

/// member as captured at the start of a run, with its latest bill
#[derive(Debug, Clone, PartialEq)]
pub struct MemberSnapshot {
    pub member: Member,
    pub prior_bill: Option<MemberBill>,
}
