//! serializable result of a published bill lot

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::components::BillComponents;
use crate::decimal::Money;
use crate::member::{ChargeLine, MemberBill};
use crate::period::BillingPeriod;
use crate::society::SocietyBill;
use crate::types::{BillLot, MemberBillId, MemberId, SocietyBillId, SocietyId};

/// what one `generate_bill` call published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLotSummary {
    pub id_society_bill: SocietyBillId,
    pub id_society: SocietyId,
    pub bill_lot: BillLot,
    pub bill_date: NaiveDate,
    pub period: BillingPeriod,
    pub member_count: usize,
    pub start_bill_no: u64,
    pub end_bill_no: Option<u64>,
    /// componentwise sum over all member bills
    pub totals: BillComponents,
    pub total_billed: Money,
    pub generated_at: DateTime<Utc>,
    pub bills: Vec<MemberBillLine>,
}

/// printed view of one member bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBillLine {
    pub id: MemberBillId,
    pub id_member: MemberId,
    pub bill_no: u64,
    pub principle_arrears: Money,
    pub interest_arrears: Money,
    pub interest_amount: Money,
    pub bill_amount: Money,
    pub total_bill_amount: Money,
    pub charges: Vec<ChargeLine>,
}

impl MemberBillLine {
    pub fn from_bill(bill: &MemberBill) -> Self {
        MemberBillLine {
            id: bill.id,
            id_member: bill.id_member,
            bill_no: bill.bill_no,
            principle_arrears: bill.principle_arrears,
            interest_arrears: bill.interest_arrears,
            interest_amount: bill.interest_amount,
            bill_amount: bill.bill_amount,
            total_bill_amount: bill.total_bill_amount,
            charges: bill.charges.clone(),
        }
    }
}

impl BillLotSummary {
    pub fn new(header: &SocietyBill, period: BillingPeriod, bills: &[MemberBill]) -> Self {
        let totals: BillComponents = bills.iter().map(MemberBill::components).sum();
        BillLotSummary {
            id_society_bill: header.id,
            id_society: header.id_society,
            bill_lot: header.bill_lot,
            bill_date: header.bill_date,
            period,
            member_count: bills.len(),
            start_bill_no: header.start_bill_no,
            end_bill_no: header.end_bill_no,
            total_billed: totals.total(),
            totals,
            generated_at: header.generated_at,
            bills: bills.iter().map(MemberBillLine::from_bill).collect(),
        }
    }

    /// bill line for a member, if the member was billed in this lot
    pub fn bill_for(&self, id_member: MemberId) -> Option<&MemberBillLine> {
        self.bills.iter().find(|b| b.id_member == id_member)
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
