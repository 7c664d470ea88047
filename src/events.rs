use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{BillLot, HeadingId, MemberId, SocietyBillId, SocietyId};

/// all events that can be emitted during bill generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingEvent {
    // lot lifecycle events
    LotStarted {
        id_society: SocietyId,
        bill_lot: BillLot,
        member_count: usize,
        timestamp: DateTime<Utc>,
    },
    LotPublished {
        id_society: SocietyId,
        id_society_bill: SocietyBillId,
        bill_lot: BillLot,
        member_count: usize,
        total_billed: Money,
        timestamp: DateTime<Utc>,
    },
    LotAborted {
        id_society: SocietyId,
        bill_lot: BillLot,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // member events
    MemberBilled {
        id_member: MemberId,
        bill_no: u64,
        interest_amount: Money,
        total_bill_amount: Money,
    },
    OverpaymentDetected {
        id_member: MemberId,
        excess: Money,
    },

    // post-publish propagation
    HeadingAdvanced {
        id_member: MemberId,
        id_society_heading: HeadingId,
        old_amount: Money,
        new_amount: Money,
    },
    SocietyPeriodAdvanced {
        id_society: SocietyId,
        cur_period_from: NaiveDate,
        cur_period_to: NaiveDate,
        next_bill_date: NaiveDate,
    },
}

/// event store for collecting events during generation runs
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillingEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: BillingEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = BillingEvent>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[BillingEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
