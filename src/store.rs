//! Persistence seam of the engine.
//!
//! The engine reads one consistent [`BillingSnapshot`] per run and hands
//! everything it produced back as a single [`LotCommit`]. The store is the
//! final authority on lot uniqueness: a commit for an `(id_society,
//! bill_lot)` that already exists is rejected no matter what the engine
//! checked beforehand.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::StoreError;
use crate::member::{HeadingAdvance, Member, MemberBill, MemberSnapshot, PaymentMade};
use crate::society::{Society, SocietyAdvance, SocietyBill, SocietyHeading};
use crate::types::{BillLot, BillStatus, MemberBillId, MemberId, SocietyId};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// everything a generation run reads, captured at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct BillingSnapshot {
    pub society: Society,
    pub headings: Vec<SocietyHeading>,
    pub members: Vec<MemberSnapshot>,
}

/// everything a published lot writes; applied all or nothing
#[derive(Debug, Clone, PartialEq)]
pub struct LotCommit {
    pub society_bill: SocietyBill,
    pub member_bills: Vec<MemberBill>,
    pub society_advance: SocietyAdvance,
    pub heading_advances: Vec<HeadingAdvance>,
}

/// member, society and bill data keyed by society
pub trait BillingStore: Send + Sync {
    /// consistent view of a society, its headings and members with their latest bill
    fn load_snapshot(&self, id_society: SocietyId) -> StoreResult<Option<BillingSnapshot>>;

    fn find_society_bill(&self, id_society: SocietyId, bill_lot: BillLot) -> StoreResult<Option<SocietyBill>>;

    /// persist a lot atomically, enforcing `(id_society, bill_lot)` uniqueness
    /// and the society version captured in the snapshot
    fn commit_lot(&self, commit: LotCommit) -> StoreResult<()>;
}

/// receipt reconciliation: payments recorded against a member bill
pub trait PaymentLedger: Send + Sync {
    fn payment_made(&self, id_member_bill: MemberBillId) -> StoreResult<PaymentMade>;
}

#[derive(Debug, Default)]
struct StoreState {
    societies: HashMap<SocietyId, Society>,
    headings: HashMap<SocietyId, Vec<SocietyHeading>>,
    members: HashMap<SocietyId, Vec<Member>>,
    society_bills: Vec<SocietyBill>,
    member_bills: Vec<MemberBill>,
    payments: HashMap<MemberBillId, PaymentMade>,
    injected_failure: Option<StoreError>,
}

impl StoreState {
    fn latest_bill(&self, id_member: MemberId) -> Option<&MemberBill> {
        self.member_bills.iter().rev().find(|b| b.id_member == id_member)
    }

    fn check_commit(&self, commit: &LotCommit) -> StoreResult<()> {
        let header = &commit.society_bill;
        if self
            .society_bills
            .iter()
            .any(|b| b.id_society == header.id_society && b.bill_lot == header.bill_lot)
        {
            return Err(StoreError::UniqueViolation {
                id_society: header.id_society,
                bill_lot: header.bill_lot,
            });
        }

        let society = self.societies.get(&header.id_society).ok_or_else(|| StoreError::Unavailable {
            message: format!("society {} vanished during generation", header.id_society),
        })?;
        if society.version != commit.society_advance.expected_version {
            return Err(StoreError::VersionConflict {
                id_society: society.id,
                expected: commit.society_advance.expected_version,
                found: society.version,
            });
        }

        if let Some(bill) = commit.member_bills.iter().find(|b| b.id_society_bill != header.id) {
            return Err(StoreError::Unavailable {
                message: format!("member bill {} does not belong to header {}", bill.id, header.id),
            });
        }

        let members = self.members.get(&header.id_society).map(Vec::as_slice).unwrap_or(&[]);
        for advance in &commit.heading_advances {
            let known = members
                .iter()
                .filter(|m| m.id == advance.id_member)
                .flat_map(|m| m.headings.iter())
                .any(|h| h.id_society_heading == advance.id_society_heading);
            if !known {
                return Err(StoreError::Unavailable {
                    message: format!(
                        "member {} has no heading {}",
                        advance.id_member, advance.id_society_heading
                    ),
                });
            }
        }

        match &self.injected_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// in-process store with the same guarantees a relational backend gives:
/// unique lot constraint, optimistic version check, single transaction
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_society(&self, society: Society) {
        self.state.lock().societies.insert(society.id, society);
    }

    pub fn insert_heading(&self, heading: SocietyHeading) {
        self.state.lock().headings.entry(heading.id_society).or_default().push(heading);
    }

    pub fn insert_member(&self, member: Member) {
        self.state.lock().members.entry(member.id_society).or_default().push(member);
    }

    /// seed a historical bill, e.g. one migrated from a previous system
    pub fn insert_member_bill(&self, bill: MemberBill) {
        self.state.lock().member_bills.push(bill);
    }

    /// seed a historical header
    pub fn insert_society_bill(&self, bill: SocietyBill) {
        self.state.lock().society_bills.push(bill);
    }

    /// record receipts against a bill, as reconciliation would
    pub fn record_payment(&self, id_member_bill: MemberBillId, payment: PaymentMade) {
        self.state.lock().payments.insert(id_member_bill, payment);
    }

    /// edit a society outside of generation; bumps its version
    pub fn update_society<F: FnOnce(&mut Society)>(&self, id_society: SocietyId, edit: F) -> bool {
        let mut state = self.state.lock();
        match state.societies.get_mut(&id_society) {
            Some(society) => {
                edit(society);
                society.version += 1;
                true
            }
            None => false,
        }
    }

    /// make the next commit fail with `err` after all checks pass
    pub fn fail_next_commit(&self, err: StoreError) {
        self.state.lock().injected_failure = Some(err);
    }

    pub fn society(&self, id_society: SocietyId) -> Option<Society> {
        self.state.lock().societies.get(&id_society).cloned()
    }

    pub fn members(&self, id_society: SocietyId) -> Vec<Member> {
        self.state.lock().members.get(&id_society).cloned().unwrap_or_default()
    }

    pub fn society_bills(&self, id_society: SocietyId) -> Vec<SocietyBill> {
        self.state
            .lock()
            .society_bills
            .iter()
            .filter(|b| b.id_society == id_society)
            .cloned()
            .collect()
    }

    pub fn member_bills(&self, id_society: SocietyId, bill_lot: BillLot) -> Vec<MemberBill> {
        self.state
            .lock()
            .member_bills
            .iter()
            .filter(|b| b.id_society == id_society && b.bill_lot == bill_lot)
            .cloned()
            .collect()
    }

    pub fn member_bill_count(&self) -> usize {
        self.state.lock().member_bills.len()
    }
}

impl BillingStore for InMemoryStore {
    fn load_snapshot(&self, id_society: SocietyId) -> StoreResult<Option<BillingSnapshot>> {
        let state = self.state.lock();
        let Some(society) = state.societies.get(&id_society) else {
            return Ok(None);
        };

        let members = state
            .members
            .get(&id_society)
            .map(|members| {
                members
                    .iter()
                    .map(|member| MemberSnapshot {
                        member: member.clone(),
                        prior_bill: state.latest_bill(member.id).cloned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(BillingSnapshot {
            society: society.clone(),
            headings: state.headings.get(&id_society).cloned().unwrap_or_default(),
            members,
        }))
    }

    fn find_society_bill(&self, id_society: SocietyId, bill_lot: BillLot) -> StoreResult<Option<SocietyBill>> {
        Ok(self
            .state
            .lock()
            .society_bills
            .iter()
            .find(|b| b.id_society == id_society && b.bill_lot == bill_lot)
            .cloned())
    }

    fn commit_lot(&self, commit: LotCommit) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Err(err) = state.check_commit(&commit) {
            state.injected_failure = None;
            return Err(err);
        }

        let LotCommit {
            mut society_bill,
            member_bills,
            society_advance,
            heading_advances,
        } = commit;

        debug!(
            id_society = %society_bill.id_society,
            bill_lot = society_bill.bill_lot,
            member_bills = member_bills.len(),
            "committing bill lot"
        );

        if let Some(society) = state.societies.get_mut(&society_advance.id_society) {
            society.cur_period_from = society_advance.cur_period_from;
            society.cur_period_to = society_advance.cur_period_to;
            society.next_bill_date = society_advance.next_bill_date;
            society.version += 1;
        }

        if let Some(members) = state.members.get_mut(&society_bill.id_society) {
            for advance in &heading_advances {
                let headings = members
                    .iter_mut()
                    .filter(|m| m.id == advance.id_member)
                    .flat_map(|m| m.headings.iter_mut())
                    .filter(|h| h.id_society_heading == advance.id_society_heading);
                for heading in headings {
                    heading.curr_amount = advance.to_amount;
                }
            }
        }

        state.member_bills.extend(member_bills.into_iter().map(|mut bill| {
            bill.status = BillStatus::Published;
            bill
        }));
        society_bill.status = BillStatus::Published;
        state.society_bills.push(society_bill);
        Ok(())
    }
}

impl PaymentLedger for InMemoryStore {
    fn payment_made(&self, id_member_bill: MemberBillId) -> StoreResult<PaymentMade> {
        Ok(self
            .state
            .lock()
            .payments
            .get(&id_member_bill)
            .copied()
            .unwrap_or_default())
    }
}
