use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use society_billing::{
    BillLotGenerator, BillingConfig, BillingEvent, BillingSnapshot, BillingStore, CancellationToken,
    CreditAdjustmentMode, GenerateBillParams, GenerationError, GenerationState, InMemoryStore, LotCommit,
    Member, MemberBillId, MemberHeading, Money, PaymentLedger, PaymentMade, SafeTimeProvider, Society,
    SocietyBill, SocietyHeading, SocietyId, StoreError, TimeSource, Uuid,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn clock(y: i32, m: u32, d: u32) -> SafeTimeProvider {
    SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()))
}

struct Fixture {
    store: InMemoryStore,
    society: Society,
    maintenance: SocietyHeading,
}

impl Fixture {
    /// monthly society billing April 2024, 18% simple daily interest, interest first
    fn new() -> Self {
        Self::with(|_| {})
    }

    fn with(edit: impl FnOnce(&mut Society)) -> Self {
        let store = InMemoryStore::new();
        let mut society = Society {
            id: Uuid::new_v4(),
            name: "Sea Breeze CHS".to_string(),
            bill_frequency: "monthly".to_string(),
            bill_type: "regular".to_string(),
            interest_type: "simple".to_string(),
            interest_rate: dec!(18),
            payment_due_date: 15,
            credit_adj_first: "interest".to_string(),
            period_of_calculation: "daily".to_string(),
            cur_period_from: date(2024, 4, 1),
            cur_period_to: date(2024, 4, 30),
            next_bill_date: date(2024, 5, 1),
            gst_enabled: false,
            version: 0,
        };
        edit(&mut society);
        store.insert_society(society.clone());

        let maintenance = SocietyHeading::new(society.id, "Maintenance");
        store.insert_heading(maintenance.clone());

        Self {
            store,
            society,
            maintenance,
        }
    }

    /// member owing 1000 principal and 50 interest since 2 March, maintenance 500
    fn scenario_member(&self, unit_no: &str) -> Member {
        let member = Member::new(self.society.id, unit_no, "R. Shah")
            .with_heading(self.maintenance.id, Money::from_major(500))
            .with_opening_arrears(Money::from_major(1000), Money::from_major(50), date(2024, 3, 2));
        self.store.insert_member(member.clone());
        member
    }

    fn plain_member(&self, unit_no: &str, maintenance: i64) -> Member {
        let member = Member::new(self.society.id, unit_no, "Resident")
            .with_heading(self.maintenance.id, Money::from_major(maintenance));
        self.store.insert_member(member.clone());
        member
    }

    fn params(&self, bill_lot: u32, start_bill_no: u64) -> GenerateBillParams {
        GenerateBillParams::new(self.society.id, bill_lot, date(2024, 4, 1), start_bill_no)
    }

    fn generator(&self) -> BillLotGenerator<'_> {
        BillLotGenerator::for_store(&self.store, BillingConfig::sequential())
    }
}

#[test]
fn test_simple_interest_scenario() {
    let f = Fixture::new();
    let member = f.scenario_member("A-101");

    let summary = f.generator().generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();

    let line = summary.bill_for(member.id).unwrap();
    assert_eq!(line.principle_arrears, Money::from_major(1000));
    assert_eq!(line.interest_arrears, Money::from_major(50));
    assert_eq!(line.interest_amount.as_decimal(), dec!(14.79));
    assert_eq!(line.bill_amount, Money::from_major(500));
    assert_eq!(line.total_bill_amount.as_decimal(), dec!(1564.79));

    let stored = f.store.member_bills(f.society.id, 1);
    assert_eq!(stored.len(), 1);
    assert!(stored[0].status == society_billing::BillStatus::Published);
    assert_eq!(stored[0].due_date, date(2024, 5, 15));
}

#[test]
fn test_duplicate_lot_is_rejected() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    let mut generator = f.generator();

    generator.generate_bill(f.params(7, 1), &clock(2024, 4, 1)).unwrap();
    let bills_after_first = f.store.member_bill_count();

    let err = generator.generate_bill(f.params(7, 100), &clock(2024, 4, 2)).unwrap_err();

    assert!(matches!(err, GenerationError::DuplicateLot { bill_lot: 7, .. }));
    assert_eq!(f.store.society_bills(f.society.id).len(), 1);
    assert_eq!(f.store.member_bill_count(), bills_after_first);
    assert_eq!(generator.last_run().unwrap().state, GenerationState::Aborted);
}

#[test]
fn test_store_unique_violation_maps_to_duplicate() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    // another writer wins the race between the pre-check and the commit
    f.store.fail_next_commit(StoreError::UniqueViolation {
        id_society: f.society.id,
        bill_lot: 3,
    });

    let err = f.generator().generate_bill(f.params(3, 1), &clock(2024, 4, 1)).unwrap_err();

    assert!(matches!(err, GenerationError::DuplicateLot { bill_lot: 3, .. }));
    assert_eq!(f.store.member_bill_count(), 0);
    assert_eq!(f.store.society(f.society.id).unwrap().version, 0);
}

/// store whose society is edited by someone else right after every snapshot read
struct RacingStore<'a> {
    inner: &'a InMemoryStore,
}

impl BillingStore for RacingStore<'_> {
    fn load_snapshot(&self, id_society: SocietyId) -> Result<Option<BillingSnapshot>, StoreError> {
        let snapshot = self.inner.load_snapshot(id_society)?;
        self.inner.update_society(id_society, |s| s.payment_due_date = 20);
        Ok(snapshot)
    }

    fn find_society_bill(&self, id_society: SocietyId, bill_lot: u32) -> Result<Option<SocietyBill>, StoreError> {
        self.inner.find_society_bill(id_society, bill_lot)
    }

    fn commit_lot(&self, commit: LotCommit) -> Result<(), StoreError> {
        self.inner.commit_lot(commit)
    }
}

impl PaymentLedger for RacingStore<'_> {
    fn payment_made(&self, id_member_bill: MemberBillId) -> Result<PaymentMade, StoreError> {
        self.inner.payment_made(id_member_bill)
    }
}

#[test]
fn test_concurrent_society_edit_fails_commit() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    let racing = RacingStore { inner: &f.store };

    let err = BillLotGenerator::for_store(&racing, BillingConfig::sequential())
        .generate_bill(f.params(1, 1), &clock(2024, 4, 1))
        .unwrap_err();

    assert!(matches!(
        err,
        GenerationError::PersistenceFailure(StoreError::VersionConflict { expected: 0, found: 1, .. })
    ));
    assert!(f.store.society_bills(f.society.id).is_empty());
    assert_eq!(f.store.society(f.society.id).unwrap().cur_period_from, date(2024, 4, 1));
}

#[test]
fn test_unknown_society() {
    let store = InMemoryStore::new();
    let missing = Uuid::new_v4();

    let err = BillLotGenerator::for_store(&store, BillingConfig::sequential())
        .generate_bill(GenerateBillParams::new(missing, 1, date(2024, 4, 1), 1), &clock(2024, 4, 1))
        .unwrap_err();

    assert!(matches!(err, GenerationError::SocietyNotFound { id_society } if id_society == missing));
}

#[test]
fn test_invalid_frequency_aborts_in_validation() {
    let f = Fixture::with(|s| s.bill_frequency = "fortnightly".to_string());
    f.plain_member("A-101", 500);
    let mut generator = f.generator();

    let err = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap_err();

    assert!(matches!(err, GenerationError::InvalidFrequency { ref tag } if tag == "fortnightly"));
    assert_eq!(
        generator.last_run().unwrap().path(),
        vec![GenerationState::NotStarted, GenerationState::Validating, GenerationState::Aborted]
    );
}

#[test]
fn test_member_without_charges_gets_zero_bill() {
    let f = Fixture::new();
    let member = Member::new(f.society.id, "A-101", "Vacant");
    f.store.insert_member(member.clone());

    let summary = f.generator().generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();

    let line = summary.bill_for(member.id).unwrap();
    assert_eq!(line.total_bill_amount, Money::ZERO);
    assert_eq!(summary.member_count, 1);
}

#[test]
fn test_society_advances_after_publish() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);

    let summary = f.generator().generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();

    assert_eq!(summary.period.period_to, date(2024, 4, 30));
    let society = f.store.society(f.society.id).unwrap();
    assert_eq!(society.cur_period_from, date(2024, 5, 1));
    assert_eq!(society.cur_period_to, date(2024, 5, 31));
    assert_eq!(society.next_bill_date, date(2024, 6, 1));
    assert_eq!(society.version, 1);
}

#[test]
fn test_quarterly_period_and_due_date() {
    let f = Fixture::with(|s| {
        s.bill_frequency = "Quarterly".to_string();
        s.cur_period_to = date(2024, 6, 30);
        s.next_bill_date = date(2024, 7, 1);
    });
    f.plain_member("A-101", 1500);

    let summary = f.generator().generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();

    assert_eq!(summary.period.period_to, date(2024, 6, 30));
    assert_eq!(summary.period.due_date, date(2024, 7, 15));
    assert_eq!(f.store.society(f.society.id).unwrap().cur_period_from, date(2024, 7, 1));
}

#[test]
fn test_bill_numbers_follow_unit_order() {
    let f = Fixture::new();
    let b201 = f.plain_member("B-201", 500);
    let a101 = f.plain_member("A-101", 500);
    let a102 = f.plain_member("A-102", 500);

    let summary = f.generator().generate_bill(f.params(1, 101), &clock(2024, 4, 1)).unwrap();

    assert_eq!(summary.bill_for(a101.id).unwrap().bill_no, 101);
    assert_eq!(summary.bill_for(a102.id).unwrap().bill_no, 102);
    assert_eq!(summary.bill_for(b201.id).unwrap().bill_no, 103);
    assert_eq!(summary.start_bill_no, 101);
    assert_eq!(summary.end_bill_no, Some(103));

    let header = &f.store.society_bills(f.society.id)[0];
    assert_eq!(header.end_bill_no, Some(103));
    assert_eq!(header.member_count, 3);
}

#[test]
fn test_fully_paid_prior_bill_leaves_no_arrears() {
    let f = Fixture::new();
    let member = f.plain_member("A-101", 500);
    let mut generator = f.generator();

    let april = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    let line = april.bill_for(member.id).unwrap();
    f.store.record_payment(line.id, PaymentMade::new(Money::from_major(300), Money::from_major(200)));

    let may = generator
        .generate_bill(GenerateBillParams::new(f.society.id, 2, date(2024, 5, 1), 2), &clock(2024, 5, 1))
        .unwrap();
    let line = may.bill_for(member.id).unwrap();

    assert_eq!(line.principle_arrears, Money::ZERO);
    assert_eq!(line.interest_arrears, Money::ZERO);
    assert_eq!(line.interest_amount, Money::ZERO);
    assert_eq!(line.total_bill_amount, Money::from_major(500));
}

#[test]
fn test_unpaid_bill_rolls_into_next_lot() {
    let f = Fixture::new();
    let member = f.scenario_member("A-101");
    let mut generator = f.generator();

    generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    let may = generator
        .generate_bill(GenerateBillParams::new(f.society.id, 2, date(2024, 5, 1), 2), &clock(2024, 5, 1))
        .unwrap();
    let line = may.bill_for(member.id).unwrap();

    // April's charges join principal, April's interest joins interest arrears
    assert_eq!(line.principle_arrears, Money::from_major(1500));
    assert_eq!(line.interest_arrears.as_decimal(), dec!(64.79));
    // only the carried 1000 was overdue during April: 30 days at 18%
    assert_eq!(line.interest_amount.as_decimal(), dec!(14.79));
    assert_eq!(line.total_bill_amount.as_decimal(), dec!(2079.58));
}

#[test]
fn test_new_charges_accrue_only_once_due_over_many_lots() {
    let f = Fixture::new();
    let carried = f.scenario_member("A-101");
    let fresh = f.plain_member("A-102", 500);
    let mut generator = f.generator();

    let lots: Vec<_> = (1..=4u32)
        .map(|lot| {
            let month = lot + 3;
            generator
                .generate_bill(
                    GenerateBillParams::new(f.society.id, lot, date(2024, month, 1), lot as u64 * 10),
                    &clock(2024, month, 1),
                )
                .unwrap()
        })
        .collect();

    // June: April's 500 only accrues from its 15 May due date, 17 days
    let june_fresh = lots[2].bill_for(fresh.id).unwrap();
    assert_eq!(june_fresh.interest_amount.as_decimal(), dec!(4.19));

    // the carried 1000 runs all of May (15.29) on top of the same 4.19
    let june_carried = lots[2].bill_for(carried.id).unwrap();
    assert_eq!(june_carried.principle_arrears, Money::from_major(2000));
    assert_eq!(june_carried.interest_amount.as_decimal(), dec!(19.48));
    assert_eq!(june_carried.total_bill_amount.as_decimal(), dec!(2599.06));

    // July: April's 500 for all of June (7.40), May's 500 from 15 June (3.95)
    let july_fresh = lots[3].bill_for(fresh.id).unwrap();
    assert_eq!(july_fresh.interest_amount.as_decimal(), dec!(11.35));

    let july_carried = lots[3].bill_for(carried.id).unwrap();
    assert_eq!(july_carried.interest_amount.as_decimal(), dec!(26.14));

    // stored bills keep the not-yet-due charges apart
    let stored = f.store.member_bills(f.society.id, 3);
    let bill = stored.iter().find(|b| b.id_member == carried.id).unwrap();
    let since: Vec<NaiveDate> = bill.arrears_slices.iter().map(|slice| slice.since).collect();
    assert_eq!(since, vec![date(2024, 6, 1), date(2024, 6, 15)]);
}

fn second_lot_with_payment(order: &str, mode: CreditAdjustmentMode) -> society_billing::MemberBillLine {
    let f = Fixture::with(|s| s.credit_adj_first = order.to_string());
    let member = f.scenario_member("A-101");
    let config = BillingConfig::sequential().with_credit_adjustment_mode(mode);
    let mut generator = BillLotGenerator::for_store(&f.store, config);

    let april = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    let bill = april.bill_for(member.id).unwrap();
    f.store.record_payment(bill.id, PaymentMade::new(Money::ZERO, Money::from_major(600)));

    let may = generator
        .generate_bill(GenerateBillParams::new(f.society.id, 2, date(2024, 5, 1), 2), &clock(2024, 5, 1))
        .unwrap();
    may.bill_for(member.id).unwrap().clone()
}

#[test]
fn test_credit_order_decides_what_keeps_accruing() {
    let interest_first = second_lot_with_payment("interest", CreditAdjustmentMode::Waterfall);
    assert_eq!(interest_first.interest_arrears, Money::ZERO);
    assert_eq!(interest_first.principle_arrears.as_decimal(), dec!(964.79));
    assert_eq!(interest_first.interest_amount.as_decimal(), dec!(14.27));

    let principal_first = second_lot_with_payment("principle", CreditAdjustmentMode::Waterfall);
    assert_eq!(principal_first.principle_arrears, Money::from_major(900));
    assert_eq!(principal_first.interest_arrears.as_decimal(), dec!(64.79));
    assert_eq!(principal_first.interest_amount.as_decimal(), dec!(13.32));
}

#[test]
fn test_proportional_mode_ignores_order() {
    let a = second_lot_with_payment("interest", CreditAdjustmentMode::Proportional);
    let b = second_lot_with_payment("principle", CreditAdjustmentMode::Proportional);

    assert_eq!(a.principle_arrears.as_decimal(), dec!(924.84));
    assert_eq!(a.interest_arrears.as_decimal(), dec!(39.95));
    assert_eq!(a.principle_arrears, b.principle_arrears);
    assert_eq!(a.interest_arrears, b.interest_arrears);
    assert_eq!(a.interest_amount, b.interest_amount);
}

#[test]
fn test_overpayment_is_reported_not_carried() {
    let f = Fixture::new();
    let member = f.plain_member("A-101", 500);
    let mut generator = f.generator();

    let april = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    let bill = april.bill_for(member.id).unwrap();
    f.store.record_payment(bill.id, PaymentMade::new(Money::from_major(2000), Money::ZERO));

    let may = generator
        .generate_bill(GenerateBillParams::new(f.society.id, 2, date(2024, 5, 1), 2), &clock(2024, 5, 1))
        .unwrap();

    assert_eq!(may.bill_for(member.id).unwrap().total_bill_amount, Money::from_major(500));
    assert!(generator.events().iter().any(|e| matches!(
        e,
        BillingEvent::OverpaymentDetected { excess, .. } if *excess == Money::from_major(1500)
    )));
}

#[test]
fn test_heading_amounts_advance_after_publish() {
    let f = Fixture::new();
    let mut member = Member::new(f.society.id, "A-101", "R. Shah");
    member
        .headings
        .push(MemberHeading::new(f.maintenance.id, Money::from_major(500)).schedule(Money::from_major(650)));
    f.store.insert_member(member.clone());
    let mut generator = f.generator();

    let april = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    assert_eq!(april.bill_for(member.id).unwrap().bill_amount, Money::from_major(500));
    assert_eq!(f.store.members(f.society.id)[0].headings[0].curr_amount, Money::from_major(650));

    let may = generator
        .generate_bill(GenerateBillParams::new(f.society.id, 2, date(2024, 5, 1), 2), &clock(2024, 5, 1))
        .unwrap();
    assert_eq!(may.bill_for(member.id).unwrap().bill_amount, Money::from_major(650));
}

#[test]
fn test_gst_headings_add_surcharge_line() {
    let f = Fixture::with(|s| s.gst_enabled = true);
    let club_house = SocietyHeading::new(f.society.id, "Club House").with_gst();
    f.store.insert_heading(club_house.clone());
    let member = Member::new(f.society.id, "A-101", "R. Shah")
        .with_heading(f.maintenance.id, Money::from_major(500))
        .with_heading(club_house.id, Money::from_major(200));
    f.store.insert_member(member.clone());

    let summary = f.generator().generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    let line = summary.bill_for(member.id).unwrap();

    assert_eq!(line.bill_amount, Money::from_major(736));
    assert_eq!(line.charges.len(), 3);
}

#[test]
fn test_member_failure_aborts_whole_lot() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    let broken = Member::new(f.society.id, "A-102", "R. Shah").with_heading(Uuid::new_v4(), Money::from_major(500));
    f.store.insert_member(broken.clone());
    let mut generator = f.generator();

    let err = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap_err();

    match err {
        GenerationError::MemberComputationFailure { member_id, cause } => {
            assert_eq!(member_id, broken.id);
            assert!(matches!(*cause, GenerationError::UnknownHeading { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(f.store.society_bills(f.society.id).is_empty());
    assert_eq!(f.store.member_bill_count(), 0);
    let society = f.store.society(f.society.id).unwrap();
    assert_eq!(society.cur_period_from, date(2024, 4, 1));
    assert_eq!(society.version, 0);
    assert!(!generator.events().iter().any(|e| matches!(e, BillingEvent::MemberBilled { .. })));
}

#[test]
fn test_cancelled_run_persists_nothing() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    let token = CancellationToken::new();
    let mut generator = f.generator().with_cancellation(token.clone());
    token.cancel();

    let err = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap_err();

    assert!(matches!(err, GenerationError::Cancelled { bill_lot: 1, .. }));
    assert!(f.store.society_bills(f.society.id).is_empty());
    assert_eq!(generator.last_run().unwrap().state, GenerationState::Aborted);
}

#[test]
fn test_retry_after_store_failure() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    f.store.fail_next_commit(StoreError::Unavailable {
        message: "connection reset".to_string(),
    });
    let mut generator = f.generator();

    let err = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap_err();
    assert!(matches!(err, GenerationError::PersistenceFailure(StoreError::Unavailable { .. })));
    assert_eq!(f.store.member_bill_count(), 0);

    let summary = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    assert_eq!(summary.member_count, 1);
    assert_eq!(generator.runs().len(), 2);
}

#[test]
fn test_published_lot_emits_events() {
    let f = Fixture::new();
    f.plain_member("A-101", 500);
    f.plain_member("A-102", 700);
    let mut generator = f.generator();

    let summary = generator.generate_bill(f.params(1, 1), &clock(2024, 4, 1)).unwrap();
    let events = generator.take_events();

    assert!(matches!(events.first(), Some(BillingEvent::LotStarted { member_count: 2, .. })));
    assert_eq!(events.iter().filter(|e| matches!(e, BillingEvent::MemberBilled { .. })).count(), 2);
    assert!(events.iter().any(|e| matches!(e, BillingEvent::SocietyPeriodAdvanced { .. })));
    match events.last() {
        Some(BillingEvent::LotPublished { total_billed, .. }) => {
            assert_eq!(*total_billed, Money::from_major(1200));
            assert_eq!(*total_billed, summary.total_billed);
        }
        other => panic!("unexpected last event: {other:?}"),
    }
    assert!(generator.events().is_empty());
}

#[test]
fn test_parallel_matches_sequential() {
    let f = Fixture::new();
    for unit in 0..40 {
        let member = Member::new(f.society.id, format!("T-{unit:03}"), "Resident")
            .with_heading(f.maintenance.id, Money::from_major(400 + unit))
            .with_opening_arrears(Money::from_major(unit * 37), Money::from_major(unit), date(2024, 2, 15));
        f.store.insert_member(member);
    }

    let parallel = BillLotGenerator::for_store(&f.store, BillingConfig::new().with_parallel(true, 4))
        .generate_bill(f.params(1, 1), &clock(2024, 4, 1))
        .unwrap();

    let sequential_store = InMemoryStore::new();
    sequential_store.insert_society(f.society.clone());
    sequential_store.insert_heading(f.maintenance.clone());
    for member in f.store.members(f.society.id) {
        sequential_store.insert_member(member);
    }
    let sequential = BillLotGenerator::for_store(&sequential_store, BillingConfig::sequential())
        .generate_bill(f.params(1, 1), &clock(2024, 4, 1))
        .unwrap();

    assert_eq!(parallel.totals, sequential.totals);
    for (p, s) in parallel.bills.iter().zip(&sequential.bills) {
        assert_eq!(p.bill_no, s.bill_no);
        assert_eq!(p.id_member, s.id_member);
        assert_eq!(p.total_bill_amount, s.total_bill_amount);
    }
}
