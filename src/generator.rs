//! Bill lot generation.
//!
//! One call to [`BillLotGenerator::generate_bill`] walks a lot through
//! `Validating -> Computing -> Persisting -> Published`. Any failure moves the
//! run to `Aborted` and nothing reaches the store: every write of a lot is
//! handed over as a single [`LotCommit`].

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::arrears::{carry_forward, ArrearsResolution, ArrearsResolver, ArrearsSlice, PriorBalance};
use crate::components::BillComponents;
use crate::config::{BillingConfig, RoundingPolicy};
use crate::errors::{GenerationError, Result, StoreError};
use crate::events::{BillingEvent, EventStore};
use crate::headings::HeadingAggregator;
use crate::interest::{AccrualEngine, InterestCalculation, InterestInput, InterestPolicy};
use crate::member::{ChargeLine, HeadingAdvance, MemberBill, MemberSnapshot, PaymentMade};
use crate::parallel::maybe_parallel_map;
use crate::period::{BillingPeriod, PeriodCalculator};
use crate::society::{SocietyAdvance, SocietyBill, SocietyHeading, SocietySnapshot};
use crate::state::{CancellationToken, GenerationState, LotRun};
use crate::store::{BillingStore, LotCommit, PaymentLedger};
use crate::summary::BillLotSummary;
use crate::types::{BillLot, BillStatus, MemberId, SocietyId};

/// request to generate one bill lot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateBillParams {
    pub id_society: SocietyId,
    pub bill_lot: BillLot,
    pub bill_date: NaiveDate,
    /// bill number of the first member in `unit_no` order
    pub start_bill_no: u64,
    pub comments: Option<String>,
}

impl GenerateBillParams {
    pub fn new(id_society: SocietyId, bill_lot: BillLot, bill_date: NaiveDate, start_bill_no: u64) -> Self {
        Self {
            id_society,
            bill_lot,
            bill_date,
            start_bill_no,
            comments: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

/// one member priced for the period, before ids and bill numbers are assigned
#[derive(Debug, Clone, PartialEq)]
pub struct MemberComputation {
    pub id_member: MemberId,
    pub components: BillComponents,
    pub arrears: ArrearsResolution,
    pub interest: InterestCalculation,
    /// dated parts of the new opening arrears, stored on the bill
    pub arrears_slices: Vec<ArrearsSlice>,
    pub charges: Vec<ChargeLine>,
    pub advances: Vec<HeadingAdvance>,
}

/// pure per-member pricing for one period
///
/// Holds everything read-only a member bill depends on so members can be
/// priced independently and in any order.
pub struct MemberPricing<'a> {
    period: BillingPeriod,
    policy: InterestPolicy,
    resolver: ArrearsResolver,
    accrual: AccrualEngine,
    headings: HeadingAggregator<'a>,
    rounding: RoundingPolicy,
}

impl<'a> MemberPricing<'a> {
    pub fn new(
        society: &SocietySnapshot,
        period: BillingPeriod,
        headings: &'a [SocietyHeading],
        config: &BillingConfig,
    ) -> Self {
        Self {
            period,
            policy: society.interest,
            resolver: ArrearsResolver::new(society.credit_adjustment, config.credit_adjustment_mode, config.rounding),
            accrual: AccrualEngine::new(config.day_count, config.rate_basis, config.rounding),
            headings: HeadingAggregator::new(headings, period, society.gst_enabled, config.gst_rate, config.rounding),
            rounding: config.rounding,
        }
    }

    pub fn price(&self, snapshot: &MemberSnapshot, payment: &PaymentMade) -> Result<MemberComputation> {
        let prior = match &snapshot.prior_bill {
            Some(bill) => PriorBalance::from_bill(bill),
            None => PriorBalance::opening(&snapshot.member),
        };

        let arrears = self.resolver.resolve(&prior, payment);
        let unpaid = arrears.unpaid_slices(&prior.slices);

        let mut interest = InterestCalculation::none();
        for slice in unpaid.iter().filter(|slice| slice.is_overdue_at(self.period.period_from)) {
            let accrued = self.accrual.accrue(
                &self.policy,
                &InterestInput {
                    principal_arrears: slice.principal,
                    interest_arrears: slice.interest,
                    from: slice.since,
                    to: self.period.period_from,
                },
            )?;
            interest = interest.merge(accrued);
        }

        let headings = self.headings.aggregate(&snapshot.member)?;

        let components = BillComponents::new(
            arrears.principle_arrears,
            arrears.interest_arrears,
            interest.interest_amount,
            headings.bill_amount,
        )
        .rounded(&self.rounding);
        components.validate()?;

        Ok(MemberComputation {
            id_member: snapshot.member.id,
            components,
            arrears_slices: carry_forward(&unpaid, self.period.period_from),
            arrears,
            interest,
            charges: headings.charges,
            advances: headings.advances,
        })
    }
}

/// Generates bill lots against a [`BillingStore`] and a [`PaymentLedger`].
pub struct BillLotGenerator<'a> {
    store: &'a dyn BillingStore,
    ledger: &'a dyn PaymentLedger,
    config: BillingConfig,
    cancel: CancellationToken,
    events: EventStore,
    runs: Vec<LotRun>,
}

impl<'a> BillLotGenerator<'a> {
    pub fn new(store: &'a dyn BillingStore, ledger: &'a dyn PaymentLedger, config: BillingConfig) -> Self {
        Self {
            store,
            ledger,
            config,
            cancel: CancellationToken::new(),
            events: EventStore::new(),
            runs: Vec::new(),
        }
    }

    /// generator over a store that also keeps the payment ledger
    pub fn for_store<S: BillingStore + PaymentLedger>(store: &'a S, config: BillingConfig) -> Self {
        Self::new(store, store, config)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn events(&self) -> &[BillingEvent] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        self.events.take_events()
    }

    /// every run so far, oldest first
    pub fn runs(&self) -> &[LotRun] {
        &self.runs
    }

    pub fn last_run(&self) -> Option<&LotRun> {
        self.runs.last()
    }

    /// generate with system time
    pub fn generate_bill_now(&mut self, params: GenerateBillParams) -> Result<BillLotSummary> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.generate_bill(params, &time)
    }

    /// generate, publish and propagate one bill lot
    pub fn generate_bill(&mut self, params: GenerateBillParams, time_provider: &SafeTimeProvider) -> Result<BillLotSummary> {
        let mut run = LotRun::new(params.id_society, params.bill_lot);
        let outcome = self.run_lot(&params, &mut run, time_provider);

        if let Err(err) = &outcome {
            let now = time_provider.now();
            run.abort(err, now);
            warn!(
                id_society = %params.id_society,
                bill_lot = params.bill_lot,
                error = %err,
                "bill lot aborted"
            );
            self.events.emit(BillingEvent::LotAborted {
                id_society: params.id_society,
                bill_lot: params.bill_lot,
                reason: err.to_string(),
                timestamp: now,
            });
        }

        self.runs.push(run);
        outcome
    }

    fn run_lot(
        &mut self,
        params: &GenerateBillParams,
        run: &mut LotRun,
        time_provider: &SafeTimeProvider,
    ) -> Result<BillLotSummary> {
        run.transition(GenerationState::Validating, time_provider.now())?;
        self.config.validate()?;

        if let Some(existing) = self.store.find_society_bill(params.id_society, params.bill_lot)? {
            if existing.is_published() {
                return Err(GenerationError::DuplicateLot {
                    id_society: params.id_society,
                    bill_lot: params.bill_lot,
                });
            }
        }

        let snapshot = self
            .store
            .load_snapshot(params.id_society)?
            .ok_or(GenerationError::SocietyNotFound {
                id_society: params.id_society,
            })?;
        let society = SocietySnapshot::from_society(&snapshot.society)?;
        let period = PeriodCalculator::compute(society.frequency, society.cur_period_from, society.payment_due_offset)?;
        self.check_cancelled(params)?;

        run.transition(GenerationState::Computing, time_provider.now())?;
        let mut members = snapshot.members;
        members.sort_by(|a, b| a.member.unit_no.cmp(&b.member.unit_no));

        info!(
            id_society = %params.id_society,
            bill_lot = params.bill_lot,
            members = members.len(),
            period_from = %period.period_from,
            period_to = %period.period_to,
            "generating bill lot"
        );
        self.events.emit(BillingEvent::LotStarted {
            id_society: params.id_society,
            bill_lot: params.bill_lot,
            member_count: members.len(),
            timestamp: time_provider.now(),
        });

        let payments = members
            .iter()
            .map(|m| match &m.prior_bill {
                Some(bill) => self.ledger.payment_made(bill.id),
                None => Ok(PaymentMade::default()),
            })
            .collect::<std::result::Result<Vec<_>, StoreError>>()?;

        let pricing = MemberPricing::new(&society, period, &snapshot.headings, &self.config);
        let inputs: Vec<(&MemberSnapshot, PaymentMade)> = members.iter().zip(payments).collect();
        let cancel = &self.cancel;
        let computed = maybe_parallel_map(&inputs, &self.config, |(member, payment)| {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled {
                    id_society: params.id_society,
                    bill_lot: params.bill_lot,
                });
            }
            pricing
                .price(member, payment)
                .map_err(|cause| GenerationError::for_member(member.member.id, cause))
        })
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
        self.check_cancelled(params)?;

        run.transition(GenerationState::Persisting, time_provider.now())?;
        let generated_at = time_provider.now();
        let id_society_bill = Uuid::new_v4();

        let member_bills: Vec<MemberBill> = computed
            .iter()
            .enumerate()
            .map(|(index, c)| {
                let bill_no = params.start_bill_no + index as u64;
                debug!(
                    id_member = %c.id_member,
                    bill_no,
                    interest_days = c.interest.days,
                    interest = %c.components.interest_amount,
                    total = %c.components.total(),
                    "member billed"
                );
                MemberBill {
                    id: Uuid::new_v4(),
                    id_society_bill,
                    id_society: params.id_society,
                    id_member: c.id_member,
                    bill_lot: params.bill_lot,
                    bill_no,
                    principle_arrears: c.components.principal_arrears,
                    interest_arrears: c.components.interest_arrears,
                    interest_amount: c.components.interest_amount,
                    bill_amount: c.components.bill_amount,
                    total_bill_amount: c.components.total(),
                    status: BillStatus::Pending,
                    due_date: period.due_date,
                    arrears_slices: c.arrears_slices.clone(),
                    payment_made: PaymentMade::default(),
                    charges: c.charges.clone(),
                }
            })
            .collect();

        let header = SocietyBill {
            id: id_society_bill,
            id_society: params.id_society,
            bill_lot: params.bill_lot,
            bill_date: params.bill_date,
            bill_period_from: period.period_from,
            bill_period_to: period.period_to,
            due_date: period.due_date,
            status: BillStatus::Pending,
            interest_rate: society.interest.rate,
            interest_type: society.interest.interest_type,
            credit_adj_first: society.credit_adjustment,
            bill_type: society.bill_type,
            start_bill_no: params.start_bill_no,
            end_bill_no: (!member_bills.is_empty()).then(|| params.start_bill_no + member_bills.len() as u64 - 1),
            member_count: member_bills.len(),
            comments: params.comments.clone(),
            generated_at,
        };

        let next = PeriodCalculator::advance(society.frequency, &period, society.payment_due_offset)?;
        let society_advance = SocietyAdvance {
            id_society: params.id_society,
            expected_version: society.version,
            cur_period_from: next.period_from,
            cur_period_to: next.period_to,
            next_bill_date: next.next_bill_date,
        };
        let heading_advances: Vec<HeadingAdvance> = computed.iter().flat_map(|c| c.advances.iter().copied()).collect();

        let summary = BillLotSummary::new(&header, period, &member_bills);
        self.check_cancelled(params)?;

        self.store
            .commit_lot(LotCommit {
                society_bill: header,
                member_bills,
                society_advance,
                heading_advances: heading_advances.clone(),
            })
            .map_err(|err| match err {
                StoreError::UniqueViolation { id_society, bill_lot } => {
                    GenerationError::DuplicateLot { id_society, bill_lot }
                }
                other => GenerationError::PersistenceFailure(other),
            })?;

        run.transition(GenerationState::Published, time_provider.now())?;
        self.emit_published(&summary, &computed, &heading_advances, &society_advance, time_provider);
        Ok(summary)
    }

    fn emit_published(
        &mut self,
        summary: &BillLotSummary,
        computed: &[MemberComputation],
        heading_advances: &[HeadingAdvance],
        society_advance: &SocietyAdvance,
        time_provider: &SafeTimeProvider,
    ) {
        for (line, c) in summary.bills.iter().zip(computed) {
            self.events.emit(BillingEvent::MemberBilled {
                id_member: line.id_member,
                bill_no: line.bill_no,
                interest_amount: line.interest_amount,
                total_bill_amount: line.total_bill_amount,
            });
            let excess = c.arrears.allocation.excess;
            if !excess.is_zero() {
                warn!(id_member = %c.id_member, excess = %excess, "payment exceeds prior bill");
                self.events.emit(BillingEvent::OverpaymentDetected {
                    id_member: c.id_member,
                    excess,
                });
            }
        }

        self.events.extend(heading_advances.iter().map(|a| BillingEvent::HeadingAdvanced {
            id_member: a.id_member,
            id_society_heading: a.id_society_heading,
            old_amount: a.from_amount,
            new_amount: a.to_amount,
        }));

        self.events.emit(BillingEvent::SocietyPeriodAdvanced {
            id_society: society_advance.id_society,
            cur_period_from: society_advance.cur_period_from,
            cur_period_to: society_advance.cur_period_to,
            next_bill_date: society_advance.next_bill_date,
        });
        self.events.emit(BillingEvent::LotPublished {
            id_society: summary.id_society,
            id_society_bill: summary.id_society_bill,
            bill_lot: summary.bill_lot,
            member_count: summary.member_count,
            total_billed: summary.total_billed,
            timestamp: time_provider.now(),
        });

        info!(
            id_society = %summary.id_society,
            bill_lot = summary.bill_lot,
            members = summary.member_count,
            total_billed = %summary.total_billed,
            "bill lot published"
        );
    }

    fn check_cancelled(&self, params: &GenerateBillParams) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GenerationError::Cancelled {
                id_society: params.id_society,
                bill_lot: params.bill_lot,
            });
        }
        Ok(())
    }
}
