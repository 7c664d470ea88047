pub mod arrears;
pub mod components;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod generator;
pub mod headings;
pub mod interest;
pub mod member;
pub mod parallel;
pub mod period;
pub mod society;
pub mod state;
pub mod store;
pub mod summary;
pub mod types;

// re-export key types
pub use arrears::{ArrearsResolution, ArrearsResolver, ArrearsSlice, CreditAllocation, CreditWaterfall, PriorBalance};
pub use components::BillComponents;
pub use config::{BillingConfig, CreditAdjustmentMode, RateBasis, RoundingMode, RoundingPolicy};
pub use decimal::{Money, Rate};
pub use errors::{GenerationError, Result, StoreError};
pub use events::{BillingEvent, EventStore};
pub use generator::{BillLotGenerator, GenerateBillParams, MemberComputation, MemberPricing};
pub use headings::{HeadingAggregator, HeadingTotal};
pub use interest::{AccrualEngine, DayCountConvention, InterestCalculation, InterestInput, InterestPolicy};
pub use member::{ChargeKind, ChargeLine, Member, MemberBill, MemberHeading, PaymentMade};
pub use period::{BillingPeriod, PeriodCalculator};
pub use society::{Society, SocietyBill, SocietyHeading, SocietySnapshot};
pub use state::{CancellationToken, GenerationState, LotRun};
pub use store::{BillingSnapshot, BillingStore, InMemoryStore, LotCommit, PaymentLedger};
pub use summary::{BillLotSummary, MemberBillLine};
pub use types::{
    BillFrequency, BillLot, BillStatus, BillType, CalculationPeriod, CreditAdjustment, HeadingId,
    InterestType, MemberBillId, MemberId, SocietyBillId, SocietyId,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
