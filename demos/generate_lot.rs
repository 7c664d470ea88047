//! generate two consecutive monthly lots for a small society
//!
//! `RUST_LOG=society_billing=debug` shows per-member lines.

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use society_billing::{
    BillLotGenerator, BillingConfig, GenerateBillParams, InMemoryStore, Member, Money, PaymentMade,
    SafeTimeProvider, Society, SocietyHeading, TimeSource, Uuid,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store = InMemoryStore::new();
    let society = Society {
        id: Uuid::new_v4(),
        name: "Sea Breeze CHS".to_string(),
        bill_frequency: "monthly".to_string(),
        bill_type: "regular".to_string(),
        interest_type: "simple".to_string(),
        interest_rate: dec!(18),
        payment_due_date: 15,
        credit_adj_first: "interest".to_string(),
        period_of_calculation: "daily".to_string(),
        cur_period_from: NaiveDate::from_ymd_opt(2024, 4, 1).ok_or("bad date")?,
        cur_period_to: NaiveDate::from_ymd_opt(2024, 4, 30).ok_or("bad date")?,
        next_bill_date: NaiveDate::from_ymd_opt(2024, 5, 1).ok_or("bad date")?,
        gst_enabled: true,
        version: 0,
    };
    store.insert_society(society.clone());

    let maintenance = SocietyHeading::new(society.id, "Maintenance");
    let club_house = SocietyHeading::new(society.id, "Club House").with_gst();
    store.insert_heading(maintenance.clone());
    store.insert_heading(club_house.clone());

    let arrears_since = NaiveDate::from_ymd_opt(2024, 3, 2).ok_or("bad date")?;
    store.insert_member(
        Member::new(society.id, "A-101", "R. Shah")
            .with_heading(maintenance.id, Money::from_major(500))
            .with_opening_arrears(Money::from_major(1000), Money::from_major(50), arrears_since),
    );
    store.insert_member(
        Member::new(society.id, "A-102", "M. Iyer")
            .with_heading(maintenance.id, Money::from_major(500))
            .with_heading(club_house.id, Money::from_major(200)),
    );

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).single().ok_or("bad timestamp")?,
    ));
    let mut generator = BillLotGenerator::for_store(&store, BillingConfig::default());

    let april = generator.generate_bill(
        GenerateBillParams::new(society.id, 1, NaiveDate::from_ymd_opt(2024, 4, 1).ok_or("bad date")?, 1001),
        &time,
    )?;
    println!("{}", april.to_json_pretty()?);

    // A-102 settles in full, A-101 pays part after the due date
    for line in &april.bills {
        let payment = if line.bill_no == 1002 {
            PaymentMade::new(line.total_bill_amount, Money::ZERO)
        } else {
            PaymentMade::new(Money::ZERO, Money::from_major(600))
        };
        store.record_payment(line.id, payment);
    }

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single().ok_or("bad timestamp")?,
    ));
    let may = generator.generate_bill(
        GenerateBillParams::new(society.id, 2, NaiveDate::from_ymd_opt(2024, 5, 1).ok_or("bad date")?, 1003)
            .with_comments("May maintenance"),
        &time,
    )?;
    println!("{}", may.to_json_pretty()?);

    Ok(())
}
