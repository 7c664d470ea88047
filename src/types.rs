use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{GenerationError, Result};

/// unique identifier for a society (tenant)
pub type SocietyId = Uuid;
/// unique identifier for a member of a society
pub type MemberId = Uuid;
/// unique identifier for a society-level heading
pub type HeadingId = Uuid;
/// unique identifier for a society bill header
pub type SocietyBillId = Uuid;
/// unique identifier for a member bill row
pub type MemberBillId = Uuid;

/// batch number grouping all member bills generated together
pub type BillLot = u32;

/// lowercase a tag and fold `_`, `-` and whitespace so `Half Yearly`,
/// `half_yearly` and `half-yearly` compare equal
fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .chars()
        .map(|c| match c {
            '_' | ' ' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// billing frequency of a society
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BillFrequency {
    Monthly,
    BiMonthly,
    Quarterly,
    HalfYearly,
    Yearly,
}

impl BillFrequency {
    /// calendar months covered by one billing period
    pub fn months(&self) -> u32 {
        match self {
            BillFrequency::Monthly => 1,
            BillFrequency::BiMonthly => 2,
            BillFrequency::Quarterly => 3,
            BillFrequency::HalfYearly => 6,
            BillFrequency::Yearly => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillFrequency::Monthly => "monthly",
            BillFrequency::BiMonthly => "bi-monthly",
            BillFrequency::Quarterly => "quarterly",
            BillFrequency::HalfYearly => "half-yearly",
            BillFrequency::Yearly => "yearly",
        }
    }
}

impl FromStr for BillFrequency {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_tag(s).as_str() {
            "monthly" => Ok(BillFrequency::Monthly),
            "bi-monthly" | "bimonthly" => Ok(BillFrequency::BiMonthly),
            "quarterly" => Ok(BillFrequency::Quarterly),
            "half-yearly" | "halfyearly" => Ok(BillFrequency::HalfYearly),
            "yearly" | "annual" => Ok(BillFrequency::Yearly),
            _ => Err(GenerationError::InvalidFrequency { tag: s.to_string() }),
        }
    }
}

impl fmt::Display for BillFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// kind of bill run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillType {
    /// recurring maintenance bill
    Regular,
    /// one-off bill raised between regular cycles
    Supplementary,
}

impl FromStr for BillType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_tag(s).as_str() {
            "regular" | "" => Ok(BillType::Regular),
            "supplementary" => Ok(BillType::Supplementary),
            other => Err(GenerationError::InvalidConfiguration {
                message: format!("unknown bill type: {}", other),
            }),
        }
    }
}

/// how interest accrues on overdue balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestType {
    /// only principal arrears accrue
    Simple,
    /// principal and unpaid interest accrue together
    Reducing,
}

impl FromStr for InterestType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_tag(s).as_str() {
            "simple" => Ok(InterestType::Simple),
            "reducing" | "compound" => Ok(InterestType::Reducing),
            other => Err(GenerationError::InvalidConfiguration {
                message: format!("unknown interest type: {}", other),
            }),
        }
    }
}

/// which balance a payment settles first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditAdjustment {
    /// principal is settled before interest
    #[serde(rename = "principle")]
    PrincipalFirst,
    /// interest is settled before principal
    #[serde(rename = "interest")]
    InterestFirst,
}

impl FromStr for CreditAdjustment {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_tag(s).as_str() {
            "principle" | "principal" => Ok(CreditAdjustment::PrincipalFirst),
            "interest" => Ok(CreditAdjustment::InterestFirst),
            other => Err(GenerationError::InvalidConfiguration {
                message: format!("unknown credit adjustment order: {}", other),
            }),
        }
    }
}

/// granularity used to count elapsed time for interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationPeriod {
    Daily,
    Monthly,
}

impl FromStr for CalculationPeriod {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_tag(s).as_str() {
            "daily" | "day" | "" => Ok(CalculationPeriod::Daily),
            "monthly" | "month" => Ok(CalculationPeriod::Monthly),
            other => Err(GenerationError::InvalidConfiguration {
                message: format!("unknown period of calculation: {}", other),
            }),
        }
    }
}

/// bill status; transitions pending -> published only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Published,
}
