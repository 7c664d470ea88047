use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Rate;
use crate::errors::{GenerationError, Result};
use crate::interest::DayCountConvention;

/// engine-wide billing configuration
///
/// Societies carry their own rate, frequency and credit adjustment order;
/// this holds the conventions a product owner fixes once for the whole
/// deployment (day count, rounding, how the credit adjustment order is
/// interpreted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub day_count: DayCountConvention,
    pub rounding: RoundingPolicy,
    pub rate_basis: RateBasis,
    pub credit_adjustment_mode: CreditAdjustmentMode,
    /// GST surcharge applied to GST-flagged headings
    pub gst_rate: Rate,
    /// compute member bills on the rayon pool (requires the `parallel` feature)
    pub parallel: bool,
    /// minimum member count before parallel computation kicks in
    pub parallel_threshold: usize,
}

/// rounding applied to every bill component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingPolicy {
    pub decimal_places: u32,
    pub mode: RoundingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// midpoint away from zero
    HalfUp,
    /// banker's rounding
    HalfEven,
    /// truncate toward zero
    Down,
}

/// period a society's `interest_rate` is quoted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    Annual,
    Monthly,
}

/// interpretation of the credit adjustment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditAdjustmentMode {
    /// unpaid balance split by the prior bill's principal/interest mix;
    /// the order only shapes the reported allocation
    Proportional,
    /// payments settle balances in order, leaving the remainder to accrue
    Waterfall,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            mode: RoundingMode::HalfUp,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            day_count: DayCountConvention::Actual365,
            rounding: RoundingPolicy::default(),
            rate_basis: RateBasis::Annual,
            credit_adjustment_mode: CreditAdjustmentMode::Waterfall,
            gst_rate: Rate::from_percentage(18),
            parallel: true,
            parallel_threshold: 64,
        }
    }
}

impl BillingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// config that never fans out to the thread pool
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_day_count(mut self, day_count: DayCountConvention) -> Self {
        self.day_count = day_count;
        self
    }

    pub fn with_rounding(mut self, rounding: RoundingPolicy) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn with_rate_basis(mut self, rate_basis: RateBasis) -> Self {
        self.rate_basis = rate_basis;
        self
    }

    pub fn with_credit_adjustment_mode(mut self, mode: CreditAdjustmentMode) -> Self {
        self.credit_adjustment_mode = mode;
        self
    }

    pub fn with_gst_rate(mut self, gst_rate: Rate) -> Self {
        self.gst_rate = gst_rate;
        self
    }

    pub fn with_parallel(mut self, enabled: bool, threshold: usize) -> Self {
        self.parallel = enabled;
        self.parallel_threshold = threshold;
        self
    }

    /// whether a lot with `members` members should be computed in parallel
    pub fn should_parallelize(&self, members: usize) -> bool {
        cfg!(feature = "parallel") && self.parallel && members >= self.parallel_threshold
    }

    pub fn validate(&self) -> Result<()> {
        if self.rounding.decimal_places > 8 {
            return Err(GenerationError::InvalidConfiguration {
                message: format!(
                    "rounding to {} places exceeds working precision of 8",
                    self.rounding.decimal_places
                ),
            });
        }
        if self.gst_rate.is_negative() || self.gst_rate.as_decimal() > Decimal::ONE {
            return Err(GenerationError::InvalidConfiguration {
                message: format!("gst rate out of range: {}", self.gst_rate),
            });
        }
        Ok(())
    }

    /// load from json; missing keys fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BillingConfig =
            serde_json::from_str(json).map_err(|e| GenerationError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GenerationError::InvalidConfiguration {
            message: e.to_string(),
        })
    }
}
