use std::collections::HashMap;

use crate::config::RoundingPolicy;
use crate::decimal::{Money, Rate};
use crate::errors::{GenerationError, Result};
use crate::member::{ChargeKind, ChargeLine, HeadingAdvance, Member};
use crate::period::BillingPeriod;
use crate::society::SocietyHeading;
use crate::types::HeadingId;

/// new-period charges of one member
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingTotal {
    pub bill_amount: Money,
    pub charges: Vec<ChargeLine>,
    /// headings that contributed, to be advanced once the lot is published
    pub advances: Vec<HeadingAdvance>,
}

/// Sums a member's active headings into the period's bill amount.
pub struct HeadingAggregator<'a> {
    headings: HashMap<HeadingId, &'a SocietyHeading>,
    period: BillingPeriod,
    gst_rate: Option<Rate>,
    rounding: RoundingPolicy,
}

impl<'a> HeadingAggregator<'a> {
    /// `gst_rate` is applied only when the society has GST enabled
    pub fn new(
        headings: &'a [SocietyHeading],
        period: BillingPeriod,
        gst_enabled: bool,
        gst_rate: Rate,
        rounding: RoundingPolicy,
    ) -> Self {
        Self {
            headings: headings.iter().map(|h| (h.id, h)).collect(),
            period,
            gst_rate: gst_enabled.then_some(gst_rate),
            rounding,
        }
    }

    pub fn aggregate(&self, member: &Member) -> Result<HeadingTotal> {
        let mut charges = Vec::new();
        let mut advances = Vec::new();

        for line in &member.headings {
            let heading = self
                .headings
                .get(&line.id_society_heading)
                .ok_or(GenerationError::UnknownHeading {
                    id_society_heading: line.id_society_heading,
                })?;

            if !heading.applies_to(&self.period) {
                continue;
            }
            if line.curr_amount.is_negative() || line.next_amount.is_negative() {
                return Err(GenerationError::InvalidConfiguration {
                    message: format!("heading {} has a negative amount", heading.name),
                });
            }

            let amount = line.curr_amount.round_with(&self.rounding);
            charges.push(ChargeLine {
                id_society_heading: heading.id,
                name: heading.name.clone(),
                kind: ChargeKind::Heading,
                amount,
            });

            if let (true, Some(rate)) = (heading.is_gst, self.gst_rate) {
                charges.push(ChargeLine {
                    id_society_heading: heading.id,
                    name: format!("GST on {}", heading.name),
                    kind: ChargeKind::Gst,
                    amount: (amount * rate.as_decimal()).round_with(&self.rounding),
                });
            }

            advances.push(HeadingAdvance {
                id_member: member.id,
                id_society_heading: heading.id,
                from_amount: line.curr_amount,
                to_amount: line.next_amount,
            });
        }

        Ok(HeadingTotal {
            bill_amount: charges.iter().map(|c| c.amount).sum(),
            charges,
            advances,
        })
    }
}
