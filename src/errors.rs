use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{BillLot, HeadingId, MemberId, SocietyId};

/// failures reported by a [`crate::store::BillingStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: society {id_society} already has bill lot {bill_lot}")]
    UniqueViolation {
        id_society: SocietyId,
        bill_lot: BillLot,
    },

    #[error("society {id_society} changed during generation: expected version {expected}, found {found}")]
    VersionConflict {
        id_society: SocietyId,
        expected: u64,
        found: u64,
    },

    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
    },
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("society not found: {id_society}")]
    SocietyNotFound {
        id_society: SocietyId,
    },

    #[error("bill lot {bill_lot} already published for society {id_society}")]
    DuplicateLot {
        id_society: SocietyId,
        bill_lot: BillLot,
    },

    #[error("invalid bill frequency: {tag:?}")]
    InvalidFrequency {
        tag: String,
    },

    #[error("invalid period: {message}")]
    InvalidPeriod {
        message: String,
    },

    #[error("bill computation failed for member {member_id}: {cause}")]
    MemberComputationFailure {
        member_id: MemberId,
        #[source]
        cause: Box<GenerationError>,
    },

    #[error("persistence failed: {0}")]
    PersistenceFailure(#[from] StoreError),

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("member heading references unknown society heading {id_society_heading}")]
    UnknownHeading {
        id_society_heading: HeadingId,
    },

    #[error("generation of lot {bill_lot} for society {id_society} was cancelled")]
    Cancelled {
        id_society: SocietyId,
        bill_lot: BillLot,
    },
}

impl GenerationError {
    /// negative elapsed time between two dates
    pub fn negative_elapsed(from: NaiveDate, to: NaiveDate) -> Self {
        GenerationError::InvalidPeriod {
            message: format!("elapsed time from {} to {} is negative", from, to),
        }
    }

    /// wrap a per-member failure with the member it originated from
    pub fn for_member(member_id: MemberId, cause: GenerationError) -> Self {
        GenerationError::MemberComputationFailure {
            member_id,
            cause: Box::new(cause),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
