use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{GenerationError, Result};
use crate::types::{BillLot, SocietyId};

/// lifecycle of one bill lot generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    NotStarted,
    /// society lookup, duplicate lot check, snapshot parsing
    Validating,
    /// per-member bill computation
    Computing,
    /// single atomic commit of header, bills and advances
    Persisting,
    Published,
    /// nothing was persisted
    Aborted,
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationState::Published | GenerationState::Aborted)
    }

    /// forward-only; any non-terminal state may abort
    pub fn can_transition_to(&self, next: GenerationState) -> bool {
        use GenerationState::*;
        match (self, next) {
            (NotStarted, Validating)
            | (Validating, Computing)
            | (Computing, Persisting)
            | (Persisting, Published) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: GenerationState,
    pub to: GenerationState,
    pub timestamp: DateTime<Utc>,
}

/// record of one generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotRun {
    pub id_society: SocietyId,
    pub bill_lot: BillLot,
    pub state: GenerationState,
    pub transitions: Vec<StateTransition>,
    pub failure: Option<String>,
}

impl LotRun {
    pub fn new(id_society: SocietyId, bill_lot: BillLot) -> Self {
        Self {
            id_society,
            bill_lot,
            state: GenerationState::NotStarted,
            transitions: Vec::new(),
            failure: None,
        }
    }

    pub fn transition(&mut self, next: GenerationState, timestamp: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(GenerationError::InvalidConfiguration {
                message: format!("illegal generation transition {:?} -> {:?}", self.state, next),
            });
        }
        self.transitions.push(StateTransition {
            from: self.state,
            to: next,
            timestamp,
        });
        self.state = next;
        Ok(())
    }

    /// move to `Aborted` from wherever the run stopped
    pub fn abort(&mut self, error: &GenerationError, timestamp: DateTime<Utc>) {
        if !self.state.is_terminal() {
            self.transitions.push(StateTransition {
                from: self.state,
                to: GenerationState::Aborted,
                timestamp,
            });
            self.state = GenerationState::Aborted;
        }
        self.failure = Some(error.to_string());
    }

    /// states visited, in order
    pub fn path(&self) -> Vec<GenerationState> {
        std::iter::once(GenerationState::NotStarted)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }
}

/// cooperative cancellation handed to a generation run by its scheduler
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
