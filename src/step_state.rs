//! Step State Machine
//!
//! Tracks a single step through its attempts and enforces valid transitions.
//!
//! # State Flow
//!
//! ```text
//! Pending
//!     ↓
//! Running ──→ Succeeded
//!   ↑   │
//!   │   ├──→ Aborted
//!   │   ↓
//! Retrying
//! ```
//!
//! `Succeeded` and `Aborted` are terminal. A retryable failure moves to
//! `Retrying` while the retry counter is within `max_retries`, and to
//! `Aborted` once it is exceeded. A step therefore runs at most
//! `max_retries + 1` times.

use crate::error::AshError;
use crate::invoke::Outcome;
use strum::{Display, EnumIter};
use thiserror::Error;

/// Retries granted to a step before it aborts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StepState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Aborted,
}

impl StepState {
    /// Returns true for `Succeeded` and `Aborted`
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Aborted)
    }

    /// Returns true if `target` is reachable in one transition
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Aborted)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Retrying)
                | (Self::Running, Self::Aborted)
                | (Self::Retrying, Self::Running)
                | (Self::Retrying, Self::Aborted)
        )
    }
}

/// Errors that can occur during step state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepTransitionError {
    /// Attempted to leave a terminal state
    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: StepState },

    /// Attempted a transition the state machine does not allow
    #[error("Invalid step transition from {from} to {to}")]
    InvalidTransition { from: StepState, to: StepState },
}

impl From<StepTransitionError> for AshError {
    fn from(err: StepTransitionError) -> Self {
        AshError::StepTransition(err.to_string())
    }
}

/// Progress of one step through its attempts
#[derive(Debug, Clone)]
pub struct StepRun {
    state: StepState,

    /// Number of times the step entered `Running`
    attempts: u32,

    /// Number of retryable failures so far
    retries: u32,

    max_retries: u32,

    /// Every state entered, in order, starting with `Pending`
    history: Vec<StepState>,
}

impl Default for StepRun {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl StepRun {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: StepState::Pending,
            attempts: 0,
            retries: 0,
            max_retries,
            history: vec![StepState::Pending],
        }
    }

    #[inline]
    pub fn state(&self) -> StepState {
        self.state
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn history(&self) -> &[StepState] {
        &self.history
    }

    /// Returns true once the retry budget is spent
    pub fn retries_exhausted(&self) -> bool {
        self.retries > self.max_retries
    }

    /// Begin an attempt (`Pending` or `Retrying` → `Running`)
    pub fn start(&mut self) -> Result<StepState, StepTransitionError> {
        self.transition_to(StepState::Running)?;
        self.attempts += 1;
        Ok(self.state)
    }

    /// Apply the outcome of the current attempt
    pub fn record(&mut self, outcome: &Outcome) -> Result<StepState, StepTransitionError> {
        if self.state != StepState::Running {
            return Err(self.invalid(StepState::Succeeded));
        }
        let target = match outcome {
            Outcome::Success => StepState::Succeeded,
            Outcome::Retryable => {
                self.retries += 1;
                if self.retries_exhausted() {
                    StepState::Aborted
                } else {
                    StepState::Retrying
                }
            }
            Outcome::Fatal(_) => StepState::Aborted,
        };
        self.transition_to(target)
    }

    /// Abort from any non-terminal state
    pub fn abort(&mut self) -> Result<StepState, StepTransitionError> {
        self.transition_to(StepState::Aborted)
    }

    fn transition_to(&mut self, target: StepState) -> Result<StepState, StepTransitionError> {
        if self.state.is_terminal() {
            return Err(StepTransitionError::FromTerminalState { from: self.state });
        }
        if !self.state.can_transition_to(target) {
            return Err(self.invalid(target));
        }
        self.state = target;
        self.history.push(target);
        Ok(target)
    }

    fn invalid(&self, to: StepState) -> StepTransitionError {
        if self.state.is_terminal() {
            StepTransitionError::FromTerminalState { from: self.state }
        } else {
            StepTransitionError::InvalidTransition {
                from: self.state,
                to,
            }
        }
    }
}
