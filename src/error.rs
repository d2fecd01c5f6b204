//! Error types surfaced by wizard navigation

use std::time::Duration;

use thiserror::Error;

/// Failures that cross the wizard boundary.
///
/// Only a failed advance gate is reported as an error; misuse such as an
/// invalid `go_to_step` target is a diagnostic and leaves state unchanged.
#[derive(Debug, Error)]
pub enum WizardError {
    #[error("Advance gate for step {step} failed: {source}")]
    Gate {
        step: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("Advance gate for step {step} panicked: {message}")]
    GatePanicked { step: usize, message: String },
    #[error("Advance gate for step {step} did not settle within {limit:?}")]
    GateTimedOut { step: usize, limit: Duration },
}

impl WizardError {
    /// Step whose gate failed
    pub fn step(&self) -> usize {
        match self {
            WizardError::Gate { step, .. }
            | WizardError::GatePanicked { step, .. }
            | WizardError::GateTimedOut { step, .. } => *step,
        }
    }

    /// The handler's own error, when it rejected normally
    pub fn gate_error(&self) -> Option<&anyhow::Error> {
        match self {
            WizardError::Gate { source, .. } => Some(source),
            _ => None,
        }
    }
}
