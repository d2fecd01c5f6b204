//! Async gate in front of forward navigation
//!
//! A step registers at most one [`GateHandler`]. `next_step` runs it and only
//! advances when it succeeds; a failing handler stays registered so the same
//! gate can be retried.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;

use crate::error::WizardError;

/// Check run before the wizard may leave the current step
#[async_trait]
pub trait GateHandler: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> GateHandler for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self)().await
    }
}

/// Gate lifecycle: `Idle → Pending → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    /// A handler is running; `epoch` is the navigation epoch it started in
    Pending { epoch: u64 },
}

/// Why a gate run did not pass
#[derive(Debug)]
pub enum GateFailure {
    Rejected(anyhow::Error),
    Panicked(String),
    TimedOut(Duration),
}

impl GateFailure {
    /// Attach the step the gate belonged to
    pub fn into_error(self, step: usize) -> WizardError {
        match self {
            GateFailure::Rejected(source) => WizardError::Gate { step, source },
            GateFailure::Panicked(message) => WizardError::GatePanicked { step, message },
            GateFailure::TimedOut(limit) => WizardError::GateTimedOut { step, limit },
        }
    }
}

/// Registered handler plus the pending/idle bookkeeping around it
pub struct AdvanceGate {
    handler: Option<Arc<dyn GateHandler>>,
    state: GateState,
}

impl Default for AdvanceGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvanceGate {
    pub fn new() -> Self {
        Self {
            handler: None,
            state: GateState::Idle,
        }
    }

    /// Register the handler for the current step, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn GateHandler>) {
        self.handler = Some(handler);
    }

    pub fn clear(&mut self) {
        self.handler = None;
    }

    pub fn is_registered(&self) -> bool {
        self.handler.is_some()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, GateState::Pending { .. })
    }

    /// Enter `Pending` and hand out the handler to run.
    ///
    /// Returns `None` when no handler is registered or a run is already in
    /// flight; the state is left untouched in both cases.
    pub fn begin(&mut self, epoch: u64) -> Option<Arc<dyn GateHandler>> {
        if self.is_pending() {
            return None;
        }
        let handler = self.handler.clone()?;
        self.state = GateState::Pending { epoch };
        Some(handler)
    }

    /// Return to `Idle`, yielding the epoch the finished run started in
    pub fn finish(&mut self) -> Option<u64> {
        match std::mem::replace(&mut self.state, GateState::Idle) {
            GateState::Pending { epoch } => Some(epoch),
            GateState::Idle => None,
        }
    }
}

impl std::fmt::Debug for AdvanceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvanceGate")
            .field("registered", &self.is_registered())
            .field("state", &self.state)
            .finish()
    }
}

/// Run a handler to completion, catching panics and applying `timeout`
pub async fn run_handler(
    handler: Arc<dyn GateHandler>,
    timeout: Option<Duration>,
) -> Result<(), GateFailure> {
    let guarded = AssertUnwindSafe(async move { handler.run().await }).catch_unwind();

    let settled = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(settled) => settled,
            Err(_) => return Err(GateFailure::TimedOut(limit)),
        },
        None => guarded.await,
    };

    match settled {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(GateFailure::Rejected(err)),
        Err(payload) => Err(GateFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
