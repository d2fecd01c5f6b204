//! Wizard context: state snapshots and the stable operation handle
//!
//! [`WizardHandle`] owns the navigation state, the advance gate and the
//! location binding. It is cheap to clone and every clone refers to the same
//! wizard, so consumers can hold on to it across renders. Observers get a
//! fresh [`WizardSnapshot`] through a `watch` channel only when the visible
//! state changes.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::watch;

use crate::config::WizardOptions;
use crate::diagnostics::{DiagnosticLevel, DiagnosticSink};
use crate::error::WizardError;
use crate::gate::{self, AdvanceGate, GateHandler};
use crate::location::{resolve_fragment, LocationStore, LocationSync};
use crate::navigation::{Move, NavigationController, Transition};
use crate::registry::StepRegistry;
use crate::sync::lock;

/// Read-only view of the wizard state at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSnapshot {
    pub active_step: usize,
    pub step_count: usize,
    pub is_loading: bool,
    pub is_first_step: bool,
    pub is_last_step: bool,
    pub registry: Arc<StepRegistry>,
}

impl WizardSnapshot {
    /// Key of the active step, if the active index names a step
    pub fn active_key(&self) -> Option<&str> {
        self.registry.key_of(self.active_step)
    }
}

/// Snapshot plus the operations step content may invoke
#[derive(Clone)]
pub struct WizardContext {
    snapshot: WizardSnapshot,
    handle: WizardHandle,
}

impl WizardContext {
    pub fn snapshot(&self) -> &WizardSnapshot {
        &self.snapshot
    }

    pub fn handle(&self) -> &WizardHandle {
        &self.handle
    }

    pub fn active_step(&self) -> usize {
        self.snapshot.active_step
    }

    pub fn step_count(&self) -> usize {
        self.snapshot.step_count
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.is_loading
    }

    pub fn is_first_step(&self) -> bool {
        self.snapshot.is_first_step
    }

    pub fn is_last_step(&self) -> bool {
        self.snapshot.is_last_step
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.snapshot.registry
    }

    pub async fn next_step(&self) -> Result<Transition, WizardError> {
        self.handle.next_step().await
    }

    pub fn previous_step(&self) -> bool {
        self.handle.previous_step()
    }

    pub fn go_to_step(&self, index: usize) -> bool {
        self.handle.go_to_step(index)
    }

    pub fn handle_step<H: GateHandler + 'static>(&self, handler: H) {
        self.handle.handle_step(handler);
    }
}

impl std::fmt::Debug for WizardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardContext")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

struct CoreState {
    nav: NavigationController,
    gate: AdvanceGate,
    registry: Arc<StepRegistry>,
    /// Bumped on every change of active step; a gate run that started in an
    /// older epoch is stale.
    epoch: u64,
}

impl CoreState {
    fn snapshot(&self) -> WizardSnapshot {
        WizardSnapshot {
            active_step: self.nav.active_step(),
            step_count: self.nav.step_count(),
            is_loading: self.gate.is_pending(),
            is_first_step: self.nav.is_first_step(),
            is_last_step: self.nav.is_last_step(),
            registry: self.registry.clone(),
        }
    }

    fn record(&mut self, change: Option<Move>) -> Option<Move> {
        if change.is_some() {
            self.epoch += 1;
        }
        change
    }
}

struct Core {
    state: Mutex<CoreState>,
    location: LocationSync,
    diagnostics: Arc<dyn DiagnosticSink>,
    gate_timeout: Option<Duration>,
    snapshots: watch::Sender<WizardSnapshot>,
}

enum Plan {
    Busy,
    Plain,
    Gated {
        handler: Arc<dyn GateHandler>,
        step: usize,
    },
}

/// Returns the gate to `Idle` when a `next_step` future is dropped before
/// its handler settles. The handler stays registered.
struct PendingRun<'a> {
    handle: &'a WizardHandle,
    armed: bool,
}

impl Drop for PendingRun<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        lock(&self.handle.inner.state).gate.finish();
        tracing::debug!("next_step dropped while its gate was pending");
        self.handle.refresh();
    }
}

/// Shared handle to one wizard's state and operations
#[derive(Clone)]
pub struct WizardHandle {
    inner: Arc<Core>,
}

impl WizardHandle {
    pub(crate) fn new(
        registry: StepRegistry,
        options: &WizardOptions,
        store: Arc<dyn LocationStore>,
        diagnostics: Arc<dyn DiagnosticSink>,
        gate_timeout: Option<Duration>,
    ) -> Self {
        report_registry(diagnostics.as_ref(), &registry);

        let step_count = registry.len();
        if step_count > 0 && options.start_index >= step_count {
            diagnostics.log(
                DiagnosticLevel::Warn,
                &format!(
                    "Start index {} is out of range for a wizard with {} steps",
                    options.start_index, step_count
                ),
            );
        }

        let location = LocationSync::new(store, options.hash_enabled);
        let nav = NavigationController::resolve_initial(
            options.start_index,
            location.initial_position(&registry),
            step_count,
        );

        let state = CoreState {
            nav,
            gate: AdvanceGate::new(),
            registry: Arc::new(registry),
            epoch: 0,
        };
        let (snapshots, _) = watch::channel(state.snapshot());
        let active_step = state.nav.active_step();
        let registry = state.registry.clone();

        let handle = Self {
            inner: Arc::new(Core {
                state: Mutex::new(state),
                location,
                diagnostics,
                gate_timeout,
                snapshots,
            }),
        };

        // The location reflects the active step from the start, even if it
        // was empty or named an unknown key.
        handle.inner.location.publish(&registry, active_step);
        handle.attach_location();

        tracing::debug!(active_step, step_count, "Wizard initialized");
        handle
    }

    /// Whether two handles refer to the same wizard
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        lock(&self.inner.state).snapshot()
    }

    pub fn context(&self) -> WizardContext {
        WizardContext {
            snapshot: self.snapshot(),
            handle: self.clone(),
        }
    }

    /// Receive a snapshot whenever the active step, step count, loading flag
    /// or registry change
    pub fn subscribe(&self) -> watch::Receiver<WizardSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn active_step(&self) -> usize {
        lock(&self.inner.state).nav.active_step()
    }

    pub fn step_count(&self) -> usize {
        lock(&self.inner.state).nav.step_count()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner.state).gate.is_pending()
    }

    pub fn is_first_step(&self) -> bool {
        lock(&self.inner.state).nav.is_first_step()
    }

    pub fn is_last_step(&self) -> bool {
        lock(&self.inner.state).nav.is_last_step()
    }

    pub fn registry(&self) -> Arc<StepRegistry> {
        lock(&self.inner.state).registry.clone()
    }

    /// Whether a gate handler is registered for the current step
    pub fn has_step_handler(&self) -> bool {
        lock(&self.inner.state).gate.is_registered()
    }

    /// Register the gate that must pass before leaving the current step.
    /// Replaces any handler registered earlier.
    pub fn handle_step<H: GateHandler + 'static>(&self, handler: H) {
        lock(&self.inner.state).gate.register(Arc::new(handler));
    }

    /// Advance one step, running the registered gate first.
    ///
    /// Without a gate (or on the last step) this is plain navigation. With a
    /// gate, the wizard is loading while it runs; success clears the gate and
    /// advances, failure keeps both the step and the gate and returns the
    /// error. A call made while a gate is running returns
    /// [`Transition::Busy`] without doing anything.
    pub async fn next_step(&self) -> Result<Transition, WizardError> {
        let plan = {
            let mut state = lock(&self.inner.state);
            if state.gate.is_pending() {
                Plan::Busy
            } else if !state.nav.has_next_step() {
                Plan::Plain
            } else {
                let epoch = state.epoch;
                let step = state.nav.active_step();
                match state.gate.begin(epoch) {
                    Some(handler) => Plan::Gated { handler, step },
                    None => Plan::Plain,
                }
            }
        };

        let (handler, step) = match plan {
            Plan::Busy => {
                tracing::debug!("Advance gate already running; ignoring next_step");
                return Ok(Transition::Busy);
            }
            Plan::Plain => return Ok(self.go_to_next_step()),
            Plan::Gated { handler, step } => (handler, step),
        };

        let mut run = PendingRun {
            handle: self,
            armed: true,
        };
        self.refresh();
        tracing::debug!(step, "Running advance gate");
        let outcome = gate::run_handler(handler, self.inner.gate_timeout).await;

        let (current, change, registry) = {
            let mut state = lock(&self.inner.state);
            run.armed = false;
            let current = state.gate.finish() == Some(state.epoch);
            let mut change = None;
            if outcome.is_ok() && current {
                state.gate.clear();
                change = state.nav.go_to_next_step();
                change = state.record(change);
            }
            (current, change, state.registry.clone())
        };
        self.after_move(change, &registry);

        match outcome {
            Ok(()) if current => Ok(Transition::from(change)),
            Ok(()) => {
                tracing::debug!(step, "Wizard moved while the gate ran; not advancing");
                Ok(Transition::Superseded)
            }
            Err(failure) => {
                let err = failure.into_error(step);
                tracing::debug!(step, error = %err, "Advance gate failed");
                Err(err)
            }
        }
    }

    /// Step back once. Clears the gate registered for the step being left.
    /// Returns whether the active step changed.
    pub fn previous_step(&self) -> bool {
        let (change, registry) = {
            let mut state = lock(&self.inner.state);
            let change = state.nav.go_to_previous_step();
            if change.is_some() {
                state.gate.clear();
            }
            (state.record(change), state.registry.clone())
        };
        self.after_move(change, &registry);
        change.is_some()
    }

    /// Jump to `index`, clearing any registered gate.
    ///
    /// An index outside the step range changes nothing and is reported as a
    /// diagnostic. Returns whether the active step changed.
    pub fn go_to_step(&self, index: usize) -> bool {
        let result = {
            let mut state = lock(&self.inner.state);
            match state.nav.go_to_step(index) {
                Ok(change) => {
                    state.gate.clear();
                    Ok((state.record(change), state.registry.clone()))
                }
                Err(invalid) => Err(invalid),
            }
        };

        match result {
            Ok((change, registry)) => {
                self.after_move(change, &registry);
                change.is_some()
            }
            Err(invalid) => {
                self.inner
                    .diagnostics
                    .log(DiagnosticLevel::Warn, &invalid.to_string());
                false
            }
        }
    }

    /// Turn location syncing on or off at runtime
    pub fn set_location_sync(&self, enabled: bool) {
        if enabled == self.inner.location.is_enabled() {
            return;
        }
        self.inner.location.set_enabled(enabled);
        if enabled {
            let (registry, active_step) = {
                let state = lock(&self.inner.state);
                (state.registry.clone(), state.nav.active_step())
            };
            self.inner.location.publish(&registry, active_step);
            self.attach_location();
        }
    }

    pub fn is_location_synced(&self) -> bool {
        self.inner.location.is_enabled()
    }

    pub fn location(&self) -> &Arc<dyn LocationStore> {
        self.inner.location.store()
    }

    /// Stop observing the location store
    pub fn teardown(&self) {
        self.inner.location.detach();
    }

    pub(crate) fn replace_registry(&self, registry: StepRegistry) {
        report_registry(self.inner.diagnostics.as_ref(), &registry);

        let registry = Arc::new(registry);
        let active_step = {
            let mut state = lock(&self.inner.state);
            state.nav.set_step_count(registry.len());
            state.registry = registry.clone();
            state.nav.active_step()
        };

        self.inner.location.publish(&registry, active_step);
        self.refresh();
    }

    fn go_to_next_step(&self) -> Transition {
        let (change, registry) = {
            let mut state = lock(&self.inner.state);
            let change = state.nav.go_to_next_step();
            (state.record(change), state.registry.clone())
        };
        self.after_move(change, &registry);
        Transition::from(change)
    }

    fn after_move(&self, change: Option<Move>, registry: &StepRegistry) {
        if let Some(Move { from, to }) = change {
            tracing::debug!(from, to, "Active step changed");
            self.inner.location.publish(registry, to);
        }
        self.refresh();
    }

    fn refresh(&self) {
        let snapshot = self.snapshot();
        self.inner.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn attach_location(&self) {
        let weak: Weak<Core> = Arc::downgrade(&self.inner);
        self.inner.location.attach(Arc::new(move |value: &str| {
            if let Some(inner) = weak.upgrade() {
                WizardHandle { inner }.on_location_change(value);
            }
        }));
    }

    fn on_location_change(&self, value: &str) {
        let (target, active_step) = {
            let state = lock(&self.inner.state);
            (
                resolve_fragment(&state.registry, value),
                state.nav.active_step(),
            )
        };

        match target {
            Some(position) if position != active_step => {
                tracing::debug!(location = %value, position, "Location changed externally");
                self.go_to_step(position);
            }
            Some(_) => {}
            None => tracing::debug!(location = %value, "Ignoring location with no matching step"),
        }
    }
}

impl std::fmt::Debug for WizardHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardHandle")
            .field("snapshot", &self.snapshot())
            .field("location", &self.inner.location)
            .finish_non_exhaustive()
    }
}

fn report_registry(diagnostics: &dyn DiagnosticSink, registry: &StepRegistry) {
    if registry.is_empty() {
        diagnostics.log(DiagnosticLevel::Warn, "Wizard has no steps to display");
    }
    for key in registry.duplicates() {
        diagnostics.log(
            DiagnosticLevel::Warn,
            &format!("Duplicate step key `{key}`; the last step with this key wins location lookups"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingDiagnostics;
    use crate::location::MemoryLocation;
    use tokio::sync::Notify;

    fn handle_with(
        keys: &[&str],
        options: WizardOptions,
        location: &MemoryLocation,
    ) -> (WizardHandle, Arc<RecordingDiagnostics>) {
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let registry = StepRegistry::from_keys(keys.iter().map(|k| Some(*k)));
        let handle = WizardHandle::new(
            registry,
            &options,
            Arc::new(location.clone()),
            diagnostics.clone(),
            None,
        );
        (handle, diagnostics)
    }

    fn three_steps() -> WizardHandle {
        handle_with(
            &["intro", "details", "done"],
            WizardOptions::default(),
            &MemoryLocation::default(),
        )
        .0
    }

    #[tokio::test]
    async fn test_dropped_next_step_releases_gate() {
        let handle = three_steps();
        handle.handle_step(|| async {
            std::future::pending::<()>().await;
            anyhow::Ok(())
        });

        let dropped = tokio::time::timeout(Duration::from_millis(20), handle.next_step()).await;
        assert!(dropped.is_err());
        assert!(!handle.is_loading());
        assert!(!handle.snapshot().is_loading);
        assert_eq!(handle.active_step(), 0);
        assert!(handle.has_step_handler());

        handle.handle_step(|| async { anyhow::Ok(()) });
        assert_eq!(
            handle.next_step().await.unwrap(),
            Transition::Moved { from: 0, to: 1 }
        );
    }

    #[test]
    fn test_context_handle_identity_is_stable() {
        let handle = three_steps();
        let before = handle.context();
        handle.go_to_step(2);
        let after = handle.context();

        assert!(before.handle().ptr_eq(after.handle()));
        assert_eq!(before.active_step(), 0);
        assert_eq!(after.active_step(), 2);
    }

    #[test]
    fn test_snapshot_flags() {
        let handle = three_steps();
        let snapshot = handle.snapshot();
        assert!(snapshot.is_first_step);
        assert!(!snapshot.is_last_step);
        assert_eq!(snapshot.active_key(), Some("intro"));

        handle.go_to_step(2);
        assert!(handle.is_last_step());
    }

    #[test]
    fn test_subscribe_only_notifies_on_change() {
        let handle = three_steps();
        let mut rx = handle.subscribe();
        assert!(!rx.has_changed().unwrap());

        // Out-of-range and same-step jumps change nothing visible
        handle.go_to_step(9);
        handle.go_to_step(0);
        handle.handle_step(|| async { anyhow::Ok(()) });
        assert!(!rx.has_changed().unwrap());

        handle.go_to_step(1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().active_step, 1);
    }

    #[test]
    fn test_invalid_go_to_reports_diagnostic() {
        let (handle, diagnostics) = handle_with(
            &["a", "b"],
            WizardOptions::default(),
            &MemoryLocation::default(),
        );
        assert!(!handle.go_to_step(2));
        assert_eq!(handle.active_step(), 0);

        let messages = diagnostics.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("[2]"));
    }

    #[test]
    fn test_empty_and_out_of_range_diagnostics() {
        let (_, diagnostics) = handle_with(&[], WizardOptions::default(), &MemoryLocation::default());
        assert_eq!(diagnostics.messages(), vec!["Wizard has no steps to display"]);

        let options = WizardOptions {
            start_index: 4,
            hash_enabled: false,
        };
        let (handle, diagnostics) = handle_with(&["a", "b"], options, &MemoryLocation::default());
        assert_eq!(handle.active_step(), 4);
        assert!(diagnostics.messages()[0].contains("out of range"));
    }

    #[test]
    fn test_duplicate_keys_reported() {
        let (_, diagnostics) = handle_with(
            &["a", "a"],
            WizardOptions::default(),
            &MemoryLocation::default(),
        );
        assert!(diagnostics.messages()[0].contains("`a`"));
    }

    #[test]
    fn test_replace_registry_updates_count_and_location() {
        let location = MemoryLocation::default();
        let options = WizardOptions {
            start_index: 1,
            hash_enabled: true,
        };
        let (handle, _) = handle_with(&["a", "b"], options, &location);
        assert_eq!(location.read(), "#b");

        handle.replace_registry(StepRegistry::from_keys([Some("a"), Some("x"), Some("b")]));
        assert_eq!(handle.step_count(), 3);
        assert_eq!(handle.active_step(), 1);
        assert_eq!(location.read(), "#x");
    }

    #[test]
    fn test_set_location_sync_toggles_subscription() {
        let location = MemoryLocation::new("#b");
        let (handle, _) = handle_with(&["a", "b"], WizardOptions::default(), &location);
        assert_eq!(handle.active_step(), 0);
        assert_eq!(location.listener_count(), 0);

        handle.set_location_sync(true);
        assert_eq!(location.read(), "#a");
        assert_eq!(location.listener_count(), 1);

        location.set_external("#b");
        assert_eq!(handle.active_step(), 1);

        handle.set_location_sync(false);
        assert_eq!(location.listener_count(), 0);
        location.set_external("#a");
        assert_eq!(handle.active_step(), 1);
    }

    #[test]
    fn test_teardown_unsubscribes() {
        let location = MemoryLocation::default();
        let options = WizardOptions {
            start_index: 0,
            hash_enabled: true,
        };
        let (handle, _) = handle_with(&["a", "b"], options, &location);
        assert_eq!(location.listener_count(), 1);

        handle.teardown();
        assert_eq!(location.listener_count(), 0);
    }

    #[test]
    fn test_dropping_last_handle_unsubscribes() {
        let location = MemoryLocation::default();
        let options = WizardOptions {
            start_index: 0,
            hash_enabled: true,
        };
        let (handle, _) = handle_with(&["a", "b"], options, &location);
        drop(handle);
        assert_eq!(location.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_next_step_while_pending_is_busy() {
        let handle = three_steps();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        {
            let started = started.clone();
            let release = release.clone();
            let calls = calls.clone();
            handle.handle_step(move || {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let started = started.clone();
                let release = release.clone();
                async move {
                    started.notify_one();
                    release.notified().await;
                    anyhow::Ok(())
                }
            });
        }

        let runner = handle.clone();
        let pending = tokio::spawn(async move { runner.next_step().await });
        started.notified().await;

        assert!(handle.is_loading());
        assert_eq!(handle.next_step().await.unwrap(), Transition::Busy);

        release.notify_one();
        let transition = pending.await.unwrap().unwrap();
        assert_eq!(transition, Transition::Moved { from: 0, to: 1 });
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!handle.is_loading());
    }

    #[tokio::test]
    async fn test_navigation_during_gate_supersedes_advance() {
        let handle = three_steps();
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        {
            let started = started.clone();
            let release = release.clone();
            handle.handle_step(move || {
                let started = started.clone();
                let release = release.clone();
                async move {
                    started.notify_one();
                    release.notified().await;
                    anyhow::Ok(())
                }
            });
        }

        let runner = handle.clone();
        let pending = tokio::spawn(async move { runner.next_step().await });
        started.notified().await;

        assert!(handle.go_to_step(2));
        release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap(), Transition::Superseded);
        assert_eq!(handle.active_step(), 2);
        assert!(!handle.is_loading());
        assert!(!handle.has_step_handler());
    }

    #[tokio::test]
    async fn test_gate_timeout_keeps_handler() {
        let registry = StepRegistry::from_keys([Some("a"), Some("b")]);
        let handle = WizardHandle::new(
            registry,
            &WizardOptions::default(),
            Arc::new(MemoryLocation::default()),
            Arc::new(RecordingDiagnostics::new()),
            Some(Duration::from_millis(10)),
        );
        handle.handle_step(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            anyhow::Ok(())
        });

        let err = handle.next_step().await.unwrap_err();
        assert!(matches!(err, WizardError::GateTimedOut { step: 0, .. }));
        assert_eq!(handle.active_step(), 0);
        assert!(handle.has_step_handler());
        assert!(!handle.is_loading());
    }
}
