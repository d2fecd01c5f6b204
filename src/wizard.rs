//! Wizard composition root
//!
//! [`Wizard`] owns the step contents and the optional header, footer and
//! wrapper around them, and delegates all state to its [`WizardHandle`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::WizardOptions;
use crate::context::{WizardContext, WizardHandle, WizardSnapshot};
use crate::diagnostics::{DiagnosticSink, TracingDiagnostics};
use crate::error::WizardError;
use crate::gate::GateHandler;
use crate::location::{LocationStore, MemoryLocation};
use crate::navigation::Transition;
use crate::registry::StepRegistry;
use crate::step::Step;

/// Where the active step's content goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body<'a, C> {
    /// Content placed directly between header and footer
    Direct(&'a C),
    /// Content composed as a child of the wrapper
    Wrapped { wrapper: &'a C, child: &'a C },
    /// The active index names no step (empty wizard or start past the end)
    Empty,
}

/// Everything a host needs to render the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardView<'a, C> {
    pub header: Option<&'a C>,
    pub body: Body<'a, C>,
    pub footer: Option<&'a C>,
}

pub struct WizardBuilder<C> {
    steps: Vec<Step<C>>,
    header: Option<C>,
    footer: Option<C>,
    wrapper: Option<C>,
    options: WizardOptions,
    location: Option<Arc<dyn LocationStore>>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    gate_timeout: Option<Duration>,
}

impl<C> WizardBuilder<C> {
    pub fn header(mut self, header: C) -> Self {
        self.header = Some(header);
        self
    }

    pub fn footer(mut self, footer: C) -> Self {
        self.footer = Some(footer);
        self
    }

    pub fn wrapper(mut self, wrapper: C) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    pub fn options(mut self, options: WizardOptions) -> Self {
        self.options = options;
        self
    }

    pub fn start_index(mut self, start_index: usize) -> Self {
        self.options.start_index = start_index;
        self
    }

    pub fn hash_enabled(mut self, enabled: bool) -> Self {
        self.options.hash_enabled = enabled;
        self
    }

    /// Location store to sync with. Defaults to a private [`MemoryLocation`].
    pub fn location(mut self, location: Arc<dyn LocationStore>) -> Self {
        self.location = Some(location);
        self
    }

    /// Diagnostic sink. Defaults to [`TracingDiagnostics::default`].
    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Fail gates that do not settle within `limit`
    pub fn gate_timeout(mut self, limit: Duration) -> Self {
        self.gate_timeout = Some(limit);
        self
    }

    pub fn build(self) -> Wizard<C> {
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(MemoryLocation::default()));
        let diagnostics = self
            .diagnostics
            .unwrap_or_else(|| Arc::new(TracingDiagnostics::default()));

        let handle = WizardHandle::new(
            StepRegistry::from_steps(&self.steps),
            &self.options,
            location,
            diagnostics,
            self.gate_timeout,
        );

        Wizard {
            steps: self.steps,
            header: self.header,
            footer: self.footer,
            wrapper: self.wrapper,
            handle,
        }
    }
}

/// A multi-step wizard over content of type `C`
pub struct Wizard<C> {
    steps: Vec<Step<C>>,
    header: Option<C>,
    footer: Option<C>,
    wrapper: Option<C>,
    handle: WizardHandle,
}

impl<C> Wizard<C> {
    pub fn builder(steps: impl IntoIterator<Item = Step<C>>) -> WizardBuilder<C> {
        WizardBuilder {
            steps: steps.into_iter().collect(),
            header: None,
            footer: None,
            wrapper: None,
            options: WizardOptions::default(),
            location: None,
            diagnostics: None,
            gate_timeout: None,
        }
    }

    /// Wizard with default options over `steps`
    pub fn new(steps: impl IntoIterator<Item = Step<C>>) -> Self {
        Self::builder(steps).build()
    }

    /// Stable handle shared by every context this wizard hands out
    pub fn handle(&self) -> &WizardHandle {
        &self.handle
    }

    pub fn context(&self) -> WizardContext {
        self.handle.context()
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<WizardSnapshot> {
        self.handle.subscribe()
    }

    pub fn steps(&self) -> &[Step<C>] {
        &self.steps
    }

    /// Replace the step sequence; positions and keys are derived again
    pub fn set_steps(&mut self, steps: impl IntoIterator<Item = Step<C>>) {
        self.steps = steps.into_iter().collect();
        self.handle
            .replace_registry(StepRegistry::from_steps(&self.steps));
    }

    pub fn active_content(&self) -> Option<&C> {
        self.steps
            .get(self.handle.active_step())
            .map(Step::content)
    }

    /// Header, active content (possibly wrapped) and footer
    pub fn view(&self) -> WizardView<'_, C> {
        let body = match (self.active_content(), self.wrapper.as_ref()) {
            (Some(child), Some(wrapper)) => Body::Wrapped { wrapper, child },
            (Some(child), None) => Body::Direct(child),
            (None, _) => Body::Empty,
        };

        WizardView {
            header: self.header.as_ref(),
            body,
            footer: self.footer.as_ref(),
        }
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

impl<C> Drop for Wizard<C> {
    fn drop(&mut self) {
        self.handle.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingDiagnostics;

    fn steps() -> Vec<Step<&'static str>> {
        vec![
            Step::keyed("intro", "Welcome"),
            Step::keyed("details", "Your details"),
            Step::keyed("done", "All set"),
        ]
    }

    #[test]
    fn test_view_direct() {
        let wizard = Wizard::builder(steps()).header("Header").build();
        let view = wizard.view();
        assert_eq!(view.header, Some(&"Header"));
        assert_eq!(view.body, Body::Direct(&"Welcome"));
        assert_eq!(view.footer, None);
    }

    #[test]
    fn test_view_wrapped() {
        let wizard = Wizard::builder(steps())
            .wrapper("Frame")
            .footer("Footer")
            .start_index(1)
            .build();
        let view = wizard.view();
        assert_eq!(
            view.body,
            Body::Wrapped {
                wrapper: &"Frame",
                child: &"Your details"
            }
        );
        assert_eq!(view.footer, Some(&"Footer"));
    }

    #[test]
    fn test_view_empty_past_end() {
        let diagnostics = Arc::new(RecordingDiagnostics::new());
        let wizard = Wizard::builder(steps())
            .start_index(7)
            .diagnostics(diagnostics.clone())
            .build();
        assert_eq!(wizard.view().body, Body::Empty);
        assert_eq!(wizard.active_content(), None);
        assert_eq!(diagnostics.messages().len(), 1);
    }

    #[test]
    fn test_view_follows_navigation() {
        let wizard = Wizard::new(steps());
        wizard.go_to_step(2);
        assert_eq!(wizard.active_content(), Some(&"All set"));
        assert!(wizard.previous_step());
        assert_eq!(wizard.active_content(), Some(&"Your details"));
    }

    #[test]
    fn test_set_steps_recomputes_registry() {
        let mut wizard = Wizard::new(steps());
        let mut rx = wizard.subscribe();

        wizard.set_steps(vec![Step::new("only")]);
        assert!(rx.has_changed().unwrap());

        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.step_count, 1);
        assert_eq!(snapshot.registry.key_of(0), Some("step1"));
        assert!(snapshot.is_last_step);
    }

    #[test]
    fn test_drop_unsubscribes_even_with_live_handle() {
        let location = MemoryLocation::default();
        let wizard = Wizard::builder(steps())
            .hash_enabled(true)
            .location(Arc::new(location.clone()))
            .build();
        let handle = wizard.handle().clone();
        assert_eq!(location.listener_count(), 1);

        drop(wizard);
        assert_eq!(location.listener_count(), 0);
        // The handle still answers queries after teardown
        assert_eq!(handle.active_step(), 0);
    }
}
