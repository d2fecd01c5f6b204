//! Active-step state and boundary-checked transitions
//!
//! [`NavigationController`] is the only place the active step is assigned.
//! Side effects of a move (clearing a pending gate, publishing the location)
//! are applied by the caller based on the returned [`Move`].

/// A change of active step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

/// Outcome of a forward-navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The active step changed
    Moved { from: usize, to: usize },
    /// Already on the last step; nothing happened
    Unchanged,
    /// A gate was already running; the request was ignored
    Busy,
    /// The gate passed, but the wizard navigated elsewhere while it ran
    Superseded,
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

impl From<Option<Move>> for Transition {
    fn from(change: Option<Move>) -> Self {
        match change {
            Some(Move { from, to }) => Transition::Moved { from, to },
            None => Transition::Unchanged,
        }
    }
}

/// A `go_to` target outside `0..step_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidStep {
    pub index: usize,
    pub step_count: usize,
}

impl std::fmt::Display for InvalidStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid step index [{}] passed to go_to_step; the wizard has {} steps",
            self.index, self.step_count
        )
    }
}

/// Authoritative active step plus the step count it is checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationController {
    active_step: usize,
    step_count: usize,
}

impl NavigationController {
    /// Start at `start`. An index past the end is kept as-is; there is simply
    /// no step to show until the wizard navigates to a valid one.
    pub fn new(start: usize, step_count: usize) -> Self {
        Self {
            active_step: start,
            step_count,
        }
    }

    /// Resolve the first active step: a location match overrides `start`
    pub fn resolve_initial(start: usize, from_location: Option<usize>, step_count: usize) -> Self {
        Self::new(from_location.unwrap_or(start), step_count)
    }

    pub fn active_step(&self) -> usize {
        self.active_step
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Follow a change of the step sequence. The active step is not clamped.
    pub fn set_step_count(&mut self, step_count: usize) {
        self.step_count = step_count;
    }

    pub fn has_next_step(&self) -> bool {
        self.active_step < self.step_count.saturating_sub(1)
    }

    pub fn has_previous_step(&self) -> bool {
        self.active_step > 0
    }

    pub fn is_first_step(&self) -> bool {
        self.active_step == 0
    }

    pub fn is_last_step(&self) -> bool {
        self.step_count.checked_sub(1) == Some(self.active_step)
    }

    pub fn go_to_next_step(&mut self) -> Option<Move> {
        if !self.has_next_step() {
            return None;
        }
        Some(self.set(self.active_step + 1))
    }

    pub fn go_to_previous_step(&mut self) -> Option<Move> {
        if !self.has_previous_step() {
            return None;
        }
        Some(self.set(self.active_step - 1))
    }

    /// Jump to `index`. `Ok(None)` means the index is valid but already active.
    pub fn go_to_step(&mut self, index: usize) -> Result<Option<Move>, InvalidStep> {
        if index >= self.step_count {
            return Err(InvalidStep {
                index,
                step_count: self.step_count,
            });
        }
        if index == self.active_step {
            return Ok(None);
        }
        Ok(Some(self.set(index)))
    }

    fn set(&mut self, to: usize) -> Move {
        let from = self.active_step;
        self.active_step = to;
        Move { from, to }
    }
}
