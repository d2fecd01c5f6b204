//! Advisory diagnostics for wizard misuse
//!
//! Diagnostics are purely observational: empty step sequences, out-of-range
//! start indices, invalid `go_to_step` targets and duplicate keys are
//! reported here and never change control flow.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::sync::lock;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Warn,
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticLevel::Warn => write!(f, "warn"),
            DiagnosticLevel::Error => write!(f, "error"),
        }
    }
}

/// Receiver for misuse diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn log(&self, level: DiagnosticLevel, message: &str);
}

/// Forwards diagnostics to `tracing`.
///
/// Enabled by default only in debug builds; release builds stay silent unless
/// the sink is constructed with `enabled = true`.
#[derive(Debug, Clone, Copy)]
pub struct TracingDiagnostics {
    enabled: bool,
}

impl TracingDiagnostics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TracingDiagnostics {
    fn default() -> Self {
        Self::new(cfg!(debug_assertions))
    }
}

impl DiagnosticSink for TracingDiagnostics {
    fn log(&self, level: DiagnosticLevel, message: &str) {
        if !self.enabled {
            return;
        }
        match level {
            DiagnosticLevel::Warn => tracing::warn!(target: "stepwise::diagnostics", "{}", message),
            DiagnosticLevel::Error => {
                tracing::error!(target: "stepwise::diagnostics", "{}", message);
            }
        }
    }
}

/// Keeps every diagnostic in memory for later inspection
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    entries: Mutex<Vec<(DiagnosticLevel, String)>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded diagnostics, oldest first
    pub fn entries(&self) -> Vec<(DiagnosticLevel, String)> {
        lock(&self.entries).clone()
    }

    /// Recorded messages without their levels
    pub fn messages(&self) -> Vec<String> {
        lock(&self.entries)
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn log(&self, level: DiagnosticLevel, message: &str) {
        lock(&self.entries).push((level, message.to_string()));
    }
}
