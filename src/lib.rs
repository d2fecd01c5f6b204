//! Stepwise - multi-step wizard controller
//!
//! Tracks the active step of an ordered step collection, gates forward
//! navigation behind optional async handlers, and mirrors the active step into
//! an external location fragment so steps are bookmarkable.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod location;
pub mod logging;
pub mod navigation;
pub mod registry;
pub mod step;
pub mod wizard;

mod sync;

pub use config::{Config, WizardOptions};
pub use context::{WizardContext, WizardHandle, WizardSnapshot};
pub use diagnostics::{DiagnosticLevel, DiagnosticSink, RecordingDiagnostics, TracingDiagnostics};
pub use error::WizardError;
pub use gate::GateHandler;
pub use location::{LocationStore, MemoryLocation, Subscription};
pub use navigation::{Move, Transition};
pub use registry::{RegistryEntry, StepRegistry};
pub use step::Step;
pub use wizard::{Body, Wizard, WizardBuilder, WizardView};
