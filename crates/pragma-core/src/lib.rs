//! Pragma resource core
//!
//! Shared machinery for declarative resource providers: typed dependencies
//! resolved once per pass, bounded convergence polling, immutable field
//! enforcement, config diffing and spec compilation for resources that are
//! rebuilt in a separate runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  ResourceDriver                  │
//! │  validate -> guard -> diff -> resolve -> call    │
//! └───────┬──────────────────┬───────────────────────┘
//!         │                  │
//! ┌───────▼────────┐ ┌───────▼──────────────┐
//! │ ResolutionCtx  │ │ Lifecycle impl       │
//! │ (per pass)     │ │ (gcp, kubernetes,    │
//! └───────┬────────┘ │  agno)               │
//!         │          └───────┬──────────────┘
//! ┌───────▼────────┐ ┌───────▼──────────────┐
//! │ OutputsSource  │ │ ConvergencePoller    │
//! │ (state, memory)│ │                      │
//! └────────────────┘ └──────────────────────┘
//! ```

pub mod action;
pub mod dependency;
pub mod diff;
pub mod error;
pub mod graph;
pub mod guard;
pub mod harness;
pub mod health;
pub mod lifecycle;
pub mod poller;
pub mod resource;
pub mod spec;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan};
pub use dependency::{
    Dependency, DependencyChange, DependencySet, OutputsSource, ResolutionContext,
};
pub use diff::ConfigDiff;
pub use error::{ExternalError, ExternalErrorKind, ResourceError, Result};
pub use graph::DependencyGraph;
pub use guard::check_immutable;
pub use harness::{Invocation, ProviderHarness};
pub use health::{HealthState, HealthStatus, LogEntry, LogLevel, LogStream};
pub use lifecycle::{HealthCheckable, Lifecycle, LifecycleState, LogSource, ResourceDriver};
pub use poller::{ConvergencePoller, Verdict};
pub use resource::{Config, Outputs, ResourceKey};
pub use spec::{CarriesSpec, Compile};
pub use state::{GlobalState, MemoryStore, ResourceRecord, StateManager};

pub use pragma_config::{PollSettings, Settings};
