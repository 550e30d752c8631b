//! Conductor
//!
//! Classifies a request, plans it into steps, executes the steps in order
//! and answers, keeping per-session conversation memory along the way.

pub mod classifier;
pub mod error;
pub mod executor;
pub mod memory;
pub mod planner;
pub mod resolver;
pub mod router;
pub mod types;

pub use classifier::Classifier;
pub use error::{RouteError, StepError};
pub use executor::Executor;
pub use memory::{MemoryStore, RecordOutcome};
pub use planner::Planner;
pub use router::{AskResponse, RequestRouter, SessionRegistry, Stage};
pub use types::{
    AgentKind, Intent, ParamValue, Plan, PlanStep, StepRef, StepReportEntry, StepResult,
    StepStatus, Turn,
};
