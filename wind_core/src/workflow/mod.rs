//! # Calculation Workflow
//!
//! - [`machine`]: pure state type, transition function, undo history and event log
//! - [`runner`]: tokio-driven orchestration of one in-flight calculation

pub mod machine;
pub mod runner;

pub use machine::{transition, EventRecord, WorkflowContext, WorkflowEvent, WorkflowMachine, WorkflowState};
pub use runner::{CalculationWorkflow, ProgressHandle};
