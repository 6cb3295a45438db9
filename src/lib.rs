//! execstatus -- incremental status resolution for test executions.
//!
//! A test execution is an ordered run of steps. This crate keeps the
//! execution-level status up to date as single steps change, deducing it
//! from the changed step where that is conclusive and falling back to a full
//! tally of every step otherwise.

pub mod config;
pub mod execution;
pub mod report;
pub mod resolve;
pub mod status;

pub use execution::{
    Execution, ExecutionError, ExecutionId, ExecutionRegistry, ParentNotification, ParentRef,
    StatusChangeOutcome, Step, StepId,
};
pub use report::StatusReport;
pub use resolve::{aggregate, resolve, Resolution, ResolutionPath};
pub use status::{CanonicalStatus, ExecutionKind, Status, StatusSet};
