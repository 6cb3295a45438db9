//! Execution aggregate: an ordered sequence of steps and the status derived
//! from them.
//!
//! The execution status is only ever written by
//! [`Execution::change_step_status`] and [`Execution::remove_step`], so it
//! always equals a full tally of the steps. Both return a
//! [`StatusChangeOutcome`] carrying at most one [`ParentNotification`] for the
//! caller to apply to the scheduling item; the aggregate never calls out.

pub mod registry;

pub use self::registry::ExecutionRegistry;

use crate::report::{ReportError, StatusReport};
use crate::resolve::{self, ResolutionPath};
use crate::status::{CanonicalStatus, ExecutionKind, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("status {status} is not legal for {kind} executions")]
    IllegalStatus { status: Status, kind: ExecutionKind },

    #[error("unknown step {0}")]
    UnknownStep(StepId),

    #[error("unknown execution {0}")]
    UnknownExecution(ExecutionId),

    #[error(transparent)]
    Report(#[from] ReportError),
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

uuid_id!(
    /// Identifies an execution.
    ExecutionId
);
uuid_id!(
    /// Identifies a step within its execution.
    StepId
);
uuid_id!(
    /// The scheduling item (test plan item) that owns an execution.
    ParentRef
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    id: StepId,
    status: Status,
}

impl Step {
    fn new() -> Self {
        Self {
            id: StepId::new(),
            status: Status::Ready,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Upward propagation event: the execution status changed, so the owning
/// scheduling item has to recompute its own status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentNotification {
    pub execution: ExecutionId,
    pub parent: ParentRef,
    pub previous: Status,
    pub current: Status,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChangeOutcome {
    pub execution: ExecutionId,
    pub previous: Status,
    pub current: Status,
    pub changed: bool,
    pub path: ResolutionPath,
    pub notification: Option<ParentNotification>,
}

impl StatusChangeOutcome {
    pub fn notified_parent(&self) -> bool {
        self.notification.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Execution {
    id: ExecutionId,
    parent: ParentRef,
    kind: ExecutionKind,
    steps: Vec<Step>,
    status: Status,
}

impl Execution {
    /// New execution with `step_count` steps, all `READY`.
    pub fn new(parent: ParentRef, kind: ExecutionKind, step_count: usize) -> Self {
        Self::with_id(ExecutionId::new(), parent, kind, step_count)
    }

    pub fn with_id(
        id: ExecutionId,
        parent: ParentRef,
        kind: ExecutionKind,
        step_count: usize,
    ) -> Self {
        Self {
            id,
            parent,
            kind,
            steps: (0..step_count).map(|_| Step::new()).collect(),
            status: Status::Ready,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn parent(&self) -> ParentRef {
        self.parent
    }

    pub fn kind(&self) -> &ExecutionKind {
        &self.kind
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step at `index` in execution order.
    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// First step that still has to be worked through.
    pub fn first_unexecuted_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| !s.is_terminal())
    }

    /// First step that has not been started.
    pub fn first_runnable_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status == Status::Ready)
    }

    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn is_last_step(&self, id: StepId) -> bool {
        self.last_step().is_some_and(|s| s.id == id)
    }

    /// Fresh tally of every step, keyed by the kind's legal set.
    pub fn status_report(&self) -> Result<StatusReport, ReportError> {
        let mut report = StatusReport::for_kind(&self.kind);
        for step in &self.steps {
            report.tally(step.status.canonical())?;
        }
        Ok(report)
    }

    /// Set one step's status and bring the execution status up to date.
    ///
    /// Fails without touching any state when the status is not legal for
    /// this execution's kind, when the step is unknown, or when no legal
    /// status stands for the derived execution status.
    pub fn change_step_status(
        &mut self,
        step_id: StepId,
        new_status: Status,
    ) -> Result<StatusChangeOutcome, ExecutionError> {
        self.ensure_legal(new_status)?;
        let index = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or(ExecutionError::UnknownStep(step_id))?;

        let former_step = self.steps[index].status;
        self.steps[index].status = new_status;

        let resolution = resolve::compute(new_status, self.status, former_step, || {
            self.status_report()
        });
        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(e) => {
                self.steps[index].status = former_step;
                return Err(e.into());
            }
        };
        debug!(
            execution = %self.id,
            step = %step_id,
            %former_step,
            %new_status,
            resolved = %resolution.status,
            path = %resolution.path,
            "step status changed"
        );

        let status = match self.legal_aggregate(resolution.status) {
            Ok(status) => status,
            Err(e) => {
                self.steps[index].status = former_step;
                return Err(e);
            }
        };

        Ok(self.adopt(status, resolution.path))
    }

    /// Remove a step and recompute the execution status from the remaining ones.
    pub fn remove_step(&mut self, step_id: StepId) -> Result<StatusChangeOutcome, ExecutionError> {
        let index = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or(ExecutionError::UnknownStep(step_id))?;
        let removed = self.steps.remove(index);

        let recomputed = self
            .status_report()
            .map_err(ExecutionError::from)
            .map(|report| resolve::aggregate(&report))
            .and_then(|status| self.legal_aggregate(status));
        let status = match recomputed {
            Ok(status) => status,
            Err(e) => {
                self.steps.insert(index, removed);
                return Err(e);
            }
        };
        debug!(execution = %self.id, step = %step_id, resolved = %status, "step removed");

        Ok(self.adopt(status, ResolutionPath::FullRescan))
    }

    fn adopt(&mut self, resolved: Status, path: ResolutionPath) -> StatusChangeOutcome {
        let previous = self.status;
        let changed = previous != resolved;
        if changed {
            self.status = resolved;
            info!(
                execution = %self.id,
                %previous,
                current = %self.status,
                "execution status changed"
            );
        }
        let notification = changed.then(|| ParentNotification {
            execution: self.id,
            parent: self.parent,
            previous,
            current: self.status,
            emitted_at: Utc::now(),
        });
        StatusChangeOutcome {
            execution: self.id,
            previous,
            current: self.status,
            changed,
            path,
            notification,
        }
    }

    fn ensure_legal(&self, status: Status) -> Result<(), ExecutionError> {
        if self.kind.is_legal(status) {
            return Ok(());
        }
        warn!(execution = %self.id, %status, kind = %self.kind, "rejected illegal status");
        Err(ExecutionError::IllegalStatus {
            status,
            kind: self.kind.clone(),
        })
    }

    /// The legal status standing for a derived canonical status.
    fn legal_aggregate(&self, status: CanonicalStatus) -> Result<Status, ExecutionError> {
        if let Some(legal) = self.kind.legal_representative(status) {
            return Ok(legal);
        }
        warn!(execution = %self.id, %status, kind = %self.kind, "derived status is not legal");
        Err(ExecutionError::IllegalStatus {
            status: status.into(),
            kind: self.kind.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusSet;
    use proptest::prelude::*;

    fn manual(steps: usize) -> Execution {
        Execution::new(ParentRef::new(), ExecutionKind::Manual, steps)
    }

    fn step_ids(execution: &Execution) -> Vec<StepId> {
        execution.steps().iter().map(|s| s.id()).collect()
    }

    #[test]
    fn test_new_execution_is_ready() {
        let execution = manual(3);
        assert_eq!(execution.status(), Status::Ready);
        assert_eq!(execution.len(), 3);
        assert!(execution.steps().iter().all(|s| s.status() == Status::Ready));
    }

    #[test]
    fn test_blocked_step_blocks_execution_and_notifies() {
        let mut execution = manual(3);
        let ids = step_ids(&execution);

        execution.change_step_status(ids[0], Status::Success).unwrap();

        let outcome = execution.change_step_status(ids[1], Status::Blocked).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous, Status::Running);
        assert_eq!(outcome.current, Status::Blocked);
        assert_eq!(outcome.path, ResolutionPath::Incremental);

        let notification = outcome.notification.unwrap();
        assert_eq!(notification.parent, execution.parent());
        assert_eq!(notification.current, Status::Blocked);
    }

    #[test]
    fn test_same_status_is_a_no_op() {
        let mut execution = manual(2);
        let ids = step_ids(&execution);
        execution.change_step_status(ids[0], Status::Success).unwrap();

        let outcome = execution.change_step_status(ids[0], Status::Success).unwrap();
        assert!(!outcome.changed);
        assert!(!outcome.notified_parent());
        assert_eq!(execution.status(), Status::Running);
    }

    #[test]
    fn test_unblocking_rescans_and_stays_blocked() {
        let mut execution = manual(3);
        let ids = step_ids(&execution);
        execution.change_step_status(ids[0], Status::Blocked).unwrap();
        execution.change_step_status(ids[1], Status::Blocked).unwrap();

        let outcome = execution.change_step_status(ids[0], Status::Success).unwrap();
        assert_eq!(outcome.path, ResolutionPath::FullRescan);
        assert!(!outcome.changed);
        assert_eq!(execution.status(), Status::Blocked);

        let outcome = execution.change_step_status(ids[1], Status::Success).unwrap();
        assert!(outcome.changed);
        assert_eq!(execution.status(), Status::Running);
    }

    #[test]
    fn test_full_run_reaches_success() {
        let mut execution = manual(3);
        for id in step_ids(&execution) {
            execution.change_step_status(id, Status::Running).unwrap();
            execution.change_step_status(id, Status::Success).unwrap();
        }
        assert_eq!(execution.status(), Status::Success);
        assert!(execution.first_unexecuted_step().is_none());
    }

    #[test]
    fn test_illegal_status_leaves_state_unchanged() {
        let mut execution = manual(2);
        let ids = step_ids(&execution);

        let err = execution.change_step_status(ids[0], Status::Warning).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::IllegalStatus {
                status: Status::Warning,
                kind: ExecutionKind::Manual,
            }
        );
        assert_eq!(execution.status(), Status::Ready);
        assert_eq!(execution.steps()[0].status(), Status::Ready);
    }

    #[test]
    fn test_unknown_step() {
        let mut execution = manual(1);
        let missing = StepId::new();
        assert_eq!(
            execution.change_step_status(missing, Status::Success),
            Err(ExecutionError::UnknownStep(missing))
        );
        assert_eq!(
            execution.remove_step(missing),
            Err(ExecutionError::UnknownStep(missing))
        );
    }

    #[test]
    fn test_automated_statuses_resolve_through_canonical_images() {
        let kind = ExecutionKind::automated(StatusSet::all()).unwrap();
        let mut execution = Execution::new(ParentRef::new(), kind, 2);
        let ids = step_ids(&execution);

        let outcome = execution.change_step_status(ids[0], Status::Warning).unwrap();
        assert_eq!(outcome.current, Status::Running);

        let outcome = execution.change_step_status(ids[1], Status::NotFound).unwrap();
        assert_eq!(outcome.current, Status::Success);

        let outcome = execution.change_step_status(ids[1], Status::Error).unwrap();
        assert_eq!(outcome.current, Status::Blocked);
    }

    #[test]
    fn test_automated_rejects_statuses_outside_extender_set() {
        let legal: StatusSet = [Status::Ready, Status::Success, Status::Running]
            .into_iter()
            .collect();
        let kind = ExecutionKind::automated(legal).unwrap();
        let mut execution = Execution::new(ParentRef::new(), kind, 2);
        let ids = step_ids(&execution);

        assert!(execution.change_step_status(ids[0], Status::Failure).is_err());
        execution.change_step_status(ids[0], Status::Success).unwrap();
        assert_eq!(execution.status(), Status::Running);
    }

    #[test]
    fn test_illegal_derived_status_is_rolled_back() {
        // No RUNNING in the set: a half-done execution has no legal status.
        let legal: StatusSet = [Status::Ready, Status::Success].into_iter().collect();
        let kind = ExecutionKind::automated(legal).unwrap();
        let mut execution = Execution::new(ParentRef::new(), kind, 2);
        let ids = step_ids(&execution);

        let err = execution.change_step_status(ids[0], Status::Success).unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::IllegalStatus { status: Status::Running, .. }
        ));
        assert_eq!(execution.steps()[0].status(), Status::Ready);
        assert_eq!(execution.status(), Status::Ready);
    }

    #[test]
    fn test_remove_step_recomputes() {
        let mut execution = manual(3);
        let ids = step_ids(&execution);
        execution.change_step_status(ids[0], Status::Success).unwrap();
        execution.change_step_status(ids[1], Status::Failure).unwrap();
        assert_eq!(execution.status(), Status::Failure);

        let outcome = execution.remove_step(ids[1]).unwrap();
        assert_eq!(outcome.path, ResolutionPath::FullRescan);
        assert_eq!(outcome.current, Status::Running);
        assert!(outcome.notified_parent());

        let outcome = execution.remove_step(ids[2]).unwrap();
        assert_eq!(outcome.current, Status::Success);
        assert_eq!(execution.len(), 1);
    }

    #[test]
    fn test_step_queries() {
        let mut execution = manual(4);
        let ids = step_ids(&execution);
        execution.change_step_status(ids[0], Status::Success).unwrap();
        execution.change_step_status(ids[1], Status::Running).unwrap();

        assert_eq!(execution.first_unexecuted_step().map(Step::id), Some(ids[1]));
        assert_eq!(execution.first_runnable_step().map(Step::id), Some(ids[2]));
        assert_eq!(execution.last_step().map(Step::id), Some(ids[3]));
        assert!(execution.is_last_step(ids[3]));
        assert!(!execution.is_last_step(ids[0]));
        assert_eq!(execution.step_at(1).map(Step::status), Some(Status::Running));

        let report = execution.status_report().unwrap();
        assert_eq!(report.total(), 4);
        assert_eq!(report.count(CanonicalStatus::Ready), 2);
    }

    #[test]
    fn test_settled_step_next_to_ready_step_is_running() {
        let mut execution = manual(2);
        let ids = step_ids(&execution);

        let outcome = execution.change_step_status(ids[0], Status::Settled).unwrap();
        assert_eq!(outcome.current, Status::Running);
        assert_eq!(
            execution.status().canonical(),
            resolve::aggregate(&execution.status_report().unwrap())
        );
    }

    #[test]
    fn test_automated_stores_legal_member_for_derived_status() {
        let legal: StatusSet = [Status::Ready, Status::Running, Status::Success, Status::Error]
            .into_iter()
            .collect();
        let kind = ExecutionKind::automated(legal).unwrap();
        let mut execution = Execution::new(ParentRef::new(), kind, 2);
        let ids = step_ids(&execution);

        let outcome = execution.change_step_status(ids[0], Status::Error).unwrap();
        assert_eq!(outcome.current, Status::Error);
        assert_eq!(outcome.notification.unwrap().current, Status::Error);
        assert!(execution.kind().is_legal(execution.status()));

        // Still blocked: same stored member, nothing to propagate.
        let outcome = execution.change_step_status(ids[1], Status::Success).unwrap();
        assert!(!outcome.changed);
        assert_eq!(execution.status(), Status::Error);

        let outcome = execution.change_step_status(ids[0], Status::Success).unwrap();
        assert_eq!(outcome.current, Status::Success);
        assert!(execution.kind().is_legal(execution.status()));
    }

    #[test]
    fn test_empty_execution() {
        let execution = manual(0);
        assert!(execution.is_empty());
        assert!(execution.first_unexecuted_step().is_none());
        assert_eq!(
            resolve::aggregate(&execution.status_report().unwrap()),
            CanonicalStatus::Ready
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Change(usize, Status),
        Remove(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0..16usize, prop::sample::select(Status::ALL.to_vec()))
                .prop_map(|(i, s)| Op::Change(i, s)),
            1 => (0..16usize).prop_map(Op::Remove),
        ]
    }

    fn execution_kind() -> impl Strategy<Value = ExecutionKind> {
        let restricted: StatusSet = [
            Status::Ready,
            Status::Running,
            Status::Success,
            Status::Error,
            Status::NotFound,
        ]
        .into_iter()
        .collect();
        prop_oneof![
            Just(ExecutionKind::Manual),
            Just(ExecutionKind::Automated(StatusSet::all())),
            Just(ExecutionKind::Automated(restricted)),
        ]
    }

    proptest! {
        #[test]
        fn prop_stored_status_matches_full_tally(
            kind in execution_kind(),
            steps in 0..12usize,
            ops in prop::collection::vec(op(), 0..64),
        ) {
            let mut execution = Execution::new(ParentRef::new(), kind, steps);
            for op in ops {
                if execution.is_empty() {
                    break;
                }
                let step = execution.steps()[match op {
                    Op::Change(i, _) | Op::Remove(i) => i % execution.len(),
                }]
                .id();
                let before = execution.status();
                let result = match op {
                    Op::Change(_, status) => execution.change_step_status(step, status),
                    Op::Remove(_) => execution.remove_step(step),
                };
                match result {
                    Ok(outcome) => {
                        prop_assert_eq!(outcome.changed, outcome.notification.is_some());
                        prop_assert_eq!(outcome.current, execution.status());
                    }
                    Err(_) => {
                        prop_assert_eq!(before, execution.status());
                    }
                }

                let report = execution.status_report().unwrap();
                prop_assert_eq!(execution.status().canonical(), resolve::aggregate(&report));
                prop_assert!(execution.kind().is_legal(execution.status()));
            }
        }
    }
}
