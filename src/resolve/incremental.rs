use crate::status::CanonicalStatus::{self, *};
use crate::status::Status;
use tracing::debug;

/// Incremental resolution.
///
/// Deduces the new execution status from the former execution status and the
/// former and new status of the one step that changed. Returns `None` when
/// that is not enough and every step has to be tallied again.
///
/// Inputs are canonicalized before any rule runs.
pub fn resolve(
    new_step: Status,
    former_exec: Status,
    former_step: Status,
) -> Option<CanonicalStatus> {
    resolve_canonical(
        new_step.canonical(),
        former_exec.canonical(),
        former_step.canonical(),
    )
}

pub fn resolve_canonical(
    new_step: CanonicalStatus,
    former_exec: CanonicalStatus,
    former_step: CanonicalStatus,
) -> Option<CanonicalStatus> {
    if let Some(status) = trivial(new_step, former_exec, former_step) {
        debug!(%new_step, %former_exec, %former_step, %status, "resolved trivially");
        return Some(status);
    }

    if needs_rescan(new_step, former_exec, former_step) {
        debug!(%new_step, %former_exec, %former_step, "full rescan required");
        return None;
    }

    let resolved = by_new_status(new_step, former_exec);
    debug!(
        %new_step,
        %former_exec,
        %former_step,
        resolved = ?resolved,
        "resolved on new step status"
    );
    resolved
}

fn trivial(
    new_step: CanonicalStatus,
    former_exec: CanonicalStatus,
    former_step: CanonicalStatus,
) -> Option<CanonicalStatus> {
    if new_step == former_step {
        return Some(former_exec);
    }
    // A Running step still lets the execution fall back to Ready.
    if new_step == former_exec && new_step != Running {
        return Some(former_exec);
    }
    // The blocking step(s) were not touched.
    if former_exec == Blocked && former_step != Blocked {
        return Some(Blocked);
    }
    None
}

fn needs_rescan(
    new_step: CanonicalStatus,
    former_exec: CanonicalStatus,
    former_step: CanonicalStatus,
) -> bool {
    let unblocked = former_step == Blocked && new_step != Blocked;
    let left_former_cause = former_step == former_exec;
    unblocked || left_former_cause || new_step == Untestable
}

fn by_new_status(new_step: CanonicalStatus, former_exec: CanonicalStatus) -> Option<CanonicalStatus> {
    match new_step {
        Blocked => Some(Blocked),
        Failure => Some(Failure),
        // A Running step turning Success on a Ready execution does not give
        // Running: with no pending sibling left the execution is Success.
        Success => match former_exec {
            Failure => Some(Failure),
            _ => None,
        },
        Running => match former_exec {
            Failure => Some(Failure),
            Ready => Some(Ready),
            Running => None,
            _ => Some(Running),
        },
        Ready => match former_exec {
            Failure => Some(Failure),
            _ => None,
        },
        Settled | Untestable => None,
    }
}
