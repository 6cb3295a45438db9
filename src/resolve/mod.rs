//! Execution status resolution: the full aggregator and the incremental
//! resolver that avoids it whenever the changed step alone is conclusive.

pub mod aggregator;
pub mod incremental;

pub use self::aggregator::aggregate;
pub use self::incremental::{resolve, resolve_canonical};

use crate::report::{ReportError, StatusReport};
use crate::status::{CanonicalStatus, Status};
use serde::Serialize;
use std::fmt;

/// Which path produced a resolved status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    Incremental,
    FullRescan,
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ResolutionPath::Incremental => "incremental",
            ResolutionPath::FullRescan => "full-rescan",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub status: CanonicalStatus,
    pub path: ResolutionPath,
}

/// Resolve incrementally, falling back to `rescan` for a full tally.
///
/// `rescan` is only called when the incremental resolver is inconclusive.
pub fn compute<F>(
    new_step: Status,
    former_exec: Status,
    former_step: Status,
    rescan: F,
) -> Result<Resolution, ReportError>
where
    F: FnOnce() -> Result<StatusReport, ReportError>,
{
    match resolve(new_step, former_exec, former_step) {
        Some(status) => Ok(Resolution {
            status,
            path: ResolutionPath::Incremental,
        }),
        None => {
            let report = rescan()?;
            Ok(Resolution {
                status: aggregate(&report),
                path: ResolutionPath::FullRescan,
            })
        }
    }
}
