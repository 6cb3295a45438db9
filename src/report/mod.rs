//! Per-status tally over an execution's steps, built fresh for each full rescan.

use crate::status::{CanonicalStatus, ExecutionKind};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    /// The status is outside the legal set the report was built for.
    #[error("contract violation: {0} is not tracked by this status report")]
    UnexpectedStatus(CanonicalStatus),
}

/// Count of steps per canonical status.
///
/// Every tracked status starts at zero; the sum of counts always equals
/// [`StatusReport::total`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    counts: BTreeMap<CanonicalStatus, usize>,
    total: usize,
}

impl StatusReport {
    pub fn new(tracked: impl IntoIterator<Item = CanonicalStatus>) -> Self {
        Self {
            counts: tracked.into_iter().map(|s| (s, 0)).collect(),
            total: 0,
        }
    }

    /// Empty report tracking the canonical images of the kind's legal set.
    pub fn for_kind(kind: &ExecutionKind) -> Self {
        Self::new(kind.legal_statuses().canonical_images())
    }

    /// Report over every canonical status, filled from `statuses`.
    pub fn from_statuses(statuses: impl IntoIterator<Item = CanonicalStatus>) -> Self {
        let mut report = Self::new(CanonicalStatus::ALL);
        for status in statuses {
            // Every canonical status is tracked.
            *report.counts.entry(status).or_default() += 1;
            report.total += 1;
        }
        report
    }

    pub fn tally(&mut self, status: CanonicalStatus) -> Result<(), ReportError> {
        let count = self
            .counts
            .get_mut(&status)
            .ok_or(ReportError::UnexpectedStatus(status))?;
        *count += 1;
        self.total += 1;
        Ok(())
    }

    pub fn count(&self, status: CanonicalStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn has(&self, status: CanonicalStatus) -> bool {
        self.count(status) > 0
    }

    /// No counted step holds a status outside `statuses`.
    ///
    /// False for an empty report.
    pub fn all_of(&self, statuses: &[CanonicalStatus]) -> bool {
        if self.total == 0 {
            return false;
        }
        let mut seen = statuses.to_vec();
        seen.sort();
        seen.dedup();
        let covered: usize = seen.iter().map(|s| self.count(*s)).sum();
        covered == self.total
    }

    pub fn any_of(&self, statuses: &[CanonicalStatus]) -> bool {
        statuses.iter().any(|s| self.has(*s))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalStatus, usize)> + '_ {
        self.counts.iter().map(|(s, n)| (*s, *n))
    }
}
