use super::{CanonicalStatus, Status, StatusError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An ordered set of statuses, serialized as a list of status names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSet(BTreeSet<Status>);

impl StatusSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven canonical statuses, the legal set of a manual execution.
    pub fn canonical() -> Self {
        CanonicalStatus::ALL.into_iter().map(Status::from).collect()
    }

    /// Every status, canonical and automation-only.
    pub fn all() -> Self {
        Status::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, status: Status) -> bool {
        self.0.insert(status)
    }

    pub fn contains(&self, status: Status) -> bool {
        self.0.contains(&status)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Status> + '_ {
        self.0.iter().copied()
    }

    /// Canonical images of the members, deduplicated and ordered.
    pub fn canonical_images(&self) -> BTreeSet<CanonicalStatus> {
        self.0.iter().map(|s| s.canonical()).collect()
    }
}

impl FromIterator<Status> for StatusSet {
    fn from_iter<I: IntoIterator<Item = Status>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|s| s.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// How an execution is run, which decides the statuses it may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionKind {
    /// Run by a human: the fixed canonical set.
    Manual,
    /// Run by a tool: the legal set comes from the automation extender.
    Automated(StatusSet),
}

impl ExecutionKind {
    /// Build an automated kind. The set must allow `READY`, the status every
    /// step starts in.
    pub fn automated(legal: StatusSet) -> Result<Self, StatusError> {
        if legal.is_empty() {
            return Err(StatusError::InvalidLegalSet(
                "automated legal set is empty".to_string(),
            ));
        }
        if !legal.contains(Status::Ready) {
            return Err(StatusError::InvalidLegalSet(format!(
                "automated legal set {} does not contain READY",
                legal
            )));
        }
        Ok(ExecutionKind::Automated(legal))
    }

    pub fn is_automated(&self) -> bool {
        matches!(self, ExecutionKind::Automated(_))
    }

    pub fn legal_statuses(&self) -> StatusSet {
        match self {
            ExecutionKind::Manual => StatusSet::canonical(),
            ExecutionKind::Automated(legal) => legal.clone(),
        }
    }

    pub fn is_legal(&self, status: Status) -> bool {
        match self {
            ExecutionKind::Manual => status.is_canonical(),
            ExecutionKind::Automated(legal) => legal.contains(status),
        }
    }

    /// Legal status an execution of this kind holds for a derived canonical
    /// status: the canonical status itself when legal, else the lowest-level
    /// legal status with that canonical image.
    pub fn legal_representative(&self, status: CanonicalStatus) -> Option<Status> {
        match self {
            ExecutionKind::Manual => Some(status.into()),
            ExecutionKind::Automated(legal) => {
                if legal.contains(status.into()) {
                    Some(status.into())
                } else {
                    legal.iter().find(|s| s.canonical() == status)
                }
            }
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionKind::Manual => write!(f, "manual"),
            ExecutionKind::Automated(_) => write!(f, "automated"),
        }
    }
}
