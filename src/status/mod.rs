//! Status domain: every status a step or execution can hold, the canonical
//! subset used for aggregation, and the legal status sets per execution kind.

pub mod legal;

pub use self::legal::{ExecutionKind, StatusSet};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("unknown status: {0:?}")]
    Unknown(String),

    /// An automation-only status was handed to code that only accepts
    /// canonical statuses without being canonicalized first.
    #[error("contract violation: {0} is automation-only and must be canonicalized first")]
    NotCanonical(Status),

    #[error("invalid legal status set: {0}")]
    InvalidLegalSet(String),
}

/// Any status a step or an execution may hold.
///
/// The first seven variants are canonical; the last four are only produced
/// by automation tooling and each maps to exactly one canonical status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Blocked,
    Failure,
    Success,
    Running,
    Ready,
    Untestable,
    Settled,
    Warning,
    Error,
    NotRun,
    NotFound,
}

impl Status {
    pub const ALL: [Status; 11] = [
        Status::Blocked,
        Status::Failure,
        Status::Success,
        Status::Running,
        Status::Ready,
        Status::Untestable,
        Status::Settled,
        Status::Warning,
        Status::Error,
        Status::NotRun,
        Status::NotFound,
    ];

    /// Sort key. Not an aggregation priority.
    pub fn level(self) -> u8 {
        match self {
            Status::Blocked => 1,
            Status::Failure => 2,
            Status::Success => 3,
            Status::Running => 4,
            Status::Ready => 5,
            Status::Untestable => 6,
            Status::Settled => 7,
            Status::Warning => 8,
            Status::Error => 9,
            Status::NotRun => 10,
            Status::NotFound => 11,
        }
    }

    pub fn is_canonical(self) -> bool {
        !matches!(
            self,
            Status::Warning | Status::Error | Status::NotRun | Status::NotFound
        )
    }

    /// Canonical image of this status. Total and idempotent.
    pub fn canonical(self) -> CanonicalStatus {
        match self {
            Status::Blocked | Status::Error | Status::NotRun => CanonicalStatus::Blocked,
            Status::Failure => CanonicalStatus::Failure,
            Status::Success | Status::Warning => CanonicalStatus::Success,
            Status::Running => CanonicalStatus::Running,
            Status::Ready => CanonicalStatus::Ready,
            Status::Untestable | Status::NotFound => CanonicalStatus::Untestable,
            Status::Settled => CanonicalStatus::Settled,
        }
    }

    /// Whether a project may switch this status off.
    pub fn can_be_disabled(self) -> bool {
        matches!(self, Status::Untestable | Status::Settled)
    }

    pub fn default_enabled(self) -> bool {
        self != Status::Settled
    }

    /// A step holding this status has been worked through (it is neither
    /// `Ready` nor `Running`).
    pub fn is_terminal(self) -> bool {
        self.canonical().is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Blocked => "BLOCKED",
            Status::Failure => "FAILURE",
            Status::Success => "SUCCESS",
            Status::Running => "RUNNING",
            Status::Ready => "READY",
            Status::Untestable => "UNTESTABLE",
            Status::Settled => "SETTLED",
            Status::Warning => "WARNING",
            Status::Error => "ERROR",
            Status::NotRun => "NOT_RUN",
            Status::NotFound => "NOT_FOUND",
        }
    }
}

impl PartialOrd for Status {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Status {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.level().cmp(&other.level())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| StatusError::Unknown(s.to_string()))
    }
}

/// One of the seven statuses that can stand as an aggregate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Blocked,
    Failure,
    Success,
    Running,
    Ready,
    Untestable,
    Settled,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 7] = [
        CanonicalStatus::Blocked,
        CanonicalStatus::Failure,
        CanonicalStatus::Success,
        CanonicalStatus::Running,
        CanonicalStatus::Ready,
        CanonicalStatus::Untestable,
        CanonicalStatus::Settled,
    ];

    pub fn as_status(self) -> Status {
        match self {
            CanonicalStatus::Blocked => Status::Blocked,
            CanonicalStatus::Failure => Status::Failure,
            CanonicalStatus::Success => Status::Success,
            CanonicalStatus::Running => Status::Running,
            CanonicalStatus::Ready => Status::Ready,
            CanonicalStatus::Untestable => Status::Untestable,
            CanonicalStatus::Settled => Status::Settled,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, CanonicalStatus::Ready | CanonicalStatus::Running)
    }

    pub fn level(self) -> u8 {
        self.as_status().level()
    }
}

impl From<CanonicalStatus> for Status {
    fn from(status: CanonicalStatus) -> Self {
        status.as_status()
    }
}

/// Raw conversion: does not canonicalize. Use [`Status::canonical`] for that.
impl TryFrom<Status> for CanonicalStatus {
    type Error = StatusError;

    fn try_from(status: Status) -> Result<Self, Self::Error> {
        if status.is_canonical() {
            Ok(status.canonical())
        } else {
            Err(StatusError::NotCanonical(status))
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_status().as_str())
    }
}

impl FromStr for CanonicalStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalStatus::try_from(s.parse::<Status>()?)
    }
}
