//! Error taxonomy for planning requests and geo providers.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Machine-readable error kind. Callers branch on this, never on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MissingInput,
    InvalidLocation,
    InfeasibleGroup,
    NoSolution,
}

/// Outcome of a routing search, using the routing status codes of the
/// underlying search (0..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverStatus {
    NotSolved,
    Success,
    Fail,
    FailTimeout,
    Invalid,
}

impl SolverStatus {
    pub fn code(self) -> i32 {
        match self {
            SolverStatus::NotSolved => 0,
            SolverStatus::Success => 1,
            SolverStatus::Fail => 2,
            SolverStatus::FailTimeout => 3,
            SolverStatus::Invalid => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::NotSolved => "ROUTING_NOT_SOLVED",
            SolverStatus::Success => "ROUTING_SUCCESS",
            SolverStatus::Fail => "ROUTING_FAIL",
            SolverStatus::FailTimeout => "ROUTING_FAIL_TIMEOUT",
            SolverStatus::Invalid => "ROUTING_INVALID",
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to the caller of the planner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// Absent stores, groups, or user location.
    #[error("missing required input: {what}")]
    MissingInput { what: String },

    /// Coordinates that cannot be parsed into a valid location.
    #[error("invalid location: {message}")]
    InvalidLocation { message: String },

    /// A required group has no candidate at any store.
    #[error("no items available for required group {index} ({label}); cannot find a valid plan")]
    InfeasibleGroup { index: usize, label: String },

    /// The search finished without a feasible assignment.
    #[error("solver did not find a solution (status: {status})")]
    NoSolution { status: SolverStatus },
}

impl PlanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanError::MissingInput { .. } => ErrorKind::MissingInput,
            PlanError::InvalidLocation { .. } => ErrorKind::InvalidLocation,
            PlanError::InfeasibleGroup { .. } => ErrorKind::InfeasibleGroup,
            PlanError::NoSolution { .. } => ErrorKind::NoSolution,
        }
    }

    pub(crate) fn missing(what: impl Into<String>) -> Self {
        PlanError::MissingInput { what: what.into() }
    }

    pub(crate) fn invalid_location(message: impl Into<String>) -> Self {
        PlanError::InvalidLocation {
            message: message.into(),
        }
    }
}

impl Serialize for PlanError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("kind", &self.kind())?;
        map.serialize_entry("message", &self.to_string())?;
        match self {
            PlanError::InfeasibleGroup { index, label } => {
                map.serialize_entry("group_index", index)?;
                map.serialize_entry("group", label)?;
            }
            PlanError::NoSolution { status } => {
                map.serialize_entry("solver_status_code", &status.code())?;
                map.serialize_entry("solver_status", status.as_str())?;
            }
            PlanError::MissingInput { .. } | PlanError::InvalidLocation { .. } => {}
        }
        map.end()
    }
}

/// Failure of a remote geo provider. Never reaches the caller: the geo layer
/// logs it and degrades to local computation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured")]
    MissingCredentials,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}
