//! Error taxonomy for the consistency engine
//!
//! Every failure carries the identifiers needed to diagnose it. Callers that
//! only care about the broad category use [`Error::kind`].

use std::fmt;

use thiserror::Error;

use crate::models::IterationStatus;

/// Broad error categories callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced entity does not exist
    NotFound,
    /// The request is structurally illegal (cycle, bad transition, XOR violation...)
    InvalidArgument,
    /// A primary key or generated ID collides with an existing row
    AlreadyExists,
    /// Storage-layer failure unrelated to domain rules
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::AlreadyExists => write!(f, "already exists"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Why an iteration status hop was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    /// planned -> complete skips the current stage
    SkipStage,
    /// Moving back towards planned
    Backward,
    /// complete is terminal
    Terminal,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionReason::SkipStage => write!(f, "transition skips a stage"),
            TransitionReason::Backward => write!(f, "transitions cannot move backwards"),
            TransitionReason::Terminal => write!(f, "complete is a terminal state"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("track {track_id} cannot depend on itself")]
    SelfDependency { track_id: String },

    #[error("cycle detected in track dependencies: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("iteration {number}: invalid transition {from} -> {to} ({reason})")]
    InvalidTransition {
        number: u32,
        from: IterationStatus,
        to: IterationStatus,
        reason: TransitionReason,
    },

    #[error("cannot start iteration {number}: iteration {current} is already current")]
    IterationAlreadyCurrent { number: u32, current: u32 },

    #[error("task {task_id} is already in iteration {number}")]
    TaskAlreadyInIteration { task_id: String, number: u32 },

    #[error("task {task_id} is not in iteration {number}")]
    TaskNotInIteration { task_id: String, number: u32 },

    #[error("malformed {expected} id: '{id}'")]
    MalformedId { expected: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lock error: {0}")]
    Lock(String),

    #[error("database schema version {found} is not supported (expected {expected})")]
    UnsupportedSchema { found: i32, expected: i32 },

    #[error("repository is closed")]
    Closed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } | Error::TaskNotInIteration { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. } | Error::TaskAlreadyInIteration { .. } => {
                ErrorKind::AlreadyExists
            }
            Error::SelfDependency { .. }
            | Error::CycleDetected { .. }
            | Error::InvalidTransition { .. }
            | Error::IterationAlreadyCurrent { .. }
            | Error::MalformedId { .. }
            | Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Storage(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Lock(_)
            | Error::UnsupportedSchema { .. }
            | Error::Closed => ErrorKind::Internal,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reclassifies SQLite constraint failures raised by a write.
///
/// Primary-key and unique violations become `AlreadyExists` for `entity`/`id`;
/// foreign-key and check violations become `InvalidArgument`. Anything else
/// is passed through as a storage error.
pub(crate) fn classify_write(err: rusqlite::Error, entity: &'static str, id: &str) -> Error {
    use rusqlite::ffi;

    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                return Error::AlreadyExists {
                    entity,
                    id: id.to_string(),
                };
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return Error::InvalidArgument(format!(
                    "{} {} is still referenced by other entities",
                    entity, id
                ));
            }
            ffi::SQLITE_CONSTRAINT_CHECK => {
                return Error::InvalidArgument(format!(
                    "{} {} violates a table constraint",
                    entity, id
                ));
            }
            _ => {}
        }
    }
    Error::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_cover_taxonomy() {
        assert!(Error::not_found("track", "PRJ-track-1").is(ErrorKind::NotFound));
        assert!(Error::CycleDetected { path: vec![] }.is(ErrorKind::InvalidArgument));
        assert!(Error::TaskAlreadyInIteration {
            task_id: "PRJ-task-1".into(),
            number: 1
        }
        .is(ErrorKind::AlreadyExists));
        assert!(Error::Closed.is(ErrorKind::Internal));
    }

    #[test]
    fn test_messages_embed_identifiers() {
        let err = Error::CycleDetected {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(
            err.to_string(),
            "cycle detected in track dependencies: A -> B -> A"
        );

        let err = Error::InvalidTransition {
            number: 3,
            from: IterationStatus::Planned,
            to: IterationStatus::Complete,
            reason: TransitionReason::SkipStage,
        };
        let msg = err.to_string();
        assert!(msg.contains("iteration 3"));
        assert!(msg.contains("planned -> complete"));
        assert!(msg.contains("skips a stage"));
    }
}
