use thiserror::Error;

use crate::api::ApiError;

/// Broad class of a failed run, used to report and to assert on outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The run was refused before any mutation.
    Precondition,
    /// A directory call failed; earlier mutations of the run stay applied.
    Directory,
    /// A listing returned more records than the configured limit.
    UnsupportedScale,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid course id {0:?}: course ids may not contain whitespace")]
    InvalidCourseId(String),

    #[error("Course {0} was not found")]
    ParentNotFound(String),

    #[error("Course {0} has no merged children")]
    NoChildren(String),

    #[error("External id {0} is used by more than one course in the merge")]
    DuplicateExternalId(String),

    #[error("Enrollment of {user_name} refers to unknown child course {child_course_id}")]
    UnresolvedEnrollment {
        user_name: String,
        child_course_id: String,
    },

    #[error("{operation} failed: {source}")]
    Directory {
        operation: &'static str,
        #[source]
        source: ApiError,
    },
}

impl SyncError {
    pub fn directory(operation: &'static str) -> impl FnOnce(ApiError) -> SyncError {
        move |source| SyncError::Directory { operation, source }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Directory {
                source: ApiError::ResultLimitExceeded { .. },
                ..
            } => FailureKind::UnsupportedScale,
            SyncError::Directory { .. } | SyncError::UnresolvedEnrollment { .. } => {
                FailureKind::Directory
            }
            SyncError::InvalidCourseId(_)
            | SyncError::ParentNotFound(_)
            | SyncError::NoChildren(_)
            | SyncError::DuplicateExternalId(_) => FailureKind::Precondition,
        }
    }

    /// Status of the failing directory call, if it returned one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Directory { source, .. } => source.status(),
            _ => None,
        }
    }
}
