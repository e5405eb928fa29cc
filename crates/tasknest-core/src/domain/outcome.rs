//! Outcome of a repository mutation.
//!
//! Mutations addressing a missing record, or breaking a store rule, leave the document
//! untouched and say so through [`Outcome`] instead of an error.

use std::fmt;

use super::ids::ProjectId;

/// Store rule a mutation would have broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// The store holds a single bucket in total.
    LastBucket,
    /// No bucket of the project would remain to receive its tasks.
    LastBucketOfProject { project_id: ProjectId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastBucket => f.write_str("the last bucket cannot be deleted"),
            Self::LastBucketOfProject { project_id } => {
                write!(f, "the last bucket of {project_id} cannot be deleted")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    NotFound,
    Rejected(InvariantViolation),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Applied(value) => Outcome::Applied(f(value)),
            Self::NotFound => Outcome::NotFound,
            Self::Rejected(violation) => Outcome::Rejected(violation),
        }
    }
}
