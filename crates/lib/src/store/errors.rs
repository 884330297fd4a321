//! Error types for store operations.

use thiserror::Error;

use crate::value::Id;

/// Structured error types for store mutations.
///
/// Unknown ids passed to `remove` or the query methods are not errors; they
/// are skipped silently. These variants cover the cases where the store must
/// refuse to proceed.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// An add-family operation saw an id that is already present.
    #[error("cannot add record: id {id} already exists")]
    DuplicateId { id: Id },

    /// An update payload carried no id field.
    #[error("cannot update record: record has no id field")]
    MissingId,

    /// A move would place a record inside its own subtree.
    #[error("cannot move {id}: target {target} is inside its subtree")]
    InvalidMove { id: Id, target: Id },

    /// A positional operation referenced an id the store does not hold.
    #[error("target record {id} not found")]
    TargetNotFound { id: Id },

    /// A tree export encountered a record whose parent is not in the store.
    #[error("record {id} references missing parent {parent}")]
    OrphanRecord { id: Id, parent: Id },
}

impl StoreError {
    /// Check if this error indicates an id collision.
    pub fn is_duplicate_id(&self) -> bool {
        matches!(self, StoreError::DuplicateId { .. })
    }

    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::TargetNotFound { .. })
    }

    /// Check if this error indicates a rejected move.
    pub fn is_invalid_move(&self) -> bool {
        matches!(self, StoreError::InvalidMove { .. })
    }

    /// Check if this error indicates broken parent links in the data.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, StoreError::OrphanRecord { .. })
    }

    /// Get the id involved, if the variant carries one.
    pub fn id(&self) -> Option<&Id> {
        match self {
            StoreError::DuplicateId { id }
            | StoreError::InvalidMove { id, .. }
            | StoreError::TargetNotFound { id }
            | StoreError::OrphanRecord { id, .. } => Some(id),
            StoreError::MissingId => None,
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
