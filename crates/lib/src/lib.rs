//!
//! Rowset: an in-memory tabular data engine.
//!
//! This library backs grid-style frontends with a record store that is flat
//! by default and optionally hierarchical, tracks changes against a saved
//! snapshot, and notifies subscribers of every mutation.
//!
//! ## Core Concepts
//!
//! * **Records (`record::Record`)**: open maps from field names to values,
//!   identified by a configurable id field. Ids are auto-generated UUIDs when
//!   absent; typed fields are coerced per the configured schema on ingestion.
//! * **DataSet (`store::DataSet`)**: the store itself, an insertion-ordered
//!   array plus an id index. In tree mode every record's subtree is stored
//!   contiguously right after it (pre-order layout), which keeps subtree
//!   operations index-based and cheap.
//! * **Ordering (`sort::Order`)**: stable multi-key merge sorting, used by
//!   queries and by tree renormalization. Rows with equal keys keep their
//!   relative order.
//! * **Diffing (`diff::Diff`)**: `save()` captures an id-sorted snapshot;
//!   `diff()` classifies every record as added, updated or deleted with an
//!   O(n) two-pointer scan.
//! * **Events (`events::Event`)**: subscribe/unsubscribe/trigger with a mute
//!   flag; multi-step rewrites surface as a single event.
//! * **Sources (`fetch::Source`)**: the async boundary for loading flat or
//!   hierarchical payloads over HTTP (or anything else) and for
//!   server-confirmed removal.

pub mod diff;
pub mod events;
pub mod fetch;
pub mod options;
pub mod record;
pub mod sort;
pub mod store;
pub mod types;
pub mod value;

pub use diff::Diff;
pub use events::{Event, EventKind, Subscription};
pub use fetch::{FetchError, HttpSource, Source};
pub use options::Options;
pub use record::{Projection, Record};
pub use sort::Order;
pub use store::{DataSet, Position, Query, StoreError};
pub use types::{FieldType, TypeError};
pub use value::{Id, Value};

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured store errors from the store module
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured typing errors from the types module
    #[error(transparent)]
    Type(types::TypeError),

    /// Structured remote-boundary errors from the fetch module
    #[error(transparent)]
    Fetch(fetch::FetchError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Serialize(_) => "serialize",
            Error::Store(_) => "store",
            Error::Type(_) => "types",
            Error::Fetch(_) => "fetch",
        }
    }

    /// Check if this error indicates an id collision.
    pub fn is_duplicate_id(&self) -> bool {
        match self {
            Error::Store(err) => err.is_duplicate_id(),
            _ => false,
        }
    }

    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a rejected move.
    pub fn is_invalid_move(&self) -> bool {
        match self {
            Error::Store(err) => err.is_invalid_move(),
            _ => false,
        }
    }

    /// Check if this error is typing-related.
    pub fn is_type_error(&self) -> bool {
        matches!(self, Error::Type(_))
    }

    /// Check if this error came from the remote boundary.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Error::Fetch(_))
    }
}
