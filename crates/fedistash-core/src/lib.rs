//! fedistash-core - Core types and the merge engine for the fedistash archiver.

pub mod document;
pub mod error;
pub mod feed;
pub mod merge;
pub mod record;
pub mod types;

pub use document::{ArchiveDocument, Collection};
pub use error::{ArchiveError, AuthError, Error, InvalidInputError, ProtocolError, TransportError};
pub use feed::FeedSource;
pub use merge::{MergeOptions, MergeOutcome, STOP_AFTER_DUPLICATES, reconcile};
pub use record::{FeedItem, Record};
pub use types::{AccountId, RecordId};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
