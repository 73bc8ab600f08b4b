//! fedistash-store - Durable persistence for archive documents.
//!
//! One JSON document per account, crash-safe saves through a rename-based
//! backup, and a read-only combined view over split archives.

pub mod split;
pub mod store;

pub use split::{next_split_file, split_older_than};
pub use store::{BackupConflict, all_accounts, backup_path, load, load_combined, save};
