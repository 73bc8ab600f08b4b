//! Splitting an archive by age.
//!
//! Records older than a cutoff move into the next numbered continuation
//! file; the primary keeps everything newer. `load_combined` later folds the
//! continuations back into one logical view.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use fedistash_core::{AccountId, ArchiveDocument, Collection};

/// The first unused continuation file for an account, with its index.
pub fn next_split_file(dir: &Path, account: &AccountId) -> (PathBuf, u32) {
    let mut n = 0;
    loop {
        let path = dir.join(account.split_file(n));
        if !path.is_file() {
            return (path, n);
        }
        n += 1;
    }
}

/// Move every record created before `cutoff` out of `document` into a new
/// document, preserving order on both sides. Records with an unparseable
/// timestamp stay in the primary. Returns the moved-out document and the
/// number of records it holds.
pub fn split_older_than(
    document: &mut ArchiveDocument,
    cutoff: DateTime<Utc>,
) -> (ArchiveDocument, usize) {
    let mut older = ArchiveDocument::default();
    let mut moved = 0;

    for collection in Collection::ALL {
        let records = std::mem::take(document.collection_mut(collection));
        let (old, new): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|record| record.created().is_some_and(|created| created < cutoff));

        moved += old.len();
        *older.collection_mut(collection) = old;
        *document.collection_mut(collection) = new;
    }

    (older, moved)
}
