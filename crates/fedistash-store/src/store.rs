//! Durable load/save of archive documents.
//!
//! Saves are transactional: the new document is written to a temporary file,
//! the previous primary is renamed to a `~`-suffixed backup, and the
//! temporary file is renamed into place. The primary is never truncated in
//! place; either the save fully succeeds or the prior state remains intact.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use fedistash_core::{AccountId, ArchiveDocument, ArchiveError, Result};

/// Decision when a save would overwrite an existing backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupConflict {
    /// Replace the old backup with the current primary.
    Overwrite,
    /// Abort the save, leaving both primary and backup untouched.
    Abort,
}

/// The backup file that pairs with an archive path.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push("~");
    PathBuf::from(name)
}

fn is_present(path: &Path) -> bool {
    // A zero-byte file (e.g. left by an interrupted tool) counts as absent.
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Load the archive document at `path`.
///
/// Returns `None` if the file is absent (or empty) and `required` is false;
/// fails with [`ArchiveError::Missing`] when `required` is true.
#[instrument]
pub fn load(path: &Path, required: bool) -> Result<Option<ArchiveDocument>> {
    if !is_present(path) {
        if required {
            return Err(ArchiveError::Missing {
                path: path.to_path_buf(),
            }
            .into());
        }
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(ArchiveError::from)?;
    let document = serde_json::from_str(&content).map_err(ArchiveError::from)?;
    debug!(path = %path.display(), "loaded archive");
    Ok(Some(document))
}

/// Load an account's archive, optionally folding split continuation files
/// into a combined read-only view.
///
/// Continuation files follow the `<domain>.user.<name>.<N>.json` convention
/// and are appended most-recently-split first, so the combined collections
/// stay ordered newest-first. The files on disk are not rewritten.
#[instrument(skip(account), fields(account = %account))]
pub fn load_combined(
    dir: &Path,
    account: &AccountId,
    required: bool,
    combine: bool,
) -> Result<Option<ArchiveDocument>> {
    let primary = dir.join(account.archive_file());
    let Some(mut document) = load(&primary, required)? else {
        return Ok(None);
    };

    if combine {
        let mut continuations = Vec::new();
        for n in 0.. {
            let path = dir.join(account.split_file(n));
            if !path.is_file() {
                break;
            }
            continuations.push(path);
        }

        for path in continuations.iter().rev() {
            if let Some(older) = load(path, false)? {
                debug!(path = %path.display(), "combining split archive");
                document.statuses.extend(older.statuses);
                document.favourites.extend(older.favourites);
                document.bookmarks.extend(older.bookmarks);
                document.mentions.extend(older.mentions);
            }
        }
    }

    Ok(Some(document))
}

/// Save the archive document at `path`, keeping the previous version as a
/// `~`-suffixed backup.
///
/// When both a primary and a backup already exist, `on_conflict` decides
/// whether the old backup may be destroyed; [`BackupConflict::Abort`] fails
/// the save with [`ArchiveError::BackupRefused`] and leaves everything
/// untouched.
///
/// No interruption point loses data: before the first rename the old
/// primary is untouched; between the two renames the old state lives in
/// the backup and the complete new state in the temp file, and the next
/// save simply writes a fresh primary.
#[instrument(skip(document, on_conflict))]
pub fn save<F>(path: &Path, document: &ArchiveDocument, on_conflict: F) -> Result<()>
where
    F: FnOnce(&Path) -> BackupConflict,
{
    save_steps(path, document, on_conflict, || Ok(()))
}

/// The save sequence with an injectable step between the two renames, so
/// tests can simulate a crash in the window where no primary file exists.
fn save_steps<F, G>(
    path: &Path,
    document: &ArchiveDocument,
    on_conflict: F,
    between_renames: G,
) -> Result<()>
where
    F: FnOnce(&Path) -> BackupConflict,
    G: FnOnce() -> std::io::Result<()>,
{
    let backup = backup_path(path);

    if path.is_file() && backup.is_file() && on_conflict(&backup) == BackupConflict::Abort {
        return Err(ArchiveError::BackupRefused { path: backup }.into());
    }

    let json = serde_json::to_string_pretty(document).map_err(ArchiveError::from)?;

    // Write the complete new document before touching the old one.
    let temp = temp_path(path);
    fs::write(&temp, json).map_err(ArchiveError::from)?;

    if path.is_file() {
        fs::rename(path, &backup).map_err(ArchiveError::from)?;
    }
    between_renames().map_err(ArchiveError::from)?;
    fs::rename(&temp, path).map_err(ArchiveError::from)?;

    debug!(path = %path.display(), "saved archive");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// All accounts with a primary archive in `dir`, for the `all` shorthand.
pub fn all_accounts(dir: &Path) -> Result<Vec<AccountId>> {
    let mut accounts = Vec::new();

    for entry in fs::read_dir(dir).map_err(ArchiveError::from)? {
        let entry = entry.map_err(ArchiveError::from)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".json") else {
            continue;
        };
        let Some((domain, username)) = stem.split_once(".user.") else {
            continue;
        };
        // Continuation files carry a trailing `.N`; usernames never contain
        // dots, so any dot marks a split file.
        if username.is_empty() || username.contains('.') {
            continue;
        }
        accounts.push(AccountId::from_parts(username, domain));
    }

    accounts.sort_by_key(|a| a.to_string());
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedistash_core::{Collection, Error, Record};
    use serde_json::json;

    fn doc_with_statuses(ids: &[&str]) -> ArchiveDocument {
        let mut doc = ArchiveDocument::default();
        doc.statuses = ids
            .iter()
            .map(|id| {
                serde_json::from_value::<Record>(json!({"id": id, "created_at": "2024-01-01"}))
                    .unwrap()
            })
            .collect();
        doc
    }

    #[test]
    fn required_load_of_missing_archive_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");
        let err = load(&path, true).unwrap_err();
        assert!(matches!(err, Error::Archive(ArchiveError::Missing { .. })));
        assert!(load(&path, false).unwrap().is_none());
    }

    #[test]
    fn empty_file_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");
        fs::write(&path, "").unwrap();
        assert!(load(&path, false).unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");
        let doc = doc_with_statuses(&["2", "1"]);

        save(&path, &doc, |_| BackupConflict::Abort).unwrap();
        let loaded = load(&path, true).unwrap().unwrap();
        assert_eq!(loaded.statuses.len(), 2);
        assert_eq!(loaded.statuses[0].id.as_str(), "2");
    }

    #[test]
    fn second_save_keeps_first_content_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");

        save(&path, &doc_with_statuses(&["1"]), |_| BackupConflict::Abort).unwrap();
        let first_content = fs::read_to_string(&path).unwrap();

        save(&path, &doc_with_statuses(&["2", "1"]), |_| {
            BackupConflict::Abort
        })
        .unwrap();

        let backup = backup_path(&path);
        assert_eq!(fs::read_to_string(&backup).unwrap(), first_content);

        // The primary is never left truncated.
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn refused_backup_overwrite_aborts_and_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");

        save(&path, &doc_with_statuses(&["1"]), |_| BackupConflict::Abort).unwrap();
        save(&path, &doc_with_statuses(&["2", "1"]), |_| {
            BackupConflict::Abort
        })
        .unwrap();

        let primary_before = fs::read_to_string(&path).unwrap();
        let backup_before = fs::read_to_string(backup_path(&path)).unwrap();

        let err = save(&path, &doc_with_statuses(&["3", "2", "1"]), |_| {
            BackupConflict::Abort
        })
        .unwrap_err();

        assert!(matches!(
            err,
            Error::Archive(ArchiveError::BackupRefused { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), primary_before);
        assert_eq!(
            fs::read_to_string(backup_path(&path)).unwrap(),
            backup_before
        );
    }

    #[test]
    fn interrupt_between_renames_loses_no_state_and_a_rerun_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");

        save(&path, &doc_with_statuses(&["1"]), |_| BackupConflict::Abort).unwrap();
        let old_content = fs::read_to_string(&path).unwrap();

        // Crash after the primary was renamed away but before the new
        // document took its place.
        let err = save_steps(
            &path,
            &doc_with_statuses(&["2", "1"]),
            |_| BackupConflict::Abort,
            || Err(std::io::Error::other("interrupted")),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Archive(ArchiveError::Io(_))));

        // The primary is gone, but both states survive intact: the old
        // one in the backup, the complete new one in the temp file.
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), old_content);
        let stranded: ArchiveDocument =
            serde_json::from_str(&fs::read_to_string(temp_path(&path)).unwrap()).unwrap();
        assert_eq!(stranded.statuses.len(), 2);

        // A rerun writes a fresh primary; the backup is not rotated again
        // because there is no primary to rename over it.
        save(&path, &doc_with_statuses(&["2", "1"]), |_| {
            BackupConflict::Abort
        })
        .unwrap();
        let recovered = load(&path, true).unwrap().unwrap();
        assert_eq!(recovered.statuses.len(), 2);
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), old_content);
    }

    #[test]
    fn confirmed_overwrite_rotates_the_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.user.alice.json");

        save(&path, &doc_with_statuses(&["1"]), |_| BackupConflict::Abort).unwrap();
        save(&path, &doc_with_statuses(&["2", "1"]), |_| {
            BackupConflict::Abort
        })
        .unwrap();
        let second_content = fs::read_to_string(&path).unwrap();

        save(&path, &doc_with_statuses(&["3", "2", "1"]), |_| {
            BackupConflict::Overwrite
        })
        .unwrap();

        assert_eq!(
            fs::read_to_string(backup_path(&path)).unwrap(),
            second_content
        );
        let loaded = load(&path, true).unwrap().unwrap();
        assert_eq!(loaded.statuses.len(), 3);
    }

    #[test]
    fn combine_appends_split_archives_newest_split_first() {
        let dir = tempfile::tempdir().unwrap();
        let account = AccountId::new("alice@example.org").unwrap();

        save(
            &dir.path().join(account.archive_file()),
            &doc_with_statuses(&["9", "8"]),
            |_| BackupConflict::Abort,
        )
        .unwrap();
        // Oldest split first on disk: .0 is the oldest batch.
        save(
            &dir.path().join(account.split_file(0)),
            &doc_with_statuses(&["2", "1"]),
            |_| BackupConflict::Abort,
        )
        .unwrap();
        save(
            &dir.path().join(account.split_file(1)),
            &doc_with_statuses(&["5", "4"]),
            |_| BackupConflict::Abort,
        )
        .unwrap();

        let combined = load_combined(dir.path(), &account, true, true)
            .unwrap()
            .unwrap();
        let ids: Vec<&str> = combined.statuses.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "8", "5", "4", "2", "1"]);

        // Without combine, only the primary is visible.
        let primary = load_combined(dir.path(), &account, true, false)
            .unwrap()
            .unwrap();
        assert_eq!(primary.collection(Collection::Statuses).len(), 2);
    }

    #[test]
    fn all_accounts_skips_splits_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let alice = AccountId::new("alice@example.org").unwrap();
        let bob = AccountId::new("bob@social.example").unwrap();

        for account in [&alice, &bob] {
            save(
                &dir.path().join(account.archive_file()),
                &ArchiveDocument::default(),
                |_| BackupConflict::Abort,
            )
            .unwrap();
        }
        save(
            &dir.path().join(alice.split_file(0)),
            &ArchiveDocument::default(),
            |_| BackupConflict::Abort,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let accounts = all_accounts(dir.path()).unwrap();
        assert_eq!(accounts, vec![alice, bob]);
    }
}
