//! Expire command implementation: delete old items from the server.
//!
//! The archive is the permanent record; expiry removes items from the
//! server and marks the archived copies as deleted. Marks are persisted in
//! checkpoints every [`CHECKPOINT_EVERY`] items and flushed on Ctrl-C, so
//! an interrupted run loses at most one batch and a rerun skips everything
//! already processed.

use std::collections::HashSet;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde_json::Value;
use tracing::{info, warn};

use fedistash_api::{ApiClient, ApiFeed, FeedKind};
use fedistash_core::{
    AccountId, ArchiveDocument, AuthError, Collection, Error, FeedItem, FeedSource, Record,
    RecordId,
};
use fedistash_store::{BackupConflict, backup_path, load, save};

use crate::cancel::CancelToken;
use crate::commands::login::login_flow;
use crate::commands::{authed_client, resolve_accounts, working_dir};
use crate::output;

/// Save the archive after this many processed items, matching the typical
/// remote rate-limit window.
const CHECKPOINT_EVERY: usize = 300;

#[derive(Args, Debug)]
pub struct ExpireArgs {
    /// Account to expire, as user@domain, or `all`
    pub account: String,

    /// Which collection to expire
    #[arg(long, default_value = "statuses")]
    pub collection: Collection,

    /// Expire items older than this many weeks
    #[arg(long, value_name = "WEEKS")]
    pub older_than: i64,

    /// Actually delete; without this flag matching items are only counted
    #[arg(long)]
    pub confirmed: bool,

    /// Space requests out to stay under the server's rate limit
    #[arg(long)]
    pub pace: bool,
}

pub async fn run(args: ExpireArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let cutoff = Utc::now() - Duration::weeks(args.older_than);
    let mut any_work = false;

    for account in resolve_accounts(dir, &args.account)? {
        any_work |= expire_account(dir, &account, &args, cutoff)
            .await
            .with_context(|| format!("failed to expire {}", account))?;
    }

    if any_work {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}

fn is_deleted(record: &Record) -> bool {
    record
        .payload
        .get("deleted")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

async fn expire_account(
    dir: &Path,
    account: &AccountId,
    args: &ExpireArgs,
    cutoff: DateTime<Utc>,
) -> Result<bool> {
    let path = dir.join(account.archive_file());
    let mut document = load(&path, true)?.unwrap_or_default();

    let expired: Vec<RecordId> = document
        .collection(args.collection)
        .iter()
        .filter(|record| !is_deleted(record))
        .filter(|record| record.created().is_some_and(|created| created < cutoff))
        .map(|record| record.id.clone())
        .collect();

    if expired.is_empty() {
        output::field(
            &account.to_string(),
            &format!("no {} older than {} weeks", args.collection, args.older_than),
        );
        return Ok(false);
    }

    if !args.confirmed {
        output::field(
            &account.to_string(),
            &format!(
                "{} {} older than {} weeks would be expired; re-run with --confirmed",
                expired.len(),
                args.collection,
                args.older_than,
            ),
        );
        return Ok(true);
    }

    // Checkpoints rotate the backup repeatedly; settle the overwrite
    // question once, before anything is deleted.
    if path.is_file()
        && backup_path(&path).is_file()
        && output::backup_prompt(&backup_path(&path)) == BackupConflict::Abort
    {
        bail!("refusing to overwrite the existing backup");
    }
    let checkpoint = |document: &ArchiveDocument| save(&path, document, |_| BackupConflict::Overwrite);

    let mut session = ExpireSession {
        dir,
        account,
        client: authed_client(dir, account, args.pace)?,
        pace: args.pace,
        reauthorized: false,
        cancel: CancelToken::install(),
    };

    let outcome = match args.collection {
        Collection::Mentions => {
            expire_mentions(&mut session, &mut document, &expired, &checkpoint).await
        }
        _ => {
            expire_records(&mut session, &mut document, args.collection, &expired, &checkpoint)
                .await
        }
    };

    // Flush marks gathered since the last checkpoint, error or not.
    checkpoint(&document)?;
    let processed = outcome?;

    if session.cancel.cancelled() {
        output::field(
            &account.to_string(),
            &format!("interrupted after {} of {} items", processed, expired.len()),
        );
    } else {
        output::success(&format!(
            "Expired {} of {} {} for {}",
            processed,
            expired.len(),
            args.collection,
            account,
        ));
    }
    Ok(true)
}

struct ExpireSession<'a> {
    dir: &'a Path,
    account: &'a AccountId,
    client: ApiClient,
    pace: bool,
    reauthorized: bool,
    cancel: CancelToken,
}

impl ExpireSession<'_> {
    /// Run one destructive call, re-authorizing once if the server reports
    /// the token's scopes as revoked. A second revocation is fatal.
    async fn destroy(&mut self, collection: Collection, id: &RecordId) -> Result<DestroyOutcome> {
        loop {
            let result = match collection {
                Collection::Statuses => self.client.delete_status(id).await,
                Collection::Favourites => self.client.unfavourite(id).await,
                Collection::Bookmarks => self.client.unbookmark(id).await,
                Collection::Mentions => self.client.dismiss_notification(id).await,
            };

            match result {
                Ok(()) => return Ok(DestroyOutcome::Removed),
                // Already gone remotely; treat as expired.
                Err(Error::Protocol(err)) if err.is_not_found() => {
                    return Ok(DestroyOutcome::Removed);
                }
                Err(Error::Auth(AuthError::Revoked { message })) if !self.reauthorized => {
                    warn!(reason = %message, "authorization revoked, re-authorizing once");
                    self.client = login_flow(self.dir, self.account, self.pace).await?;
                    self.reauthorized = true;
                }
                Err(Error::Auth(err)) => return Err(Error::from(err).into()),
                Err(err) => {
                    warn!(%id, error = %err, "skipping item after server error");
                    return Ok(DestroyOutcome::Skipped);
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DestroyOutcome {
    Removed,
    Skipped,
}

fn mark_deleted(document: &mut ArchiveDocument, collection: Collection, id: &RecordId) {
    for record in document.collection_mut(collection) {
        if record.id == *id {
            record.payload.insert("deleted".to_string(), Value::Bool(true));
        }
    }
}

async fn expire_records<F>(
    session: &mut ExpireSession<'_>,
    document: &mut ArchiveDocument,
    collection: Collection,
    expired: &[RecordId],
    checkpoint: &F,
) -> Result<usize>
where
    F: Fn(&ArchiveDocument) -> fedistash_core::Result<()>,
{
    let mut processed = 0;

    for id in expired {
        if session.cancel.cancelled() {
            break;
        }

        if session.destroy(collection, id).await? == DestroyOutcome::Removed {
            mark_deleted(document, collection, id);
        }
        processed += 1;

        if processed % CHECKPOINT_EVERY == 0 {
            info!(processed, "checkpointing archive");
            checkpoint(document)?;
        }
    }

    Ok(processed)
}

/// Mentions are archived as the mentioning statuses, but the server-side
/// handle is the notification, so expiry walks the live notification feed
/// and dismisses every mention wrapping an expired status.
async fn expire_mentions<F>(
    session: &mut ExpireSession<'_>,
    document: &mut ArchiveDocument,
    expired: &[RecordId],
    checkpoint: &F,
) -> Result<usize>
where
    F: Fn(&ArchiveDocument) -> fedistash_core::Result<()>,
{
    let mut remaining: HashSet<RecordId> = expired.iter().cloned().collect();
    let mut processed = 0;

    let url = session.client.notifications_url();
    let mut feed = ApiFeed::new(&session.client, FeedKind::Notifications, url);
    let mut dismissals = Vec::new();

    // Collect the notification ids first; dismissing while paging shifts
    // the feed under the cursor.
    while let Some(page) = feed.next_page().await? {
        if remaining.is_empty() || session.cancel.cancelled() {
            break;
        }
        for item in page {
            if let FeedItem::Notification {
                id,
                kind,
                record: Some(record),
            } = item
            {
                if kind == "mention" && remaining.remove(&record.id) {
                    dismissals.push((id, record.id));
                }
            }
        }
    }

    for (notification_id, status_id) in dismissals {
        if session.cancel.cancelled() {
            break;
        }

        if session.destroy(Collection::Mentions, &notification_id).await? == DestroyOutcome::Removed
        {
            mark_deleted(document, Collection::Mentions, &status_id);
        }
        processed += 1;

        if processed % CHECKPOINT_EVERY == 0 {
            info!(processed, "checkpointing archive");
            checkpoint(document)?;
        }
    }

    // Mentions whose notification is already gone count as expired.
    for status_id in &remaining {
        mark_deleted(document, Collection::Mentions, status_id);
    }

    Ok(processed)
}
