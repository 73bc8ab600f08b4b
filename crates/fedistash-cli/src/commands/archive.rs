//! Archive command implementation: the incremental sync.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Args;

use fedistash_api::{ApiClient, ApiFeed, FeedKind};
use fedistash_core::{
    AccountId, ArchiveDocument, Collection, Error, FeedItem, MergeOptions, RecordId, reconcile,
};
use fedistash_store::{load, save};

use crate::commands::{authed_client, resolve_accounts, working_dir};
use crate::output;

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Account to archive, as user@domain, or `all`
    pub account: String,

    /// Skip the favourites collection
    #[arg(long)]
    pub no_favourites: bool,

    /// Also archive mentions from the notification feed
    #[arg(long)]
    pub with_mentions: bool,

    /// Also snapshot the follower list
    #[arg(long)]
    pub with_followers: bool,

    /// Also snapshot the list of followed accounts
    #[arg(long)]
    pub with_following: bool,

    /// Also snapshot muted accounts
    #[arg(long)]
    pub with_mutes: bool,

    /// Also snapshot blocked accounts
    #[arg(long)]
    pub with_blocks: bool,

    /// Walk every feed to exhaustion, updating archived copies in place,
    /// instead of stopping at already-archived items
    #[arg(long)]
    pub no_stopping: bool,

    /// Space requests out to stay under the server's rate limit
    #[arg(long)]
    pub pace: bool,
}

pub async fn run(args: ArchiveArgs) -> Result<ExitCode> {
    let dir = working_dir();
    for account in resolve_accounts(dir, &args.account)? {
        archive_account(dir, &account, &args)
            .await
            .with_context(|| format!("failed to archive {}", account))?;
    }
    Ok(ExitCode::SUCCESS)
}

async fn archive_account(dir: &Path, account: &AccountId, args: &ArchiveArgs) -> Result<()> {
    let client = authed_client(dir, account, args.pace)?;
    let me = client.verify_credentials().await?;
    let account_pk: RecordId = serde_json::from_value(me["id"].clone())
        .context("credential check returned no account id")?;

    let path = dir.join(account.archive_file());
    let mut document = load(&path, false)?.unwrap_or_default();
    document.account = me;

    let options = if args.no_stopping {
        MergeOptions::full_refetch()
    } else {
        MergeOptions::incremental()
    };

    let sync_result = sync_account(&client, &mut document, account_pk.as_str(), args, &options).await;

    // Persist whatever was synced before surfacing any error.
    save(&path, &document, output::backup_prompt)?;
    sync_result?;

    output::success(&format!(
        "Archived {} ({} statuses, {} favourites, {} bookmarks)",
        account,
        document.statuses.len(),
        document.favourites.len(),
        document.bookmarks.len(),
    ));
    Ok(())
}

async fn sync_account(
    client: &ApiClient,
    document: &mut ArchiveDocument,
    account_pk: &str,
    args: &ArchiveArgs,
    options: &MergeOptions,
) -> Result<()> {
    sync_records(
        client,
        document,
        Collection::Statuses,
        client.statuses_url(account_pk),
        FeedKind::Records,
        options,
    )
    .await?;

    if !args.no_favourites {
        sync_records(
            client,
            document,
            Collection::Favourites,
            client.favourites_url(),
            FeedKind::Records,
            options,
        )
        .await?;
    }

    sync_records(
        client,
        document,
        Collection::Bookmarks,
        client.bookmarks_url(),
        FeedKind::Records,
        options,
    )
    .await?;

    if args.with_mentions {
        sync_records(
            client,
            document,
            Collection::Mentions,
            client.notifications_url(),
            FeedKind::Notifications,
            options,
        )
        .await?;
    }

    if args.with_followers {
        document.followers = client.fetch_all(&client.followers_url(account_pk)).await?;
    }
    if args.with_following {
        document.following = client.fetch_all(&client.following_url(account_pk)).await?;
    }
    if args.with_mutes {
        document.mutes = client.fetch_all(&client.mutes_url()).await?;
    }
    if args.with_blocks {
        document.blocks = client.fetch_all(&client.blocks_url()).await?;
    }

    Ok(())
}

fn accept_all(_: &FeedItem) -> bool {
    true
}

async fn sync_records(
    client: &ApiClient,
    document: &mut ArchiveDocument,
    collection: Collection,
    first_url: String,
    kind: FeedKind,
    options: &MergeOptions,
) -> Result<()> {
    // Mentions come through the notification feed mixed with follows,
    // favourites, and the rest; everything else takes the feed as-is.
    let accept: fn(&FeedItem) -> bool = match collection {
        Collection::Mentions => FeedItem::is_mention,
        _ => accept_all,
    };

    let mut feed = ApiFeed::new(client, kind, first_url);
    let outcome = match reconcile(document.collection(collection), &mut feed, accept, options).await
    {
        Ok(outcome) => outcome,
        Err(Error::ResumePointLost { id }) => bail!(
            "the newest archived item in {} ({}) is no longer in the feed, \
             so an incremental fetch cannot tell where it left off; \
             re-run with --no-stopping to walk the full feed",
            collection,
            id,
        ),
        Err(err) => return Err(err.into()),
    };

    output::field(
        collection.as_str(),
        &format!(
            "{} new, {} updated, {} already archived",
            outcome.added, outcome.updated, outcome.duplicates
        ),
    );
    *document.collection_mut(collection) = outcome.records;
    Ok(())
}
