//! Report command implementation: archive statistics.

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Args;

use fedistash_core::{AccountId, ArchiveDocument, Collection, Record};
use fedistash_store::load_combined;

use crate::commands::{resolve_accounts, working_dir};
use crate::output;

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Account to report on, as user@domain, or `all`
    pub account: String,

    /// Only count records newer than this many weeks
    #[arg(long, value_name = "WEEKS")]
    pub newer_than: Option<i64>,

    /// Tally hashtags across every collection, not just statuses
    #[arg(long)]
    pub all: bool,

    /// How many hashtags to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Include split continuation files
    #[arg(long)]
    pub combine: bool,
}

pub async fn run(args: ReportArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let cutoff = args
        .newer_than
        .map(|weeks| Utc::now() - Duration::weeks(weeks));

    for account in resolve_accounts(dir, &args.account)? {
        report_account(dir, &account, &args, cutoff)
            .with_context(|| format!("failed to report on {}", account))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn in_window(record: &Record, cutoff: Option<DateTime<Utc>>) -> bool {
    match cutoff {
        None => true,
        Some(cutoff) => record.created().is_some_and(|created| created >= cutoff),
    }
}

fn report_account(
    dir: &Path,
    account: &AccountId,
    args: &ReportArgs,
    cutoff: Option<DateTime<Utc>>,
) -> Result<()> {
    let document = load_combined(dir, account, true, args.combine)?
        .unwrap_or_default();

    println!("{}", account);

    for collection in Collection::ALL {
        let count = document
            .collection(collection)
            .iter()
            .filter(|record| in_window(record, cutoff))
            .count();
        output::field(collection.as_str(), &count.to_string());
    }

    let statuses: Vec<&Record> = document
        .statuses
        .iter()
        .filter(|record| in_window(record, cutoff))
        .collect();
    let boosts = statuses.iter().filter(|r| r.reblog.is_some()).count();
    let with_media = statuses.iter().filter(|r| has_media(r)).count();
    output::field("boosts", &boosts.to_string());
    output::field("with media", &with_media.to_string());

    let tags = top_hashtags(&document, cutoff, args.all, args.top);
    if !tags.is_empty() {
        println!("top hashtags:");
        for (tag, count) in tags {
            output::field(&format!("  #{}", tag), &count.to_string());
        }
    }
    println!();
    Ok(())
}

fn has_media(record: &Record) -> bool {
    let source = record.reblog.as_deref().unwrap_or(record);
    source
        .payload
        .get("media_attachments")
        .and_then(|v| v.as_array())
        .is_some_and(|attachments| !attachments.is_empty())
}

/// The most used hashtags, ties broken alphabetically.
fn top_hashtags(
    document: &ArchiveDocument,
    cutoff: Option<DateTime<Utc>>,
    all_collections: bool,
    top: usize,
) -> Vec<(String, usize)> {
    let collections: &[Collection] = if all_collections {
        &Collection::ALL
    } else {
        &[Collection::Statuses]
    };

    let mut counts: HashMap<String, usize> = HashMap::new();
    for &collection in collections {
        for record in document.collection(collection) {
            if !in_window(record, cutoff) {
                continue;
            }
            let source = record.reblog.as_deref().unwrap_or(record);
            let Some(tags) = source.payload.get("tags").and_then(|v| v.as_array()) else {
                continue;
            };
            for tag in tags {
                if let Some(name) = tag.get("name").and_then(|v| v.as_str()) {
                    *counts.entry(name.to_ascii_lowercase()).or_default() += 1;
                }
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top);
    ranked
}
