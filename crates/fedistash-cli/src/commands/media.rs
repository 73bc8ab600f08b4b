//! Media command implementation: attachment download.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use fedistash_api::ApiClient;
use fedistash_core::{AccountId, Collection, Error, Record};
use fedistash_store::load_combined;

use crate::commands::working_dir;
use crate::output;

/// How long a 404'd attachment keeps being retried before it is treated as
/// permanently gone.
const RETRY_WINDOW_DAYS: i64 = 14;

#[derive(Args, Debug)]
pub struct MediaArgs {
    /// Account whose archive to scan, as user@domain
    pub account: String,

    /// Which collection's attachments to download
    #[arg(long, default_value = "statuses")]
    pub collection: Collection,

    /// Include split continuation files
    #[arg(long)]
    pub combine: bool,

    /// Space requests out to stay under the server's rate limit
    #[arg(long)]
    pub pace: bool,
}

/// Sidecar marker next to a file the server keeps 404ing on.
#[derive(Debug, Serialize, Deserialize)]
struct MissingMarker {
    first_failure: DateTime<Utc>,
    last_failure: DateTime<Utc>,
}

pub async fn run(args: MediaArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let account = AccountId::new(&args.account)?;

    let document = load_combined(dir, &account, true, args.combine)?
        .unwrap_or_default();

    let urls = attachment_urls(document.collection(args.collection));
    if urls.is_empty() {
        output::field(args.collection.as_str(), "no attachments to download");
        return Ok(ExitCode::from(3));
    }

    // Attachment URLs point at arbitrary media hosts; never send the
    // access token there.
    let client = ApiClient::new(&account.base_url(), None, args.pace)?;
    let media_root = dir.join(account.media_dir());

    let mut downloaded = 0usize;
    let mut present = 0usize;
    let mut missing = 0usize;
    let mut failed = 0usize;

    for url in &urls {
        let Some(dest) = local_path(&media_root, url) else {
            debug!(url, "skipping attachment with no usable path");
            continue;
        };

        if dest.is_file() {
            present += 1;
            continue;
        }
        if permanently_missing(&dest)? {
            missing += 1;
            continue;
        }

        match client.download(url).await {
            Ok(bytes) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                fs::write(&dest, bytes)
                    .with_context(|| format!("failed to write {}", dest.display()))?;
                let _ = fs::remove_file(marker_path(&dest));
                downloaded += 1;
            }
            Err(Error::Protocol(err)) if err.is_not_found() => {
                record_failure(&dest)?;
                missing += 1;
            }
            Err(err) => {
                warn!(url, error = %err, "attachment download failed");
                failed += 1;
            }
        }
    }

    output::success(&format!(
        "{} downloaded, {} already present, {} missing, {} failed",
        downloaded, present, missing, failed
    ));
    Ok(ExitCode::SUCCESS)
}

/// Attachment and preview URLs referenced by the records, boosts included,
/// deduplicated in first-seen order.
fn attachment_urls(records: &[Record]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();

    for record in records {
        let source = record.reblog.as_deref().unwrap_or(record);
        let Some(attachments) = source
            .payload
            .get("media_attachments")
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        for attachment in attachments {
            for key in ["url", "preview_url"] {
                if let Some(url) = attachment.get(key).and_then(|v| v.as_str()) {
                    if !url.is_empty() && seen.insert(url.to_string()) {
                        urls.push(url.to_string());
                    }
                }
            }
        }
    }
    urls
}

/// Where a remote URL lands on disk: the URL's path, rooted in the
/// account's media directory.
fn local_path(media_root: &Path, url: &str) -> Option<PathBuf> {
    let parsed = Url::parse(url).ok()?;
    let mut dest = media_root.to_path_buf();
    let mut any = false;
    for segment in parsed.path_segments()? {
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        dest.push(segment);
        any = true;
    }
    any.then_some(dest)
}

fn marker_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".missing");
    PathBuf::from(name)
}

/// True when the file has been 404ing for longer than the retry window.
fn permanently_missing(dest: &Path) -> Result<bool> {
    let marker = marker_path(dest);
    if !marker.is_file() {
        return Ok(false);
    }
    let content = fs::read_to_string(&marker)
        .with_context(|| format!("failed to read {}", marker.display()))?;
    let Ok(record) = serde_json::from_str::<MissingMarker>(&content) else {
        // Unreadable marker: retry the download and rewrite it on failure.
        return Ok(false);
    };
    Ok(Utc::now() - record.first_failure > Duration::days(RETRY_WINDOW_DAYS))
}

/// Record a 404, keeping the first-failure timestamp across runs.
fn record_failure(dest: &Path) -> Result<()> {
    let marker = marker_path(dest);
    let now = Utc::now();

    let first_failure = fs::read_to_string(&marker)
        .ok()
        .and_then(|content| serde_json::from_str::<MissingMarker>(&content).ok())
        .map(|record| record.first_failure)
        .unwrap_or(now);

    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let record = MissingMarker {
        first_failure,
        last_failure: now,
    };
    fs::write(&marker, serde_json::to_string_pretty(&record)?)
        .with_context(|| format!("failed to write {}", marker.display()))?;
    Ok(())
}
