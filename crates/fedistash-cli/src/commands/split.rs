//! Split command implementation: move old records to a continuation file.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Args;

use fedistash_core::AccountId;
use fedistash_store::{BackupConflict, load, next_split_file, save, split_older_than};

use crate::commands::{resolve_accounts, working_dir};
use crate::output;

#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Account to split, as user@domain, or `all`
    pub account: String,

    /// Move records older than this many weeks
    #[arg(long, value_name = "WEEKS")]
    pub older_than: i64,

    /// Actually write the split; without this flag the move is only counted
    #[arg(long)]
    pub confirmed: bool,
}

pub async fn run(args: SplitArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let cutoff = Utc::now() - Duration::weeks(args.older_than);
    let mut any_work = false;

    for account in resolve_accounts(dir, &args.account)? {
        any_work |= split_account(dir, &account, &args, cutoff)
            .with_context(|| format!("failed to split {}", account))?;
    }

    if any_work {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}

fn split_account(
    dir: &Path,
    account: &AccountId,
    args: &SplitArgs,
    cutoff: DateTime<Utc>,
) -> Result<bool> {
    let path = dir.join(account.archive_file());
    let mut document = load(&path, true)?.unwrap_or_default();

    let (mut older, moved) = split_older_than(&mut document, cutoff);
    if moved == 0 {
        output::field(
            &account.to_string(),
            &format!("no records older than {} weeks", args.older_than),
        );
        return Ok(false);
    }

    if !args.confirmed {
        output::field(
            &account.to_string(),
            &format!(
                "{} records older than {} weeks would move to a continuation file; \
                 re-run with --confirmed",
                moved, args.older_than,
            ),
        );
        return Ok(true);
    }

    older.account = document.account.clone();
    let (split_path, n) = next_split_file(dir, account);

    // Continuation first, primary second: a crash in between leaves the
    // moved records in both files, which combining tolerates, instead of
    // in neither.
    save(&split_path, &older, |_| BackupConflict::Abort)?;
    save(&path, &document, output::backup_prompt)?;

    output::success(&format!(
        "Moved {} records for {} into continuation file {}",
        moved, account, n,
    ));
    Ok(true)
}
