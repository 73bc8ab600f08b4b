//! Subcommand implementations.

mod archive;
mod deauthorize;
mod expire;
mod html;
mod login;
mod media;
mod report;
mod split;
mod text;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Subcommand;

use fedistash_api::{ApiClient, auth};
use fedistash_core::AccountId;
use fedistash_store::all_accounts;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize the app against an instance and store the token
    Login(login::LoginArgs),

    /// Forget the stored token for an account
    Deauthorize(deauthorize::DeauthorizeArgs),

    /// Download new statuses, favourites, and bookmarks into the archive
    Archive(archive::ArchiveArgs),

    /// Search and print archived posts as plain text
    Text(text::TextArgs),

    /// Export the archive as static HTML pages
    Html(html::HtmlArgs),

    /// Download media attachments referenced by the archive
    Media(media::MediaArgs),

    /// Delete old items from the server, keeping the archived copies
    Expire(expire::ExpireArgs),

    /// Move old records into a numbered continuation file
    Split(split::SplitArgs),

    /// Summarize the archive: counts, boosts, media, top hashtags
    Report(report::ReportArgs),
}

pub async fn handle(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Login(args) => login::run(args).await,
        Commands::Deauthorize(args) => deauthorize::run(args).await,
        Commands::Archive(args) => archive::run(args).await,
        Commands::Text(args) => text::run(args).await,
        Commands::Html(args) => html::run(args).await,
        Commands::Media(args) => media::run(args).await,
        Commands::Expire(args) => expire::run(args).await,
        Commands::Split(args) => split::run(args).await,
        Commands::Report(args) => report::run(args).await,
    }
}

/// Archives (and secrets) live in the current working directory.
pub(crate) fn working_dir() -> &'static Path {
    Path::new(".")
}

/// Resolve a `user@domain` argument, expanding the `all` shorthand to every
/// account with an archive in the working directory.
pub(crate) fn resolve_accounts(dir: &Path, value: &str) -> Result<Vec<AccountId>> {
    if value == "all" {
        let accounts = all_accounts(dir).context("failed to scan for archives")?;
        if accounts.is_empty() {
            bail!("no archives found in the current directory");
        }
        return Ok(accounts);
    }
    Ok(vec![AccountId::new(value)?])
}

/// Client using the stored token for the account.
pub(crate) fn authed_client(dir: &Path, account: &AccountId, pace: bool) -> Result<ApiClient> {
    let token = auth::load_token(dir, account)
        .with_context(|| format!("no stored credentials for {}; run `fedistash login {}`", account, account))?;
    Ok(ApiClient::new(&account.base_url(), Some(token), pace)?)
}
