//! Login command implementation.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use fedistash_api::{ApiClient, auth};
use fedistash_core::AccountId;

use crate::commands::working_dir;
use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account to authorize, as user@domain
    pub account: String,

    /// Space requests out to stay under the server's rate limit
    #[arg(long)]
    pub pace: bool,
}

pub async fn run(args: LoginArgs) -> Result<ExitCode> {
    let account = AccountId::new(&args.account)?;
    login_flow(working_dir(), &account, args.pace).await?;
    Ok(ExitCode::SUCCESS)
}

/// Full authorization flow: register the app if needed, walk the user
/// through the authorization-code exchange, store and verify the token.
///
/// Also used by destructive commands to re-authorize once when the server
/// reports the stored token's scopes as revoked.
pub(crate) async fn login_flow(
    dir: &Path,
    account: &AccountId,
    pace: bool,
) -> Result<ApiClient> {
    let base = account.base_url();
    let anonymous = ApiClient::new(&base, None, pace)?;

    let app = match auth::load_app(dir, account)? {
        Some(app) => app,
        None => {
            eprintln!("{}", "Registering app...".dimmed());
            let app = auth::register_app(&anonymous)
                .await
                .context("app registration failed")?;
            auth::store_app(dir, account, &app)?;
            app
        }
    };

    println!("Visit this URL, authorize the app, and copy the code:");
    println!("{}", auth::authorize_url(&base, &app.client_id));
    let code = output::prompt("Authorization code")?;

    let token = auth::obtain_token(&anonymous, &app, &code)
        .await
        .context("token exchange failed")?;
    auth::store_token(dir, account, &token)?;

    let client = ApiClient::new(&base, Some(token), pace)?;
    let me = client
        .verify_credentials()
        .await
        .context("the new token failed the credential check")?;

    output::success("Logged in successfully");
    println!();
    output::field(
        "Account",
        me["acct"].as_str().unwrap_or(account.username()),
    );
    output::field("Instance", account.domain());

    Ok(client)
}
