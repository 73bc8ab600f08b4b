//! Deauthorize command implementation.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use fedistash_api::auth;

use crate::commands::{resolve_accounts, working_dir};
use crate::output;

#[derive(Args, Debug)]
pub struct DeauthorizeArgs {
    /// Account to forget, as user@domain, or `all`
    pub account: String,
}

pub async fn run(args: DeauthorizeArgs) -> Result<ExitCode> {
    let dir = working_dir();
    let mut removed_any = false;

    for account in resolve_accounts(dir, &args.account)? {
        if auth::deauthorize(dir, &account)? {
            output::success(&format!("Forgot the token for {}", account));
            removed_any = true;
        } else {
            output::field(&account.to_string(), "no stored token");
        }
    }

    if removed_any {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}
