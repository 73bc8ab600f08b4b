//! OAuth app registration, token exchange, and secret storage.
//!
//! Secrets live next to the archives in the working directory, using the
//! established naming convention: `<domain>.client.secret` for the app,
//! `<domain>.user.<name>.secret` for the access token.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use fedistash_core::error::AuthError;
use fedistash_core::{AccountId, Result};

use crate::client::ApiClient;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const APP_NAME: &str = "fedistash";
const REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";
const SCOPES: &str = "read write";

/// Registered app credentials, stored as two lines in the client secret
/// file.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct RegisterAppResponse {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

fn secret_file_error(path: &Path) -> impl FnOnce(std::io::Error) -> AuthError + '_ {
    move |source| AuthError::SecretFile {
        path: path.to_path_buf(),
        source,
    }
}

/// Register the app with the instance.
pub async fn register_app(client: &ApiClient) -> Result<AppCredentials> {
    let response: RegisterAppResponse = client
        .post_json(
            &client.url("api/v1/apps"),
            &json!({
                "client_name": APP_NAME,
                "redirect_uris": REDIRECT_URI,
                "scopes": SCOPES,
                "website": "https://github.com/fedistash/fedistash",
            }),
        )
        .await?;

    debug!("registered app");
    Ok(AppCredentials {
        client_id: response.client_id,
        client_secret: response.client_secret,
    })
}

/// The URL the user must visit to authorize the app.
pub fn authorize_url(base_url: &str, client_id: &str) -> String {
    format!(
        "{}/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}",
        base_url.trim_end_matches('/'),
        client_id,
        REDIRECT_URI,
        SCOPES.replace(' ', "+"),
    )
}

/// Exchange an authorization code for an access token.
pub async fn obtain_token(
    client: &ApiClient,
    app: &AppCredentials,
    code: &str,
) -> Result<String> {
    let response: TokenResponse = client
        .post_json(
            &client.url("oauth/token"),
            &json!({
                "grant_type": "authorization_code",
                "code": code.trim(),
                "client_id": app.client_id,
                "client_secret": app.client_secret,
                "redirect_uri": REDIRECT_URI,
                "scope": SCOPES,
            }),
        )
        .await?;

    Ok(response.access_token)
}

/// Load stored app credentials, if the instance was registered before.
pub fn load_app(dir: &Path, account: &AccountId) -> Result<Option<AppCredentials>> {
    let path = dir.join(account.client_secret_file());
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(secret_file_error(&path))?;
    let mut lines = content.lines();
    match (lines.next(), lines.next()) {
        (Some(client_id), Some(client_secret)) => Ok(Some(AppCredentials {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        })),
        _ => Ok(None),
    }
}

/// Store app credentials.
pub fn store_app(dir: &Path, account: &AccountId, app: &AppCredentials) -> Result<()> {
    let path = dir.join(account.client_secret_file());
    let content = format!("{}\n{}\n", app.client_id, app.client_secret);
    write_secret(&path, &content)
}

/// Load the stored access token for the account.
pub fn load_token(dir: &Path, account: &AccountId) -> Result<String> {
    let path = dir.join(account.user_secret_file());
    if !path.is_file() {
        return Err(AuthError::MissingCredentials { path }.into());
    }

    let content = fs::read_to_string(&path).map_err(secret_file_error(&path))?;
    let token = content.trim().to_string();
    if token.is_empty() {
        return Err(AuthError::MissingCredentials { path }.into());
    }
    Ok(token)
}

/// Store the user's access token.
pub fn store_token(dir: &Path, account: &AccountId, token: &str) -> Result<()> {
    let path = dir.join(account.user_secret_file());
    write_secret(&path, &format!("{}\n", token))
}

/// Forget the stored access token. Returns false when there was none.
pub fn deauthorize(dir: &Path, account: &AccountId) -> Result<bool> {
    let path = dir.join(account.user_secret_file());
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(&path).map_err(secret_file_error(&path))?;
    debug!(path = %path.display(), "removed user secret");
    Ok(true)
}

fn write_secret(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(secret_file_error(path))?;

    // Tokens grant write access to the account; keep them private.
    #[cfg(unix)]
    {
        let mut perms = fs::metadata(path)
            .map_err(secret_file_error(path))?
            .permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms).map_err(secret_file_error(path))?;
    }

    Ok(())
}
